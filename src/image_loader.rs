// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Memory Image Loader
//!
//! This module parses memory preload files and applies them to the
//! simulator memory before a run. A preload file holds one
//! `(address, value)` pair per line, whitespace- or comma-separated,
//! decimal or 0x-prefixed hex.

use std::fs;
use std::path::Path;

use crate::arch::memory::Memory;
use crate::errors::SimulatorError;

/// A parsed memory preload: 16-bit (address, value) pairs in file order.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    pub entries: Vec<(u16, u16)>,
}

impl MemoryImage {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SimulatorError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, SimulatorError> {
        let mut entries = Vec::new();
        for (line_idx, raw_line) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = match raw_line.find(';') {
                Some(idx) => &raw_line[..idx],
                None => raw_line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut tokens = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty());
            let addr_token = tokens.next().ok_or_else(|| SimulatorError::Preload {
                message: "missing address".to_string(),
                line: line_no,
            })?;
            let value_token = tokens.next().ok_or_else(|| SimulatorError::Preload {
                message: "missing value".to_string(),
                line: line_no,
            })?;
            if tokens.next().is_some() {
                return Err(SimulatorError::Preload {
                    message: "expected exactly one (address, value) pair".to_string(),
                    line: line_no,
                });
            }
            let addr = parse_word(addr_token).ok_or_else(|| SimulatorError::Preload {
                message: format!("invalid 16-bit address '{}'", addr_token),
                line: line_no,
            })?;
            let value = parse_word(value_token).ok_or_else(|| SimulatorError::Preload {
                message: format!("invalid 16-bit value '{}'", value_token),
                line: line_no,
            })?;
            entries.push((addr, value));
        }
        Ok(Self { entries })
    }

    pub fn load_into_memory(&self, memory: &mut Memory) -> Result<(), SimulatorError> {
        for &(addr, value) in &self.entries {
            if !memory.write_word(addr as usize, value) {
                return Err(SimulatorError::Preload {
                    message: format!("address {} is outside memory", addr),
                    line: 0,
                });
            }
        }
        Ok(())
    }
}

fn parse_word(token: &str) -> Option<u16> {
    let value = if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        token.parse::<u32>().ok()?
    };
    u16::try_from(value).ok()
}
