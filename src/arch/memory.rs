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
//

// memory.rs
//
// This file contains the memory implementation for the simulator.
// Memory is word-addressable: each address names one 16-bit word.
// The full address space is 65,536 words (128 KB).

/// Number of 16-bit words in the default address space (128 KB).
pub const MEMORY_WORDS: usize = 65536;

#[derive(Debug, Clone)]
pub struct Memory {
    pub data: Vec<u16>,
    pub size: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(MEMORY_WORDS)
    }
}

impl Memory {
    /// Create a memory of `size` 16-bit words, zero-initialized.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            size,
        }
    }

    pub fn read_word(&self, addr: usize) -> Option<u16> {
        if addr < self.size {
            Some(self.data[addr])
        } else {
            None
        }
    }

    pub fn write_word(&mut self, addr: usize, value: u16) -> bool {
        if addr < self.size {
            self.data[addr] = value;
            true
        } else {
            false
        }
    }
}
