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

// assembler.rs
//
// This file contains the implementation of the two-pass assembler.
// The first pass collects label addresses; the second parses instructions
// and resolves label operands to word addresses or branch offsets.
// All errors carry the 1-based source line number.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::arch::instructions::Instruction;

// Register mapping (names are matched case-insensitively)
const REGISTER_MAP: &[(&str, u32)] = &[
    ("r0", 0),
    ("r1", 1),
    ("r2", 2),
    ("r3", 3),
    ("r4", 4),
    ("r5", 5),
    ("r6", 6),
    ("r7", 7),
];

const COMMENT_CHAR: char = ';';

// Assembler error
#[derive(Debug)]
pub enum AssemblerError {
    IoError(io::Error),
    ParseError(String, usize),
    SyntaxError(String, usize),
    RegisterError(String, usize),
    OperandError(String, usize),
    RangeError(String, usize),
    SymbolError(String, usize),
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblerError::IoError(err) => write!(f, "I/O error: {}", err),
            AssemblerError::ParseError(msg, line) => {
                write!(f, "Parse error at line {}: {}", line, msg)
            },
            AssemblerError::SyntaxError(msg, line) => {
                write!(f, "Syntax error at line {}: {}", line, msg)
            },
            AssemblerError::RegisterError(msg, line) => {
                write!(f, "Register error at line {}: {}", line, msg)
            },
            AssemblerError::OperandError(msg, line) => {
                write!(f, "Operand error at line {}: {}", line, msg)
            },
            AssemblerError::RangeError(msg, line) => {
                write!(f, "Range error at line {}: {}", line, msg)
            },
            AssemblerError::SymbolError(msg, line) => {
                write!(f, "Symbol error at line {}: {}", line, msg)
            },
        }
    }
}

impl std::error::Error for AssemblerError {}

impl From<io::Error> for AssemblerError {
    fn from(error: io::Error) -> Self {
        AssemblerError::IoError(error)
    }
}

/// An assembled program: instruction `i` lives at word address
/// `start_address + i`.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub start_address: u16,
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn fetch(&self, pc: u16) -> Option<&Instruction> {
        let index = (pc as usize).checked_sub(self.start_address as usize)?;
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// One past the address of the last instruction.
    pub fn end_address(&self) -> u32 {
        self.start_address as u32 + self.instructions.len() as u32
    }
}

// Assembler struct
pub struct Assembler {
    labels: HashMap<String, u16>,
    start_address: u16,
    register_map: HashMap<String, u32>,
}

impl Assembler {
    pub fn new(start_address: u16) -> Self {
        let register_map = REGISTER_MAP
            .iter()
            .map(|&(name, num)| (name.to_string(), num))
            .collect();
        Self {
            labels: HashMap::new(),
            start_address,
            register_map,
        }
    }

    pub fn assemble_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Program, AssemblerError> {
        let source = fs::read_to_string(path)?;
        self.assemble(&source)
    }

    /// Assemble a complete source text into a program.
    pub fn assemble(&mut self, source: &str) -> Result<Program, AssemblerError> {
        self.labels.clear();
        self.collect_labels(source)?;

        let mut instructions = Vec::new();
        let mut address = self.start_address as u32;
        for (line_idx, raw_line) in source.lines().enumerate() {
            let line_no = line_idx + 1;
            let text = self.strip_labels(strip_comment(raw_line).trim(), line_no, None)?;
            if text.is_empty() {
                continue;
            }
            if address > u16::MAX as u32 {
                return Err(AssemblerError::RangeError(
                    "program exceeds the 16-bit address space".to_string(),
                    line_no,
                ));
            }
            let instruction = self.parse_instruction(&text, address as u16, line_no)?;
            instructions.push(instruction);
            address += 1;
        }

        Ok(Program {
            start_address: self.start_address,
            instructions,
        })
    }

    // First pass: record the word address of every label.
    fn collect_labels(&mut self, source: &str) -> Result<(), AssemblerError> {
        let mut address = self.start_address as u32;
        for (line_idx, raw_line) in source.lines().enumerate() {
            let line_no = line_idx + 1;
            let stripped = strip_comment(raw_line).trim().to_string();
            let text = self.strip_labels(&stripped, line_no, Some(address))?;
            if !text.is_empty() {
                address += 1;
            }
        }
        Ok(())
    }

    // Peel `name:` prefixes off a line. When `define_at` is given (first
    // pass) each label is recorded at that address; otherwise labels are
    // only validated and skipped.
    fn strip_labels(
        &mut self,
        line: &str,
        line_no: usize,
        define_at: Option<u32>,
    ) -> Result<String, AssemblerError> {
        let mut text = line.trim();
        while let Some(colon) = text.find(':') {
            let name = text[..colon].trim();
            if !is_valid_label(name) {
                return Err(AssemblerError::SyntaxError(
                    format!("invalid label name '{}'", name),
                    line_no,
                ));
            }
            if let Some(address) = define_at {
                if self.labels.contains_key(name) {
                    return Err(AssemblerError::SymbolError(
                        format!("duplicate label '{}'", name),
                        line_no,
                    ));
                }
                if address > u16::MAX as u32 {
                    return Err(AssemblerError::RangeError(
                        format!("label '{}' falls outside the address space", name),
                        line_no,
                    ));
                }
                self.labels.insert(name.to_string(), address as u16);
            }
            text = text[colon + 1..].trim();
        }
        Ok(text.to_string())
    }

    // Second pass: one instruction per non-empty line.
    fn parse_instruction(
        &self,
        text: &str,
        pc: u16,
        line_no: usize,
    ) -> Result<Instruction, AssemblerError> {
        let (mnemonic, rest) = match text.split_once(char::is_whitespace) {
            Some((m, r)) => (m, r.trim()),
            None => (text, ""),
        };
        let mnemonic = mnemonic.to_lowercase();
        let operands = split_operands(rest, line_no)?;

        match mnemonic.as_str() {
            "add" | "nand" | "mul" => {
                self.expect_operands(&operands, 3, &mnemonic, line_no)?;
                let rd = self.parse_register(operands[0], line_no)?;
                let rs = self.parse_register(operands[1], line_no)?;
                let rt = self.parse_register(operands[2], line_no)?;
                Ok(match mnemonic.as_str() {
                    "add" => Instruction::Add { rd, rs, rt },
                    "nand" => Instruction::Nand { rd, rs, rt },
                    _ => Instruction::Mul { rd, rs, rt },
                })
            },
            "addi" => {
                self.expect_operands(&operands, 3, &mnemonic, line_no)?;
                let rd = self.parse_register(operands[0], line_no)?;
                let rs = self.parse_register(operands[1], line_no)?;
                let imm = self.parse_immediate(operands[2], line_no)?;
                Ok(Instruction::Addi { rd, rs, imm })
            },
            "load" | "store" => {
                self.expect_operands(&operands, 2, &mnemonic, line_no)?;
                let rt = self.parse_register(operands[0], line_no)?;
                let (offset, base) = self.parse_memory_operand(operands[1], line_no)?;
                Ok(if mnemonic == "load" {
                    Instruction::Load { rt, base, offset }
                } else {
                    Instruction::Store { rt, base, offset }
                })
            },
            "beq" => {
                self.expect_operands(&operands, 3, &mnemonic, line_no)?;
                let ra = self.parse_register(operands[0], line_no)?;
                let rb = self.parse_register(operands[1], line_no)?;
                let offset = self.parse_branch_target(operands[2], pc, line_no)?;
                Ok(Instruction::Beq { ra, rb, offset })
            },
            "call" => {
                self.expect_operands(&operands, 1, &mnemonic, line_no)?;
                let target = self.parse_call_target(operands[0], line_no)?;
                Ok(Instruction::Call { target })
            },
            "ret" => {
                self.expect_operands(&operands, 0, &mnemonic, line_no)?;
                Ok(Instruction::Ret)
            },
            _ => Err(AssemblerError::ParseError(
                format!("unknown mnemonic '{}'", mnemonic),
                line_no,
            )),
        }
    }

    fn expect_operands(
        &self,
        operands: &[&str],
        expected: usize,
        mnemonic: &str,
        line_no: usize,
    ) -> Result<(), AssemblerError> {
        if operands.len() != expected {
            return Err(AssemblerError::OperandError(
                format!(
                    "'{}' expects {} operand(s), found {}",
                    mnemonic,
                    expected,
                    operands.len()
                ),
                line_no,
            ));
        }
        Ok(())
    }

    fn parse_register(&self, token: &str, line_no: usize) -> Result<u32, AssemblerError> {
        let name = token.trim().to_lowercase();
        self.register_map.get(&name).copied().ok_or_else(|| {
            AssemblerError::RegisterError(format!("unknown register '{}'", token.trim()), line_no)
        })
    }

    fn parse_immediate(&self, token: &str, line_no: usize) -> Result<i16, AssemblerError> {
        let value = parse_number(token).ok_or_else(|| {
            AssemblerError::SyntaxError(format!("invalid immediate '{}'", token), line_no)
        })?;
        i16::try_from(value).map_err(|_| {
            AssemblerError::RangeError(
                format!("immediate {} does not fit in 16 bits", value),
                line_no,
            )
        })
    }

    // offset(rB): the offset may be omitted, defaulting to 0.
    fn parse_memory_operand(
        &self,
        token: &str,
        line_no: usize,
    ) -> Result<(i16, u32), AssemblerError> {
        let token = token.trim();
        let open = token.find('(').ok_or_else(|| {
            AssemblerError::SyntaxError(
                format!("expected 'offset(rB)' memory operand, found '{}'", token),
                line_no,
            )
        })?;
        if !token.ends_with(')') {
            return Err(AssemblerError::SyntaxError(
                format!("unterminated memory operand '{}'", token),
                line_no,
            ));
        }
        let offset_text = token[..open].trim();
        let offset = if offset_text.is_empty() {
            0
        } else {
            self.parse_immediate(offset_text, line_no)?
        };
        let base = self.parse_register(&token[open + 1..token.len() - 1], line_no)?;
        Ok((offset, base))
    }

    // A branch target is either a signed offset or a label; label targets
    // become offsets relative to PC+1.
    fn parse_branch_target(
        &self,
        token: &str,
        pc: u16,
        line_no: usize,
    ) -> Result<i16, AssemblerError> {
        if let Some(value) = parse_number(token) {
            return i16::try_from(value).map_err(|_| {
                AssemblerError::RangeError(
                    format!("branch offset {} does not fit in 16 bits", value),
                    line_no,
                )
            });
        }
        let target = self.resolve_label(token, line_no)?;
        let offset = target as i64 - (pc as i64 + 1);
        i16::try_from(offset).map_err(|_| {
            AssemblerError::RangeError(
                format!("branch to '{}' is out of offset range", token.trim()),
                line_no,
            )
        })
    }

    // A call target is either an absolute word address or a label.
    fn parse_call_target(&self, token: &str, line_no: usize) -> Result<u16, AssemblerError> {
        if let Some(value) = parse_number(token) {
            return u16::try_from(value).map_err(|_| {
                AssemblerError::RangeError(
                    format!("call target {} is not a valid word address", value),
                    line_no,
                )
            });
        }
        self.resolve_label(token, line_no)
    }

    fn resolve_label(&self, token: &str, line_no: usize) -> Result<u16, AssemblerError> {
        let name = token.trim();
        self.labels.get(name).copied().ok_or_else(|| {
            AssemblerError::SymbolError(format!("undefined label '{}'", name), line_no)
        })
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT_CHAR) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn split_operands<'a>(rest: &'a str, line_no: usize) -> Result<Vec<&'a str>, AssemblerError> {
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let mut operands = Vec::new();
    for part in rest.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(AssemblerError::OperandError(
                "empty operand".to_string(),
                line_no,
            ));
        }
        operands.push(part);
    }
    Ok(operands)
}

fn is_valid_label(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Decimal or 0x-prefixed hex, with an optional leading sign.
fn parse_number(token: &str) -> Option<i64> {
    let token = token.trim();
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let magnitude = if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        body.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}
