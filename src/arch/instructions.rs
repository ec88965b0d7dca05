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

// instructions.rs
//
// This file contains the instruction definitions for the 16-bit RISC ISA.
// It defines the Instruction enum, which represents all supported
// instructions, along with operand accessors used by the issue logic and
// the timeline renderer.

use std::fmt;

use super::registers::LINK_REGISTER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    // Memory instructions
    Load { rt: u32, base: u32, offset: i16 },
    Store { rt: u32, base: u32, offset: i16 },

    // Control-flow instructions
    Beq { ra: u32, rb: u32, offset: i16 },
    Call { target: u16 },
    Ret,

    // Arithmetic instructions
    Add { rd: u32, rs: u32, rt: u32 },
    Addi { rd: u32, rs: u32, imm: i16 },
    Nand { rd: u32, rs: u32, rt: u32 },
    Mul { rd: u32, rs: u32, rt: u32 },
}

impl Instruction {
    /// The architectural register this instruction writes, if any.
    /// CALL writes its return address to the link register.
    pub fn destination_register(&self) -> Option<u32> {
        match *self {
            Instruction::Load { rt, .. } => Some(rt),
            Instruction::Add { rd, .. }
            | Instruction::Addi { rd, .. }
            | Instruction::Nand { rd, .. }
            | Instruction::Mul { rd, .. } => Some(rd),
            Instruction::Call { .. } => Some(LINK_REGISTER),
            Instruction::Store { .. } | Instruction::Beq { .. } | Instruction::Ret => None,
        }
    }

    /// The architectural registers this instruction reads, in operand order.
    pub fn source_registers(&self) -> Vec<u32> {
        match *self {
            Instruction::Load { base, .. } => vec![base],
            Instruction::Store { rt, base, .. } => vec![rt, base],
            Instruction::Beq { ra, rb, .. } => vec![ra, rb],
            Instruction::Call { .. } => vec![],
            Instruction::Ret => vec![LINK_REGISTER],
            Instruction::Add { rs, rt, .. }
            | Instruction::Nand { rs, rt, .. }
            | Instruction::Mul { rs, rt, .. } => vec![rs, rt],
            Instruction::Addi { rs, .. } => vec![rs],
        }
    }

    /// The signed immediate or offset carried by this instruction, if any.
    pub fn immediate(&self) -> Option<i16> {
        match *self {
            Instruction::Load { offset, .. }
            | Instruction::Store { offset, .. }
            | Instruction::Beq { offset, .. } => Some(offset),
            Instruction::Addi { imm, .. } => Some(imm),
            _ => None,
        }
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Instruction::Beq { .. } | Instruction::Call { .. } | Instruction::Ret
        )
    }

    /// Only conditional branches participate in prediction statistics;
    /// CALL is unconditional and RET resolves its target at issue.
    pub fn is_conditional_branch(&self) -> bool {
        matches!(self, Instruction::Beq { .. })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Load { rt, base, offset } => {
                write!(f, "LOAD R{}, {}(R{})", rt, offset, base)
            },
            Instruction::Store { rt, base, offset } => {
                write!(f, "STORE R{}, {}(R{})", rt, offset, base)
            },
            Instruction::Beq { ra, rb, offset } => write!(f, "BEQ R{}, R{}, {}", ra, rb, offset),
            Instruction::Call { target } => write!(f, "CALL {}", target),
            Instruction::Ret => write!(f, "RET"),
            Instruction::Add { rd, rs, rt } => write!(f, "ADD R{}, R{}, R{}", rd, rs, rt),
            Instruction::Addi { rd, rs, imm } => write!(f, "ADDI R{}, R{}, {}", rd, rs, imm),
            Instruction::Nand { rd, rs, rt } => write!(f, "NAND R{}, R{}, R{}", rd, rs, rt),
            Instruction::Mul { rd, rs, rt } => write!(f, "MUL R{}, R{}, R{}", rd, rs, rt),
        }
    }
}
