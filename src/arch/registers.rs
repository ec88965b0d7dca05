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

// registers.rs
//
// This file contains the implementation of the architectural register file.
// Eight 16-bit general-purpose registers; R0 is hardwired to zero and R7
// doubles as the link register for CALL/RET.

pub const NUM_REGISTERS: u32 = 8;
pub const LINK_REGISTER: u32 = 7;

#[derive(Debug, Clone)]
pub struct RegisterFile {
    pub data: Vec<u16>,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            data: vec![0; NUM_REGISTERS as usize],
        }
    }

    pub fn read(&self, reg_num: u32) -> u16 {
        if reg_num == 0 {
            0 // R0 is always 0
        } else if reg_num < self.data.len() as u32 {
            self.data[reg_num as usize]
        } else {
            0 // Return 0 for out-of-bounds reads
        }
    }

    pub fn write(&mut self, reg_num: u32, value: u16) {
        if reg_num != 0 && reg_num < self.data.len() as u32 {
            self.data[reg_num as usize] = value;
        }
        // Ignore writes to R0 or out-of-bounds
    }

    pub fn dump(&self) -> String {
        let mut result = String::new();
        result.push_str("Registers:\n");
        for row in 0..2 {
            for col in 0..4 {
                let reg_num = row * 4 + col;
                result.push_str(&format!("R{} = 0x{:04X}  ", reg_num, self.read(reg_num)));
            }
            result.push('\n');
        }
        result
    }
}
