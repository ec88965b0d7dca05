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

// config.rs
//
// This file contains the configuration structs for the pipeline engine:
// reservation-station counts, execution-lane counts, and latencies per
// functional unit kind, plus the reorder-buffer capacity.

use super::tomasulo::UnitKind;

/// Per-unit resources: station count, parallel execution lanes, and the
/// total cycles from execution start to finish.
#[derive(Debug, Clone, Copy)]
pub struct UnitConfig {
    pub stations: usize,
    pub lanes: usize,
    pub latency: usize,
}

impl UnitConfig {
    pub fn new(stations: usize, latency: usize) -> Self {
        assert!(stations > 0, "Station count must be positive");
        assert!(latency > 0, "Latency must be positive");
        Self {
            stations,
            lanes: stations,
            latency,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub rob_size: usize,
    pub load_unit: UnitConfig,
    pub store_unit: UnitConfig,
    pub branch_unit: UnitConfig,
    pub call_ret_unit: UnitConfig,
    pub alu_unit: UnitConfig,
    pub nand_unit: UnitConfig,
    pub mul_unit: UnitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineConfig {
    /// The default configuration: 2 load stations at 6 cycles (2 address +
    /// 4 memory), 1 store at 6, 1 branch at 1, 1 call/ret at 1, 4 adders
    /// at 2, 2 nand units at 1, 1 multiplier at 8; 16 ROB slots.
    pub fn new() -> Self {
        Self {
            rob_size: 16,
            load_unit: UnitConfig::new(2, 6),
            store_unit: UnitConfig::new(1, 6),
            branch_unit: UnitConfig::new(1, 1),
            call_ret_unit: UnitConfig::new(1, 1),
            alu_unit: UnitConfig::new(4, 2),
            nand_unit: UnitConfig::new(2, 1),
            mul_unit: UnitConfig::new(1, 8),
        }
    }

    pub fn with_rob_size(mut self, size: usize) -> Self {
        assert!(size > 0, "ROB size must be positive");
        self.rob_size = size;
        self
    }

    pub fn with_unit(mut self, kind: UnitKind, stations: usize, latency: usize) -> Self {
        *self.unit_mut(kind) = UnitConfig::new(stations, latency);
        self
    }

    /// Narrow a unit's execution lanes below its station count.
    pub fn with_lanes(mut self, kind: UnitKind, lanes: usize) -> Self {
        assert!(lanes > 0, "Lane count must be positive");
        let unit = self.unit_mut(kind);
        assert!(
            lanes <= unit.stations,
            "Lane count cannot exceed station count"
        );
        unit.lanes = lanes;
        self
    }

    pub fn unit(&self, kind: UnitKind) -> UnitConfig {
        match kind {
            UnitKind::Load => self.load_unit,
            UnitKind::Store => self.store_unit,
            UnitKind::Branch => self.branch_unit,
            UnitKind::CallRet => self.call_ret_unit,
            UnitKind::Alu => self.alu_unit,
            UnitKind::Nand => self.nand_unit,
            UnitKind::Mul => self.mul_unit,
        }
    }

    fn unit_mut(&mut self, kind: UnitKind) -> &mut UnitConfig {
        match kind {
            UnitKind::Load => &mut self.load_unit,
            UnitKind::Store => &mut self.store_unit,
            UnitKind::Branch => &mut self.branch_unit,
            UnitKind::CallRet => &mut self.call_ret_unit,
            UnitKind::Alu => &mut self.alu_unit,
            UnitKind::Nand => &mut self.nand_unit,
            UnitKind::Mul => &mut self.mul_unit,
        }
    }
}
