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

// simulator.rs
//
// This file contains the pipeline controller. It owns the cycle counter
// and every piece of engine state, and runs the four stage actions in the
// order Commit -> Write-Result -> Execute -> Issue each cycle. That order
// is part of the timing contract: a result broadcast this cycle is visible
// to this cycle's Issue but cannot start executing until the next cycle,
// and a station freed by Write-Result is only observed free next cycle.

use log::{debug, warn};

use super::config::PipelineConfig;
use super::timeline::{SimulationStats, Timeline};
use super::tomasulo::{
    CommonDataBus, ExecOutcome, FunctionalUnit, RegisterAliasTable, ReorderBuffer,
    ReservationStation, RobState, RobTag, UnitKind,
};
use crate::arch::instructions::Instruction;
use crate::arch::memory::Memory;
use crate::arch::registers::{RegisterFile, LINK_REGISTER, NUM_REGISTERS};
use crate::assembler::Program;
use crate::errors::SimulatorError;

/// Result of the commit stage for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing ready at the ROB head.
    Idle,
    /// One instruction retired.
    Retired,
    /// A mispredicted branch retired; all speculative state must be
    /// squashed and fetch redirected to `target`.
    Squashed { target: u16 },
}

/// A source-register read at issue time.
enum OperandRead {
    Value(u16),
    Pending(RobTag),
}

pub struct Simulator {
    pub registers: RegisterFile,
    pub memory: Memory,
    pub program: Program,
    /// Speculative fetch pointer, distinct from the architectural PC
    /// implied by the ROB head.
    pub fetch_pc: u16,
    pub stations: Vec<ReservationStation>,
    pub units: Vec<FunctionalUnit>,
    pub rob: ReorderBuffer,
    pub rat: RegisterAliasTable,
    pub cdb: CommonDataBus,
    pub timeline: Timeline,
    pub stats: SimulationStats,
    pub cycle: usize,
    pending_release: Vec<usize>,
    pending_lane_release: Vec<usize>,
}

impl Simulator {
    pub fn new(config: &PipelineConfig, program: Program, memory: Memory) -> Self {
        let mut stations = Vec::new();
        let mut units = Vec::new();
        for kind in UnitKind::ALL {
            let unit_config = config.unit(kind);
            for _ in 0..unit_config.stations {
                stations.push(ReservationStation::new(stations.len(), kind));
            }
            units.push(FunctionalUnit::new(
                kind,
                unit_config.lanes,
                unit_config.latency,
            ));
        }

        let fetch_pc = program.start_address;
        Self {
            registers: RegisterFile::new(),
            memory,
            program,
            fetch_pc,
            stations,
            units,
            rob: ReorderBuffer::new(config.rob_size),
            rat: RegisterAliasTable::new(NUM_REGISTERS),
            cdb: CommonDataBus::new(),
            timeline: Timeline::new(),
            stats: SimulationStats::default(),
            cycle: 0,
            pending_release: Vec::new(),
            pending_lane_release: Vec::new(),
        }
    }

    /// Run until the fetch pointer has passed the program and the ROB has
    /// drained. There is no upper cycle bound; a stuck pipeline surfaces
    /// as a deadlock error instead.
    pub fn run(&mut self) -> Result<(), SimulatorError> {
        debug!(
            "starting simulation at PC 0x{:04X}, {} instruction(s)",
            self.fetch_pc,
            self.program.len()
        );
        while !self.finished() {
            self.step()?;
        }
        debug!("simulation finished after {} cycle(s)", self.cycle);
        Ok(())
    }

    pub fn finished(&self) -> bool {
        self.fetch_exhausted() && self.rob.is_empty()
    }

    fn fetch_exhausted(&self) -> bool {
        self.program.fetch(self.fetch_pc).is_none()
    }

    /// Advance the engine by one cycle.
    pub fn step(&mut self) -> Result<(), SimulatorError> {
        self.cycle += 1;

        let outcome = self.commit()?;
        if let CommitOutcome::Squashed { target } = outcome {
            self.squash(target);
            self.stats.cycles = self.cycle;
            return Ok(());
        }

        let wrote = self.write_result();
        let executed = self.execute()?;
        let issued = self.issue();
        self.release_stations();
        self.stats.cycles = self.cycle;

        let progress = outcome == CommitOutcome::Retired || wrote || executed || issued;
        if !progress && !self.rob.is_empty() && self.fetch_exhausted() {
            return Err(SimulatorError::Deadlock {
                cycle: self.cycle,
                state: self.dump_state(),
            });
        }
        Ok(())
    }

    // ---- Commit ---------------------------------------------------------

    fn commit(&mut self) -> Result<CommitOutcome, SimulatorError> {
        let Some(tag) = self.rob.head_tag() else {
            return Ok(CommitOutcome::Idle);
        };

        let ready = {
            let entry = self.rob.entry(tag);
            match entry.state {
                RobState::ReadyToCommit => true,
                RobState::Written => entry.dest_reg.is_some(),
                _ => false,
            }
        };
        if !ready {
            return Ok(CommitOutcome::Idle);
        }

        let entry = self.rob.entry(tag);
        let Some(instruction) = entry.instruction else {
            return Ok(CommitOutcome::Idle);
        };
        let pc = entry.pc;
        let dest_reg = entry.dest_reg;
        let value = entry.value;
        let dest_addr = entry.dest_addr;
        let actual_next_pc = entry.actual_next_pc;
        let mispredicted = entry.mispredicted;
        let timeline_index = entry.timeline_index;

        // Architectural state changes only here
        match instruction {
            Instruction::Store { .. } => {
                let addr = dest_addr.unwrap_or(-1);
                if addr < 0 || addr as usize >= self.memory.size {
                    return Err(SimulatorError::StoreOutOfBounds { tag, pc, addr });
                }
                let _ = self.memory.write_word(addr as usize, value.unwrap_or(0));
            },
            _ => {
                if let Some(dest) = dest_reg {
                    self.registers.write(dest, value.unwrap_or(0));
                    // Later issues may have re-renamed the register
                    if self.rat.mapping(dest) == Some(tag) {
                        self.rat.clear_mapping(dest);
                    }
                }
            },
        }

        self.timeline.record_commit(timeline_index, self.cycle);
        self.stats.instructions_retired += 1;
        self.rob.pop_head();
        debug!(
            "cycle {}: committed tag {} ({} at PC 0x{:04X})",
            self.cycle, tag, instruction, pc
        );

        if instruction.is_conditional_branch() {
            self.stats.branches += 1;
            if mispredicted {
                self.stats.mispredictions += 1;
                let target = actual_next_pc.unwrap_or_else(|| pc.wrapping_add(1));
                return Ok(CommitOutcome::Squashed { target });
            }
        }
        Ok(CommitOutcome::Retired)
    }

    /// Atomically invalidate all speculative state and redirect fetch.
    fn squash(&mut self, target: u16) {
        warn!(
            "cycle {}: branch mispredicted, squashing pipeline; fetch redirected to 0x{:04X}",
            self.cycle, target
        );
        self.rob.clear();
        for station in &mut self.stations {
            station.reset();
        }
        for unit in &mut self.units {
            unit.reset();
        }
        self.rat.clear_all();
        self.cdb.clear();
        self.pending_release.clear();
        self.pending_lane_release.clear();
        self.fetch_pc = target;
    }

    // ---- Write-Result ---------------------------------------------------

    fn write_result(&mut self) -> bool {
        self.cdb.clear();

        // Oldest completed, un-broadcast result wins the bus
        let mut candidate: Option<(usize, usize)> = None;
        for (idx, station) in self.stations.iter().enumerate() {
            if !station.busy || station.result.is_none() {
                continue;
            }
            let Some(tag) = station.dest else { continue };
            let age = self.rob.program_age(tag);
            if candidate.map_or(true, |(_, best)| age < best) {
                candidate = Some((idx, age));
            }
        }
        let Some((idx, _)) = candidate else {
            return false;
        };

        let (outcome, tag) = {
            let station = &self.stations[idx];
            match (station.result, station.dest) {
                (Some(outcome), Some(tag)) => (outcome, tag),
                _ => return false,
            }
        };
        let timeline_index = self.rob.entry(tag).timeline_index;

        match outcome {
            ExecOutcome::Value(value) => {
                let entry = self.rob.entry_mut(tag);
                entry.value = Some(value);
                entry.state = RobState::Written;
                self.cdb.broadcast(tag, value);
            },
            ExecOutcome::Control { next_pc, link } => {
                let entry = self.rob.entry_mut(tag);
                entry.actual_next_pc = Some(next_pc);
                entry.mispredicted = next_pc != entry.predicted_next_pc;
                match link {
                    Some(value) => {
                        // CALL: the link value is a real register result
                        entry.value = Some(value);
                        entry.state = RobState::Written;
                        self.cdb.broadcast(tag, value);
                    },
                    None => {
                        entry.state = RobState::ReadyToCommit;
                    },
                }
            },
            // Stores bypass the CDB entirely
            ExecOutcome::StoreReady { .. } => {},
        }

        // Waiting stations snoop the bus for the value just driven onto it
        self.forward();

        self.timeline.record_write(timeline_index, self.cycle);
        debug!("cycle {}: tag {} wrote result on the CDB", self.cycle, tag);

        let station = &mut self.stations[idx];
        station.result = None;
        // Freed at end of cycle; Issue still sees it busy this cycle
        self.pending_release.push(idx);
        true
    }

    /// Deliver the current CDB broadcast to every busy station with a
    /// matching Q tag.
    fn forward(&mut self) {
        let Some((tag, value)) = self.cdb.data else {
            return;
        };
        let cycle = self.cycle;
        for station in &mut self.stations {
            if station.busy {
                station.capture(tag, value, cycle);
            }
        }
    }

    // ---- Execute --------------------------------------------------------

    fn execute(&mut self) -> Result<bool, SimulatorError> {
        let mut progress = false;

        // Advance stations already executing
        for idx in 0..self.stations.len() {
            let advancing = {
                let station = &self.stations[idx];
                station.busy
                    && station.result.is_none()
                    && matches!(station.cycles_remaining, Some(remaining) if remaining > 0)
            };
            if !advancing {
                continue;
            }
            progress = true;
            let finished = {
                let station = &mut self.stations[idx];
                let remaining = station.cycles_remaining.unwrap_or(1) - 1;
                station.cycles_remaining = Some(remaining);
                remaining == 0
            };
            if finished {
                self.finish_execution(idx)?;
            }
        }

        // Start ready stations, oldest program order first
        while let Some(idx) = self.pick_ready_station() {
            progress = true;
            let kind = self.stations[idx].unit;
            let latency = self.units[kind as usize].latency;
            self.units[kind as usize].seize_lane();

            if let Some(tag) = self.stations[idx].dest {
                let timeline_index = self.rob.entry(tag).timeline_index;
                self.timeline.record_exec_start(timeline_index, self.cycle);
                self.rob.entry_mut(tag).state = RobState::Executing;
                debug!(
                    "cycle {}: tag {} started on {} ({} cycle latency)",
                    self.cycle, tag, kind, latency
                );
            }

            // The start cycle counts toward the latency, so a 1-cycle
            // operation finishes the cycle it starts
            let remaining = latency - 1;
            self.stations[idx].cycles_remaining = Some(remaining);
            if remaining == 0 {
                self.finish_execution(idx)?;
            }
        }

        Ok(progress)
    }

    fn pick_ready_station(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (idx, station) in self.stations.iter().enumerate() {
            if !station.is_ready() {
                continue;
            }
            // A station made ready by this cycle's broadcast waits a cycle
            if station.forwarded_at == Some(self.cycle) {
                continue;
            }
            if !self.units[station.unit as usize].has_free_lane() {
                continue;
            }
            let Some(tag) = station.dest else { continue };
            let age = self.rob.program_age(tag);
            if best.map_or(true, |(_, b)| age < b) {
                best = Some((idx, age));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn finish_execution(&mut self, idx: usize) -> Result<(), SimulatorError> {
        let (op, pc, vj, vk, a, dest, kind) = {
            let station = &self.stations[idx];
            (
                station.op,
                station.pc,
                station.vj.unwrap_or(0),
                station.vk.unwrap_or(0),
                station.a,
                station.dest,
                station.unit,
            )
        };
        let (Some(op), Some(tag)) = (op, dest) else {
            return Ok(());
        };

        let outcome = self.compute_outcome(&op, pc, vj, vk, a, tag)?;
        // The unit lane stays busy through the finishing cycle
        self.pending_lane_release.push(kind as usize);

        let timeline_index = self.rob.entry(tag).timeline_index;
        self.timeline.record_exec_finish(timeline_index, self.cycle);
        debug!("cycle {}: tag {} finished execution", self.cycle, tag);

        if let ExecOutcome::StoreReady { addr, value } = outcome {
            // Stores skip the CDB: ready to commit the cycle they finish
            let entry = self.rob.entry_mut(tag);
            entry.dest_addr = Some(addr);
            entry.value = Some(value);
            entry.state = RobState::ReadyToCommit;
            self.pending_release.push(idx);
        } else {
            self.stations[idx].result = Some(outcome);
        }
        Ok(())
    }

    fn compute_outcome(
        &self,
        op: &Instruction,
        pc: u16,
        vj: u16,
        vk: u16,
        a: i16,
        tag: RobTag,
    ) -> Result<ExecOutcome, SimulatorError> {
        match *op {
            Instruction::Add { .. } => Ok(ExecOutcome::Value(vj.wrapping_add(vk))),
            Instruction::Addi { .. } => Ok(ExecOutcome::Value(vj.wrapping_add(a as u16))),
            Instruction::Nand { .. } => Ok(ExecOutcome::Value(!(vj & vk))),
            Instruction::Mul { .. } => Ok(ExecOutcome::Value(vj.wrapping_mul(vk))),
            Instruction::Load { .. } => {
                let addr = vj as i32 + a as i32;
                if addr < 0 {
                    return Err(SimulatorError::LoadOutOfBounds { tag, pc, addr });
                }
                // Loads observe committed memory only; ordering against
                // in-flight stores comes from in-order commit
                match self.memory.read_word(addr as usize) {
                    Some(value) => Ok(ExecOutcome::Value(value)),
                    None => Err(SimulatorError::LoadOutOfBounds { tag, pc, addr }),
                }
            },
            Instruction::Store { .. } => Ok(ExecOutcome::StoreReady {
                addr: vk as i32 + a as i32,
                value: vj,
            }),
            Instruction::Beq { .. } => {
                let next_pc = if vj == vk {
                    (pc as i32 + 1 + a as i32) as u16
                } else {
                    pc.wrapping_add(1)
                };
                Ok(ExecOutcome::Control {
                    next_pc,
                    link: None,
                })
            },
            Instruction::Call { target } => Ok(ExecOutcome::Control {
                next_pc: target,
                link: Some(pc.wrapping_add(1)),
            }),
            Instruction::Ret => Ok(ExecOutcome::Control {
                next_pc: vj,
                link: None,
            }),
        }
    }

    // ---- Issue ----------------------------------------------------------

    fn issue(&mut self) -> bool {
        let Some(&instruction) = self.program.fetch(self.fetch_pc) else {
            return false;
        };
        let pc = self.fetch_pc;

        // Structural hazards: need a ROB slot and a station of the right kind
        if self.rob.is_full() {
            debug!("cycle {}: issue stalled, ROB full", self.cycle);
            return false;
        }
        let kind = UnitKind::for_instruction(&instruction);
        let Some(station_idx) = self.free_station(kind) else {
            debug!(
                "cycle {}: issue stalled, no free {} station",
                self.cycle, kind
            );
            return false;
        };

        // RET resolves its return address at issue, stalling until R7's
        // value exists; this keeps the predictor stateless
        let ret_target = if matches!(instruction, Instruction::Ret) {
            match self.read_operand(LINK_REGISTER) {
                OperandRead::Value(value) => Some(value),
                OperandRead::Pending(_) => {
                    debug!(
                        "cycle {}: RET at PC 0x{:04X} stalled on R7",
                        self.cycle, pc
                    );
                    return false;
                },
            }
        } else {
            None
        };

        // Source operand capture. Unused slots hold a known zero so a
        // busy station always has exactly one of V/Q live per slot.
        let mut vj = Some(0u16);
        let mut vk = Some(0u16);
        let mut qj = None;
        let mut qk = None;
        let mut a: i16 = 0;
        match instruction {
            Instruction::Load { base, offset, .. } => {
                self.capture_operand(base, &mut vj, &mut qj);
                a = offset;
            },
            Instruction::Store { rt, base, offset } => {
                self.capture_operand(rt, &mut vj, &mut qj);
                self.capture_operand(base, &mut vk, &mut qk);
                a = offset;
            },
            Instruction::Beq { ra, rb, offset } => {
                self.capture_operand(ra, &mut vj, &mut qj);
                self.capture_operand(rb, &mut vk, &mut qk);
                a = offset;
            },
            Instruction::Add { rs, rt, .. }
            | Instruction::Nand { rs, rt, .. }
            | Instruction::Mul { rs, rt, .. } => {
                self.capture_operand(rs, &mut vj, &mut qj);
                self.capture_operand(rt, &mut vk, &mut qk);
            },
            Instruction::Addi { rs, imm, .. } => {
                self.capture_operand(rs, &mut vj, &mut qj);
                a = imm;
            },
            Instruction::Call { .. } => {},
            Instruction::Ret => {
                vj = ret_target;
            },
        }

        let dest_reg = instruction.destination_register();
        // Static not-taken prediction: fall through unless the transfer is
        // unconditional (CALL) or already resolved (RET)
        let predicted_next_pc = match instruction {
            Instruction::Call { target } => target,
            Instruction::Ret => ret_target.unwrap_or_else(|| pc.wrapping_add(1)),
            _ => pc.wrapping_add(1),
        };

        let timeline_index = self.timeline.record_issue(pc, &instruction, self.cycle);
        let Some(tag) =
            self.rob
                .allocate(instruction, pc, dest_reg, predicted_next_pc, timeline_index)
        else {
            return false;
        };
        if let Some(dest) = dest_reg {
            self.rat.set_mapping(dest, tag);
        }
        self.stations[station_idx].issue(instruction, pc, vj, vk, qj, qk, a, tag);

        self.fetch_pc = predicted_next_pc;
        self.stats.instructions_issued += 1;
        debug!(
            "cycle {}: issued {} at PC 0x{:04X} as tag {}",
            self.cycle, instruction, pc, tag
        );
        true
    }

    fn free_station(&self, kind: UnitKind) -> Option<usize> {
        self.stations
            .iter()
            .position(|station| station.unit == kind && !station.busy)
    }

    fn read_operand(&self, reg: u32) -> OperandRead {
        if let Some(tag) = self.rat.mapping(reg) {
            let entry = self.rob.entry(tag);
            match entry.value {
                Some(value) if entry.has_value() => OperandRead::Value(value),
                _ => OperandRead::Pending(tag),
            }
        } else {
            OperandRead::Value(self.registers.read(reg))
        }
    }

    fn capture_operand(&self, reg: u32, v: &mut Option<u16>, q: &mut Option<RobTag>) {
        match self.read_operand(reg) {
            OperandRead::Value(value) => {
                *v = Some(value);
                *q = None;
            },
            OperandRead::Pending(tag) => {
                *v = None;
                *q = Some(tag);
            },
        }
    }

    // ---- Housekeeping ---------------------------------------------------

    fn release_stations(&mut self) {
        for idx in std::mem::take(&mut self.pending_release) {
            self.stations[idx].reset();
        }
        for unit_idx in std::mem::take(&mut self.pending_lane_release) {
            self.units[unit_idx].release_lane();
        }
    }

    /// A formatted dump of the engine state, used by the deadlock report.
    pub fn dump_state(&self) -> String {
        let mut result = String::new();
        result.push_str(&self.rob.dump());
        result.push_str("\n=== Reservation Stations ===\n");
        for station in &self.stations {
            if station.busy {
                result.push_str(&format!(
                    "[{}] {} {:?} Vj: {:?} Vk: {:?} Qj: {:?} Qk: {:?} Dest: {:?} Remaining: {:?}\n",
                    station.id,
                    station.unit,
                    station.op,
                    station.vj,
                    station.vk,
                    station.qj,
                    station.qk,
                    station.dest,
                    station.cycles_remaining,
                ));
            }
        }
        result.push_str("\n=== Register Alias Table ===\n");
        for reg in 0..NUM_REGISTERS {
            if let Some(tag) = self.rat.mapping(reg) {
                result.push_str(&format!("R{} -> ROB[{}]\n", reg, tag));
            }
        }
        result
    }
}
