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

// timeline.rs
//
// This file contains the per-instruction timeline recorder, the simulation
// statistics, and the report renderer. It provides different output
// formats (text, CSV, JSON) for the timeline table and summary.

use std::fmt;

use colored::Colorize;
use serde::Serialize;

use crate::arch::instructions::Instruction;

/// Cycle stamps for one dynamic instruction. Stages an instruction never
/// reached (because it was squashed, or because STOREs skip the CDB) stay
/// `None` and render as empty cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineRecord {
    pub index: usize,
    pub pc: u16,
    pub instruction: String,
    pub issue: Option<usize>,
    pub exec_start: Option<usize>,
    pub exec_finish: Option<usize>,
    pub write: Option<usize>,
    pub commit: Option<usize>,
}

/// Per-instruction cycle stamps in dynamic issue order.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub records: Vec<TimelineRecord>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Open a record for a newly issued instruction; returns its index.
    pub fn record_issue(&mut self, pc: u16, instruction: &Instruction, cycle: usize) -> usize {
        let index = self.records.len();
        self.records.push(TimelineRecord {
            index,
            pc,
            instruction: instruction.to_string(),
            issue: Some(cycle),
            exec_start: None,
            exec_finish: None,
            write: None,
            commit: None,
        });
        index
    }

    pub fn record_exec_start(&mut self, index: usize, cycle: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.exec_start = Some(cycle);
        }
    }

    pub fn record_exec_finish(&mut self, index: usize, cycle: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.exec_finish = Some(cycle);
        }
    }

    pub fn record_write(&mut self, index: usize, cycle: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.write = Some(cycle);
        }
    }

    pub fn record_commit(&mut self, index: usize, cycle: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.commit = Some(cycle);
        }
    }
}

/// Performance counters maintained by the pipeline controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    pub cycles: usize,
    pub instructions_issued: usize,
    pub instructions_retired: usize,
    pub branches: usize,
    pub mispredictions: usize,
}

impl SimulationStats {
    pub fn ipc(&self) -> f64 {
        if self.cycles > 0 {
            self.instructions_retired as f64 / self.cycles as f64
        } else {
            0.0
        }
    }

    /// Misprediction rate as a percentage; 0 when no branches retired.
    pub fn misprediction_rate(&self) -> f64 {
        if self.branches > 0 {
            self.mispredictions as f64 / self.branches as f64 * 100.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for SimulationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation Summary:")?;
        writeln!(f, "  Total Cycles: {}", self.cycles)?;
        writeln!(f, "  Instructions Issued: {}", self.instructions_issued)?;
        writeln!(f, "  Instructions Retired: {}", self.instructions_retired)?;
        writeln!(f, "  IPC: {:.3}", self.ipc())?;
        writeln!(f, "  Branches: {}", self.branches)?;
        writeln!(f, "  Branch Mispredictions: {}", self.mispredictions)?;
        write!(f, "  Misprediction Rate: {:.2}%", self.misprediction_rate())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
}

/// Renders the timeline and summary in the configured format.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    pub colorize_output: bool,
    pub output_format: OutputFormat,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self {
            colorize_output: true,
            output_format: OutputFormat::Text,
        }
    }

    pub fn render(&self, timeline: &Timeline, stats: &SimulationStats) -> String {
        match self.output_format {
            OutputFormat::Text => self.render_text(timeline, stats),
            OutputFormat::Csv => self.render_csv(timeline, stats),
            OutputFormat::Json => self.render_json(timeline, stats),
        }
    }

    fn render_text(&self, timeline: &Timeline, stats: &SimulationStats) -> String {
        let mut result = String::new();

        let instr_width = timeline
            .records
            .iter()
            .map(|r| r.instruction.len())
            .max()
            .unwrap_or(0)
            .max("Instruction".len());

        let header = format!(
            "{:>4}  {:<6}  {:<width$}  {:>5}  {:>9}  {:>10}  {:>5}  {:>6}",
            "Idx",
            "PC",
            "Instruction",
            "Issue",
            "ExecStart",
            "ExecFinish",
            "Write",
            "Commit",
            width = instr_width
        );
        if self.colorize_output {
            result.push_str(&format!("{}\n", header.bold()));
        } else {
            result.push_str(&header);
            result.push('\n');
        }
        result.push_str(&format!(
            "{}  {}  {}  {}  {}  {}  {}  {}\n",
            "-".repeat(4),
            "-".repeat(6),
            "-".repeat(instr_width),
            "-".repeat(5),
            "-".repeat(9),
            "-".repeat(10),
            "-".repeat(5),
            "-".repeat(6),
        ));

        for record in &timeline.records {
            let row = format!(
                "{:>4}  0x{:04X}  {:<width$}  {:>5}  {:>9}  {:>10}  {:>5}  {:>6}",
                record.index,
                record.pc,
                record.instruction,
                cell(record.issue),
                cell(record.exec_start),
                cell(record.exec_finish),
                cell(record.write),
                cell(record.commit),
                width = instr_width
            );
            if self.colorize_output && record.commit.is_none() {
                // Squashed or bypassing instructions never commit/write
                result.push_str(&format!("{}\n", row.yellow()));
            } else {
                result.push_str(&row);
                result.push('\n');
            }
        }

        result.push('\n');
        let summary = stats.to_string();
        if self.colorize_output && stats.mispredictions > 0 {
            result.push_str(&summary.replace(
                &format!("Branch Mispredictions: {}", stats.mispredictions),
                &format!(
                    "Branch Mispredictions: {}",
                    stats.mispredictions.to_string().red()
                ),
            ));
        } else {
            result.push_str(&summary);
        }
        result.push('\n');
        result
    }

    fn render_csv(&self, timeline: &Timeline, stats: &SimulationStats) -> String {
        let mut result = String::new();
        result.push_str("index,pc,instruction,issue,exec_start,exec_finish,write,commit\n");
        for record in &timeline.records {
            result.push_str(&format!(
                "{},0x{:04X},\"{}\",{},{},{},{},{}\n",
                record.index,
                record.pc,
                record.instruction,
                cell(record.issue),
                cell(record.exec_start),
                cell(record.exec_finish),
                cell(record.write),
                cell(record.commit),
            ));
        }
        result.push('\n');
        result.push_str("cycles,instructions_issued,instructions_retired,ipc,branches,mispredictions,misprediction_rate\n");
        result.push_str(&format!(
            "{},{},{},{:.3},{},{},{:.2}\n",
            stats.cycles,
            stats.instructions_issued,
            stats.instructions_retired,
            stats.ipc(),
            stats.branches,
            stats.mispredictions,
            stats.misprediction_rate(),
        ));
        result
    }

    fn render_json(&self, timeline: &Timeline, stats: &SimulationStats) -> String {
        let doc = serde_json::json!({
            "timeline": timeline.records,
            "summary": {
                "total_cycles": stats.cycles,
                "instructions_issued": stats.instructions_issued,
                "instructions_retired": stats.instructions_retired,
                "ipc": stats.ipc(),
                "branches": stats.branches,
                "mispredictions": stats.mispredictions,
                "misprediction_rate": stats.misprediction_rate(),
            },
        });
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
    }
}

fn cell(value: Option<usize>) -> String {
    match value {
        Some(cycle) => cycle.to_string(),
        None => String::new(),
    }
}
