// tomasulo.rs - Tomasulo machinery for out-of-order execution
//
// Tomasulo's algorithm is a hardware algorithm for dynamic scheduling of
// instructions to allow out-of-order execution. This module defines the
// hardware structures the pipeline is built from:
//   - Reservation stations holding issued instructions and their operands
//   - A reorder buffer (ROB) for speculative, in-order commit
//   - The register alias table (RAT) for register renaming
//   - The common data bus (CDB) for result forwarding
//   - Functional-unit lane tracking

use std::fmt;

use crate::arch::instructions::Instruction;

/// Stable identifier of a ROB slot; reused only after commit or squash.
pub type RobTag = usize;

/// Kind of functional unit that executes an instruction.
/// Variant order fixes the unit indexing used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Load,
    Store,
    Branch,
    CallRet,
    Alu,
    Nand,
    Mul,
}

impl UnitKind {
    pub const ALL: [UnitKind; 7] = [
        UnitKind::Load,
        UnitKind::Store,
        UnitKind::Branch,
        UnitKind::CallRet,
        UnitKind::Alu,
        UnitKind::Nand,
        UnitKind::Mul,
    ];

    pub fn for_instruction(instruction: &Instruction) -> Self {
        match instruction {
            Instruction::Load { .. } => UnitKind::Load,
            Instruction::Store { .. } => UnitKind::Store,
            Instruction::Beq { .. } => UnitKind::Branch,
            Instruction::Call { .. } | Instruction::Ret => UnitKind::CallRet,
            Instruction::Add { .. } | Instruction::Addi { .. } => UnitKind::Alu,
            Instruction::Nand { .. } => UnitKind::Nand,
            Instruction::Mul { .. } => UnitKind::Mul,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnitKind::Load => "LOAD",
            UnitKind::Store => "STORE",
            UnitKind::Branch => "BEQ",
            UnitKind::CallRet => "CALL/RET",
            UnitKind::Alu => "ALU",
            UnitKind::Nand => "NAND",
            UnitKind::Mul => "MUL",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Progress of an in-flight instruction through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobState {
    Issued,
    Executing,
    Written,
    ReadyToCommit,
}

/// Result computed by a reservation station, held until broadcast (or, for
/// stores, written straight into the ROB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Arithmetic or load result.
    Value(u16),
    /// Store effective address and the value to write at commit. The
    /// address stays signed until the commit-time bounds check.
    StoreReady { addr: i32, value: u16 },
    /// Control-flow resolution; CALL carries its link value.
    Control { next_pc: u16, link: Option<u16> },
}

/// Reservation station entry
#[derive(Debug, Clone)]
pub struct ReservationStation {
    pub id: usize,
    pub unit: UnitKind,
    pub busy: bool,
    pub op: Option<Instruction>,
    pub pc: u16,
    pub vj: Option<u16>,
    pub vk: Option<u16>,
    pub qj: Option<RobTag>,
    pub qk: Option<RobTag>,
    pub a: i16,
    pub dest: Option<RobTag>,
    /// None until execution starts; Some(0) once the result is computed.
    pub cycles_remaining: Option<usize>,
    pub result: Option<ExecOutcome>,
    /// Cycle of the last CDB capture into this station. A station made
    /// ready by this cycle's broadcast must not start until the next.
    pub forwarded_at: Option<usize>,
}

impl ReservationStation {
    pub fn new(id: usize, unit: UnitKind) -> Self {
        Self {
            id,
            unit,
            busy: false,
            op: None,
            pc: 0,
            vj: None,
            vk: None,
            qj: None,
            qk: None,
            a: 0,
            dest: None,
            cycles_remaining: None,
            result: None,
            forwarded_at: None,
        }
    }

    /// Operands available and execution not yet begun.
    pub fn is_ready(&self) -> bool {
        self.busy && self.qj.is_none() && self.qk.is_none() && self.cycles_remaining.is_none()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        &mut self,
        op: Instruction,
        pc: u16,
        vj: Option<u16>,
        vk: Option<u16>,
        qj: Option<RobTag>,
        qk: Option<RobTag>,
        a: i16,
        dest: RobTag,
    ) {
        self.busy = true;
        self.op = Some(op);
        self.pc = pc;
        self.vj = vj;
        self.vk = vk;
        self.qj = qj;
        self.qk = qk;
        self.a = a;
        self.dest = Some(dest);
        self.cycles_remaining = None;
        self.result = None;
        self.forwarded_at = None;
    }

    /// Capture a CDB broadcast into any matching Q slot.
    pub fn capture(&mut self, tag: RobTag, value: u16, cycle: usize) {
        if self.qj == Some(tag) {
            self.vj = Some(value);
            self.qj = None;
            self.forwarded_at = Some(cycle);
        }
        if self.qk == Some(tag) {
            self.vk = Some(value);
            self.qk = None;
            self.forwarded_at = Some(cycle);
        }
    }

    pub fn reset(&mut self) {
        self.busy = false;
        self.op = None;
        self.pc = 0;
        self.vj = None;
        self.vk = None;
        self.qj = None;
        self.qk = None;
        self.a = 0;
        self.dest = None;
        self.cycles_remaining = None;
        self.result = None;
        self.forwarded_at = None;
    }
}

/// Reorder Buffer entry
#[derive(Debug, Clone)]
pub struct RobEntry {
    pub tag: RobTag,
    pub busy: bool,
    pub instruction: Option<Instruction>,
    pub pc: u16,
    pub state: RobState,
    pub dest_reg: Option<u32>,
    pub value: Option<u16>,
    pub dest_addr: Option<i32>,
    pub predicted_next_pc: u16,
    pub actual_next_pc: Option<u16>,
    pub mispredicted: bool,
    pub timeline_index: usize,
}

impl RobEntry {
    pub fn new(tag: RobTag) -> Self {
        Self {
            tag,
            busy: false,
            instruction: None,
            pc: 0,
            state: RobState::Issued,
            dest_reg: None,
            value: None,
            dest_addr: None,
            predicted_next_pc: 0,
            actual_next_pc: None,
            mispredicted: false,
            timeline_index: 0,
        }
    }

    pub fn allocate(
        &mut self,
        instruction: Instruction,
        pc: u16,
        dest_reg: Option<u32>,
        predicted_next_pc: u16,
        timeline_index: usize,
    ) {
        self.busy = true;
        self.instruction = Some(instruction);
        self.pc = pc;
        self.state = RobState::Issued;
        self.dest_reg = dest_reg;
        self.value = None;
        self.dest_addr = None;
        self.predicted_next_pc = predicted_next_pc;
        self.actual_next_pc = None;
        self.mispredicted = false;
        self.timeline_index = timeline_index;
    }

    /// Whether an issuing instruction can copy this entry's value.
    pub fn has_value(&self) -> bool {
        matches!(self.state, RobState::Written | RobState::ReadyToCommit) && self.value.is_some()
    }

    pub fn reset(&mut self) {
        self.busy = false;
        self.instruction = None;
        self.pc = 0;
        self.state = RobState::Issued;
        self.dest_reg = None;
        self.value = None;
        self.dest_addr = None;
        self.predicted_next_pc = 0;
        self.actual_next_pc = None;
        self.mispredicted = false;
        self.timeline_index = 0;
    }
}

/// Arena-style circular reorder buffer. Live entries form a contiguous
/// program-order window; the head is the oldest in-flight instruction.
#[derive(Debug, Clone)]
pub struct ReorderBuffer {
    pub entries: Vec<RobEntry>,
    head: usize,
    len: usize,
}

impl ReorderBuffer {
    pub fn new(capacity: usize) -> Self {
        let entries = (0..capacity).map(RobEntry::new).collect();
        Self {
            entries,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.entries.len()
    }

    /// Allocate the next tail slot, returning its tag.
    pub fn allocate(
        &mut self,
        instruction: Instruction,
        pc: u16,
        dest_reg: Option<u32>,
        predicted_next_pc: u16,
        timeline_index: usize,
    ) -> Option<RobTag> {
        if self.is_full() {
            return None;
        }
        let tag = (self.head + self.len) % self.entries.len();
        self.entries[tag].allocate(instruction, pc, dest_reg, predicted_next_pc, timeline_index);
        self.len += 1;
        Some(tag)
    }

    pub fn head_tag(&self) -> Option<RobTag> {
        if self.is_empty() {
            None
        } else {
            Some(self.head)
        }
    }

    pub fn entry(&self, tag: RobTag) -> &RobEntry {
        &self.entries[tag]
    }

    pub fn entry_mut(&mut self, tag: RobTag) -> &mut RobEntry {
        &mut self.entries[tag]
    }

    /// Retire the head entry and free its slot.
    pub fn pop_head(&mut self) {
        if self.is_empty() {
            return;
        }
        self.entries[self.head].reset();
        self.head = (self.head + 1) % self.entries.len();
        self.len -= 1;
    }

    /// Distance of a live tag from the head; smaller is older.
    pub fn program_age(&self, tag: RobTag) -> usize {
        (tag + self.entries.len() - self.head) % self.entries.len()
    }

    /// Squash: invalidate every in-flight entry.
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            entry.reset();
        }
        self.len = 0;
    }

    pub fn dump(&self) -> String {
        let mut result = String::new();
        result.push_str("=== Reorder Buffer ===\n");
        for i in 0..self.len {
            let tag = (self.head + i) % self.entries.len();
            let entry = &self.entries[tag];
            if let Some(instruction) = &entry.instruction {
                result.push_str(&format!(
                    "[{}] {} PC 0x{:04X}: {} {:?} value={:?}\n",
                    tag,
                    if i == 0 { "HEAD" } else { "    " },
                    entry.pc,
                    instruction,
                    entry.state,
                    entry.value,
                ));
            }
        }
        result
    }
}

/// Register Alias Table (RAT) for register renaming
#[derive(Debug, Clone)]
pub struct RegisterAliasTable {
    mapping: Vec<Option<RobTag>>,
}

impl RegisterAliasTable {
    pub fn new(num_registers: u32) -> Self {
        Self {
            mapping: vec![None; num_registers as usize],
        }
    }

    pub fn mapping(&self, reg: u32) -> Option<RobTag> {
        self.mapping.get(reg as usize).copied().flatten()
    }

    pub fn set_mapping(&mut self, reg: u32, tag: RobTag) {
        // R0 is hardwired to zero and never renamed
        if reg != 0 && (reg as usize) < self.mapping.len() {
            self.mapping[reg as usize] = Some(tag);
        }
    }

    pub fn clear_mapping(&mut self, reg: u32) {
        if (reg as usize) < self.mapping.len() {
            self.mapping[reg as usize] = None;
        }
    }

    pub fn clear_all(&mut self) {
        for entry in &mut self.mapping {
            *entry = None;
        }
    }

    pub fn is_clear(&self) -> bool {
        self.mapping.iter().all(Option::is_none)
    }
}

/// Common Data Bus (CDB): at most one result broadcast per cycle,
/// arbitrated oldest-tag-first by the write-result stage. `data` holds
/// the (tag, value) driven onto the bus this cycle; waiting stations
/// snoop it to fill their Q slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonDataBus {
    pub data: Option<(RobTag, u16)>,
}

impl CommonDataBus {
    pub fn new() -> Self {
        Self { data: None }
    }

    pub fn broadcast(&mut self, tag: RobTag, value: u16) {
        self.data = Some((tag, value));
    }

    pub fn clear(&mut self) {
        self.data = None;
    }
}

/// Execution lanes for one unit kind. A lane is seized when a station
/// starts executing and released when its countdown reaches zero.
#[derive(Debug, Clone)]
pub struct FunctionalUnit {
    pub kind: UnitKind,
    pub lanes: usize,
    pub latency: usize,
    pub busy_lanes: usize,
}

impl FunctionalUnit {
    pub fn new(kind: UnitKind, lanes: usize, latency: usize) -> Self {
        Self {
            kind,
            lanes,
            latency,
            busy_lanes: 0,
        }
    }

    pub fn has_free_lane(&self) -> bool {
        self.busy_lanes < self.lanes
    }

    pub fn seize_lane(&mut self) {
        if self.busy_lanes < self.lanes {
            self.busy_lanes += 1;
        }
    }

    pub fn release_lane(&mut self) {
        self.busy_lanes = self.busy_lanes.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.busy_lanes = 0;
    }
}
