// tests/edge_cases.rs
use tomasim_rust::arch::memory::{Memory, MEMORY_WORDS};
use tomasim_rust::arch::registers::RegisterFile;
use tomasim_rust::assembler::Assembler;
use tomasim_rust::pipeline::config::PipelineConfig;
use tomasim_rust::pipeline::simulator::Simulator;
use tomasim_rust::pipeline::tomasulo::UnitKind;

fn build_simulator(source: &str, config: PipelineConfig) -> Simulator {
    let mut assembler = Assembler::new(0);
    let program = assembler.assemble(source).expect("program should assemble");
    Simulator::new(&config, program, Memory::new(MEMORY_WORDS))
}

fn run(source: &str) -> Simulator {
    run_with_config(source, PipelineConfig::new())
}

fn run_with_config(source: &str, config: PipelineConfig) -> Simulator {
    let mut simulator = build_simulator(source, config);
    simulator.run().expect("simulation should complete");
    simulator
}

#[test]
fn test_register_file_edge_cases() {
    let mut registers = RegisterFile::new();

    // Writing to R0 must be ignored
    registers.write(0, 0x1234);
    assert_eq!(registers.read(0), 0);

    // Maximum 16-bit values survive
    registers.write(1, u16::MAX);
    assert_eq!(registers.read(1), u16::MAX);

    // Out-of-range register numbers read as zero and ignore writes
    registers.write(8, 42);
    assert_eq!(registers.read(8), 0);
}

#[test]
fn test_memory_boundary_conditions() {
    let mut memory = Memory::new(1024);

    assert!(memory.write_word(0, 0x1234));
    assert!(memory.write_word(1023, 0x4321));
    assert_eq!(memory.read_word(0), Some(0x1234));
    assert_eq!(memory.read_word(1023), Some(0x4321));

    // Out-of-bounds access fails
    assert_eq!(memory.read_word(1024), None);
    assert!(!memory.write_word(1024, 0x1234));
}

#[test]
fn test_arithmetic_wraps_at_16_bits() {
    let simulator = run(
        "addi r1, r0, 0x7FFF\n\
         add  r2, r1, r1\n\
         mul  r3, r1, r1\n\
         nand r4, r1, r1\n",
    );
    assert_eq!(simulator.registers.read(2), 0xFFFE);
    // 0x7FFF * 0x7FFF = 0x3FFF0001, truncated to 16 bits
    assert_eq!(simulator.registers.read(3), 0x0001);
    assert_eq!(simulator.registers.read(4), 0x8000);
}

#[test]
fn test_structural_hazard_on_single_mul_station() {
    // One MUL station: the second MUL cannot issue until the first frees
    // its station at the end of its write cycle
    let simulator = run(
        "mul r1, r2, r3\n\
         mul r4, r5, r6\n",
    );

    let records = &simulator.timeline.records;
    let first_write = records[0].write.expect("first MUL should write");
    let second_issue = records[1].issue.expect("second MUL should issue");
    assert_eq!(
        second_issue,
        first_write + 1,
        "station freed by Write-Result is only visible to the next cycle's Issue"
    );
}

#[test]
fn test_rob_full_stalls_issue() {
    let config = PipelineConfig::new().with_rob_size(2);
    let simulator = run_with_config(
        "addi r1, r0, 1\n\
         addi r2, r0, 2\n\
         addi r3, r0, 3\n\
         addi r4, r0, 4\n",
        config,
    );

    let records = &simulator.timeline.records;
    // The third ADDI must wait for a ROB slot, which opens when the head
    // commits; commit and issue may share a cycle
    let first_commit = records[0].commit.expect("first ADDI should commit");
    let third_issue = records[2].issue.expect("third ADDI should issue");
    assert!(
        third_issue >= first_commit,
        "third issue at {} must not precede first commit at {}",
        third_issue,
        first_commit
    );
    assert_eq!(simulator.stats.instructions_retired, 4);
    assert_eq!(simulator.registers.read(4), 4);
}

#[test]
fn test_waw_rat_ownership() {
    // The older ADDI's commit must not clear the RAT entry now owned by
    // the younger ADDI
    let simulator = run(
        "addi r1, r0, 1\n\
         addi r1, r0, 2\n\
         add  r2, r1, r1\n",
    );
    assert_eq!(simulator.registers.read(1), 2);
    assert_eq!(simulator.registers.read(2), 4, "ADD must see the younger R1");
}

#[test]
fn test_cdb_arbitration_prefers_oldest_tag() {
    // The 1-cycle NAND finishes while the 2-cycle ADDI result is still
    // waiting for the bus; the older ADDI must broadcast first
    let simulator = run(
        "addi r1, r0, 1\n\
         nand r2, r0, r0\n",
    );

    let records = &simulator.timeline.records;
    let addi_write = records[0].write.expect("ADDI should write");
    let nand_write = records[1].write.expect("NAND should write");
    assert!(
        addi_write < nand_write,
        "oldest tag wins the CDB: ADDI {} vs NAND {}",
        addi_write,
        nand_write
    );
}

#[test]
fn test_call_links_and_ret_returns() {
    let simulator = run(
        "        call sub\n\
                 addi r1, r0, 9\n\
         sub:    addi r2, r0, 7\n\
                 ret\n",
    );

    assert_eq!(simulator.registers.read(7), 1, "link register holds PC+1");
    assert_eq!(simulator.registers.read(2), 7, "subroutine body ran");
    assert_eq!(simulator.registers.read(1), 9, "execution resumed after RET");
    // CALL/RET never enter the branch statistics
    assert_eq!(simulator.stats.branches, 0);
    assert_eq!(simulator.stats.mispredictions, 0);
}

#[test]
fn test_ret_stalls_until_link_register_available() {
    let simulator = run(
        "addi r7, r0, 2\n\
         ret\n\
         addi r1, r0, 4\n",
    );

    let records = &simulator.timeline.records;
    let addi_write = records[0].write.expect("ADDI should write");
    let ret_issue = records[1].issue.expect("RET should issue");
    assert!(
        ret_issue >= addi_write,
        "RET issue at {} must wait for R7's value at {}",
        ret_issue,
        addi_write
    );
    // RET redirected fetch to address 2
    assert_eq!(simulator.registers.read(1), 4);
    assert_eq!(simulator.stats.mispredictions, 0);
}

#[test]
fn test_squash_clears_all_speculative_state() {
    let mut simulator = build_simulator(
        "        addi r1, r0, 3\n\
                 beq  r1, r1, skip\n\
                 addi r2, r0, 99\n\
         skip:   addi r3, r0, 7\n",
        PipelineConfig::new(),
    );

    // Step until the misprediction is detected at commit
    while simulator.stats.mispredictions == 0 {
        assert!(!simulator.finished(), "misprediction must occur");
        simulator.step().expect("step should succeed");
    }

    // The squash cycle leaves no speculative state behind
    assert!(simulator.rob.is_empty(), "ROB must be empty after squash");
    assert!(
        simulator.stations.iter().all(|s| !s.busy),
        "all stations must be idle after squash"
    );
    assert!(
        simulator.rat.is_clear(),
        "RAT must be all-architectural after squash"
    );
    assert_eq!(simulator.fetch_pc, 3, "fetch must point at the real target");

    // The run still completes correctly from here
    simulator.run().expect("simulation should complete");
    assert_eq!(simulator.registers.read(2), 0);
    assert_eq!(simulator.registers.read(3), 7);
}

#[test]
fn test_speculative_wrong_path_never_touches_architectural_state() {
    // Two programs differing only beyond a mispredicted branch must leave
    // identical committed state
    let base = "        addi r1, r0, 1\n\
                        beq  r1, r1, over\n";
    let a = format!("{}        addi r2, r0, 11\nover:   addi r3, r0, 5\n", base);
    let b = format!("{}        mul  r2, r1, r1\nover:   addi r3, r0, 5\n", base);

    let sim_a = run(&a);
    let sim_b = run(&b);
    for reg in 0..8 {
        assert_eq!(
            sim_a.registers.read(reg),
            sim_b.registers.read(reg),
            "register R{} differs across wrong-path variants",
            reg
        );
    }
}

#[test]
fn test_lane_narrowing_serializes_execution() {
    // Four ALU stations but a single execution lane: independent ADDIs
    // must start in program order, one at a time
    let config = PipelineConfig::new().with_lanes(UnitKind::Alu, 1);
    let simulator = run_with_config(
        "addi r1, r0, 1\n\
         addi r2, r0, 2\n\
         addi r3, r0, 3\n",
        config,
    );

    let starts: Vec<usize> = simulator
        .timeline
        .records
        .iter()
        .map(|r| r.exec_start.expect("all should execute"))
        .collect();
    // 2-cycle latency on one lane: starts at least 2 cycles apart
    for pair in starts.windows(2) {
        assert!(
            pair[1] >= pair[0] + 2,
            "lane contention should serialize starts: {:?}",
            starts
        );
    }
    assert_eq!(simulator.registers.read(3), 3);
}

#[test]
fn test_empty_program_terminates_immediately() {
    let simulator = run("; nothing but a comment\n");
    assert_eq!(simulator.stats.cycles, 0);
    assert_eq!(simulator.stats.instructions_retired, 0);
    assert_eq!(simulator.stats.ipc(), 0.0);
}
