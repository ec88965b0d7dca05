// tests/error_handling.rs
use tomasim_rust::arch::memory::{Memory, MEMORY_WORDS};
use tomasim_rust::assembler::Assembler;
use tomasim_rust::errors::SimulatorError;
use tomasim_rust::image_loader::MemoryImage;
use tomasim_rust::pipeline::config::PipelineConfig;
use tomasim_rust::pipeline::simulator::Simulator;

fn run_expecting_error(source: &str, memory: Memory) -> SimulatorError {
    let mut assembler = Assembler::new(0);
    let program = assembler.assemble(source).expect("program should assemble");
    let mut simulator = Simulator::new(&PipelineConfig::new(), program, memory);
    simulator
        .run()
        .expect_err("simulation should fail with a fatal error")
}

#[test]
fn test_load_below_address_zero_is_fatal() {
    let err = run_expecting_error("load r1, -1(r0)\n", Memory::new(MEMORY_WORDS));
    match err {
        SimulatorError::LoadOutOfBounds { pc, addr, .. } => {
            assert_eq!(pc, 0);
            assert_eq!(addr, -1);
        },
        other => panic!("expected LoadOutOfBounds, got {:?}", other),
    }
}

#[test]
fn test_load_past_end_of_memory_is_fatal() {
    // A 1 KiB memory makes a positive address overrun easy to hit
    let err = run_expecting_error(
        "addi r1, r0, 0x400\n\
         load r2, 0(r1)\n",
        Memory::new(1024),
    );
    match err {
        SimulatorError::LoadOutOfBounds { pc, addr, .. } => {
            assert_eq!(pc, 1);
            assert_eq!(addr, 0x400);
        },
        other => panic!("expected LoadOutOfBounds, got {:?}", other),
    }
}

#[test]
fn test_store_out_of_range_is_fatal_at_commit() {
    let err = run_expecting_error(
        "addi  r1, r0, 42\n\
         store r1, -4(r0)\n",
        Memory::new(MEMORY_WORDS),
    );
    match err {
        SimulatorError::StoreOutOfBounds { pc, addr, .. } => {
            assert_eq!(pc, 1);
            assert_eq!(addr, -4);
        },
        other => panic!("expected StoreOutOfBounds, got {:?}", other),
    }
}

#[test]
fn test_store_error_reports_tag_pc_and_address() {
    let err = run_expecting_error(
        "addi  r1, r0, 1\n\
         store r1, -2(r0)\n",
        Memory::new(MEMORY_WORDS),
    );
    let message = err.to_string();
    assert!(message.contains("STORE"), "message: {}", message);
    assert!(message.contains("-2"), "message: {}", message);
    assert!(message.contains("0x0001"), "message: {}", message);
}

#[test]
fn test_wrong_path_load_fault_still_aborts() {
    // The faulting LOAD sits on the speculative wrong path of a taken
    // branch whose commit is held back by the slow MUL at the ROB head.
    // The fault surfaces when the LOAD finishes executing, before the
    // squash; recovery from speculative faults is not modeled.
    let source = "        mul  r1, r2, r3\n\
                          beq  r0, r0, over\n\
                          load r2, -8(r0)\n\
                  over:   addi r3, r0, 5\n";
    let mut assembler = Assembler::new(0);
    let program = assembler.assemble(source).expect("program should assemble");
    let mut simulator = Simulator::new(&PipelineConfig::new(), program, Memory::new(MEMORY_WORDS));
    let result = simulator.run();
    assert!(matches!(
        result,
        Err(SimulatorError::LoadOutOfBounds { .. })
    ));
}

#[test]
fn test_preload_parse_error_carries_line_number() {
    let err = MemoryImage::parse("0 1\n0x10 bogus\n").unwrap_err();
    match err {
        SimulatorError::Preload { message, line } => {
            assert_eq!(line, 2);
            assert!(message.contains("bogus"));
        },
        other => panic!("expected Preload error, got {:?}", other),
    }
}

#[test]
fn test_preload_into_small_memory_fails_cleanly() {
    let image = MemoryImage::parse("2000 5\n").expect("image should parse");
    let mut memory = Memory::new(1024);
    let err = image
        .load_into_memory(&mut memory)
        .expect_err("preload past end of memory should fail");
    assert!(err.to_string().contains("2000"));
}

#[test]
fn test_assembler_failure_prevents_simulation() {
    let mut assembler = Assembler::new(0);
    let result = assembler.assemble("addi r1, r0, 1\nbogus r2\n");
    assert!(result.is_err(), "bad source must fail at load time");
}

#[test]
fn test_structural_stalls_are_not_errors() {
    // Saturate the single store station; the run must simply stretch
    let source = "addi  r1, r0, 1\n\
                  store r1, 0(r0)\n\
                  store r1, 1(r0)\n\
                  store r1, 2(r0)\n";
    let mut assembler = Assembler::new(0);
    let program = assembler.assemble(source).expect("program should assemble");
    let mut simulator = Simulator::new(&PipelineConfig::new(), program, Memory::new(MEMORY_WORDS));
    simulator
        .run()
        .expect("resource exhaustion is a stall, not an error");
    assert_eq!(simulator.memory.read_word(0), Some(1));
    assert_eq!(simulator.memory.read_word(1), Some(1));
    assert_eq!(simulator.memory.read_word(2), Some(1));
}
