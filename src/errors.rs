use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum SimulatorError {
    // Memory errors
    LoadOutOfBounds { tag: usize, pc: u16, addr: i32 },
    StoreOutOfBounds { tag: usize, pc: u16, addr: i32 },

    // Engine errors
    Deadlock { cycle: usize, state: String },

    // Input errors
    Preload { message: String, line: usize },

    // System errors
    IoError(std::io::Error),
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorError::LoadOutOfBounds { tag, pc, addr } => {
                write!(
                    f,
                    "LOAD address out of range: {} (ROB tag {}, PC 0x{:04X})",
                    addr, tag, pc
                )
            },
            SimulatorError::StoreOutOfBounds { tag, pc, addr } => {
                write!(
                    f,
                    "STORE address out of range: {} (ROB tag {}, PC 0x{:04X})",
                    addr, tag, pc
                )
            },
            SimulatorError::Deadlock { cycle, state } => {
                write!(f, "pipeline deadlock at cycle {}\n{}", cycle, state)
            },
            SimulatorError::Preload { message, line } => {
                if *line > 0 {
                    write!(f, "Memory image error at line {}: {}", line, message)
                } else {
                    write!(f, "Memory image error: {}", message)
                }
            },
            SimulatorError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for SimulatorError {}

impl From<std::io::Error> for SimulatorError {
    fn from(error: std::io::Error) -> Self {
        SimulatorError::IoError(error)
    }
}
