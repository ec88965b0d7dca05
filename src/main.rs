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

// main.rs
//
// This file contains the main entry point for the simulator.
// It wires the command-line arguments to the assembler, the memory-image
// loader, and the pipeline engine, then renders the timeline report.

use clap::Parser;
use colored::Colorize;
use log::info;
use std::fs;
use std::path::PathBuf;

use tomasim_rust::arch::memory::{Memory, MEMORY_WORDS};
use tomasim_rust::assembler::Assembler;
use tomasim_rust::image_loader::MemoryImage;
use tomasim_rust::pipeline::config::PipelineConfig;
use tomasim_rust::pipeline::simulator::Simulator;
use tomasim_rust::pipeline::timeline::{OutputFormat, ReportRenderer};

#[derive(Parser)]
#[command(name = "tomasim_rust")]
#[command(about = "A cycle-accurate Tomasulo out-of-order processor simulator")]
#[command(version)]
struct Cli {
    /// Input assembly file
    #[arg(short, long)]
    input: PathBuf,

    /// Memory image file of (address, value) preload pairs
    #[arg(short, long)]
    memory_image: Option<PathBuf>,

    /// Starting program address (word address, decimal or 0x-hex)
    #[arg(short, long, default_value = "0")]
    start_address: String,

    /// Reorder buffer capacity
    #[arg(long, default_value = "16")]
    rob_size: usize,

    /// Output format (text, csv, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (error, warn, info, debug)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Disable colorized output
    #[arg(long)]
    no_color: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" | "warning" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Warn,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("error: {}", e).red());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let start_address = parse_address(&cli.start_address)
        .ok_or_else(|| format!("invalid start address '{}'", cli.start_address))?;

    let mut assembler = Assembler::new(start_address);
    let program = assembler.assemble_file(&cli.input)?;
    info!(
        "assembled {} instruction(s) starting at 0x{:04X}",
        program.len(),
        start_address
    );

    let mut memory = Memory::new(MEMORY_WORDS);
    if let Some(path) = &cli.memory_image {
        let image = MemoryImage::from_file(path)?;
        info!("preloading {} memory word(s)", image.entries.len());
        image.load_into_memory(&mut memory)?;
    }

    let config = PipelineConfig::new().with_rob_size(cli.rob_size);
    let mut simulator = Simulator::new(&config, program, memory);
    simulator.run()?;

    let output_format = match cli.format.to_lowercase().as_str() {
        "text" => OutputFormat::Text,
        "csv" => OutputFormat::Csv,
        "json" => OutputFormat::Json,
        other => return Err(format!("unknown output format '{}'", other).into()),
    };
    let renderer = ReportRenderer {
        colorize_output: !cli.no_color && cli.output.is_none() && output_format == OutputFormat::Text,
        output_format,
    };
    let report = renderer.render(&simulator.timeline, &simulator.stats);

    match &cli.output {
        Some(path) => fs::write(path, report)?,
        None => print!("{}", report),
    }
    Ok(())
}

fn parse_address(token: &str) -> Option<u16> {
    let value = if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        token.parse::<u32>().ok()?
    };
    u16::try_from(value).ok()
}
