use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

use assembler::listing;
use launcher::{boot_machine, config, run_chain, BootChain, LaunchConfig, DEFAULT_MAX_STEPS};
use types::{BootLayout, Stage};

/// Build, inspect and run the RISC-V boot chain
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// More log output (-v info, -vv debug, -vvv per-instruction trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble every stage and write the images
    Build {
        /// Output folder for the images
        #[arg(short, long, default_value = "build/bin")]
        out: PathBuf,

        /// Also write ELF files, disassembly and symbol listings
        #[arg(short, long)]
        debug: bool,

        /// JSON layout overriding the default addresses
        #[arg(short, long)]
        layout: Option<PathBuf>,
    },
    /// Boot the chain on the machine model and check the hand-offs
    Run {
        /// Folder with prebuilt images; the chain is assembled in memory when omitted
        #[arg(short, long)]
        bins: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,

        #[arg(long, default_value_t = 0)]
        hart_id: u64,

        /// Print the stage transition table
        #[arg(short, long)]
        trace: bool,

        /// Copy console output to stdout while running
        #[arg(short, long)]
        echo: bool,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        #[arg(short, long)]
        layout: Option<PathBuf>,
    },
    /// Show the memory layout
    Layout {
        #[arg(short, long)]
        layout: Option<PathBuf>,

        /// Print as JSON, suitable as a --layout file
        #[arg(long)]
        json: bool,
    },
    /// Disassemble one stage
    Disasm {
        /// Stage name or file stem (firmware, bios, stage1, ..., kernel)
        stage: String,

        /// Print the symbol table instead of the listing
        #[arg(short, long)]
        symbols: bool,

        #[arg(short, long)]
        layout: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error".red().bold(),
            Level::Warn => "warn".yellow().bold(),
            Level::Info => "info".green(),
            Level::Debug => "debug".blue(),
            Level::Trace => "trace".dimmed(),
        };
        eprintln!("[{}] {}", tag, record.args());
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Build { out, debug, layout } => build(&out, debug, layout.as_deref()),
        Command::Run { bins, max_steps, hart_id, trace, echo, format, layout } => {
            let config = LaunchConfig {
                max_steps,
                hart_id,
                echo_console: echo,
                verbose: args.verbose >= 3,
            };
            boot(bins.as_deref(), layout.as_deref(), &config, trace, format)
        }
        Command::Layout { layout, json } => show_layout(layout.as_deref(), json),
        Command::Disasm { stage, symbols, layout } => disasm(&stage, symbols, layout.as_deref()),
    }
}

fn load_layout(path: Option<&Path>) -> Result<BootLayout> {
    config::layout_or_default(path).context("Failed to load boot layout")
}

fn build(out: &Path, debug: bool, layout: Option<&Path>) -> Result<()> {
    let layout = load_layout(layout)?;
    let chain = BootChain::build(&layout).context("Failed to assemble the boot chain")?;
    let written = chain
        .write_to(out, debug)
        .with_context(|| format!("Failed to write images to {}", out.display()))?;

    println!("{}", "Boot chain built".bold().blue());
    for image in chain.images() {
        println!(
            "  {} {:<18} {:#010x}  {:>5} bytes",
            "✓".green(),
            image.stage.file_stem(),
            image.base,
            image.len()
        );
    }
    println!("  {} files in {}", written.len(), out.display());
    Ok(())
}

fn boot(
    bins: Option<&Path>,
    layout: Option<&Path>,
    config: &LaunchConfig,
    show_trace: bool,
    format: Format,
) -> Result<()> {
    let layout = load_layout(layout)?;
    let chain = match bins {
        Some(dir) => BootChain::load_from(dir, &layout)
            .with_context(|| format!("Failed to load images from {}", dir.display()))?,
        None => BootChain::build(&layout).context("Failed to assemble the boot chain")?,
    };
    let mut vm = boot_machine(&chain, config).context("Failed to set up the machine")?;
    let (_, report) = run_chain(&chain, &mut vm, config);

    match format {
        Format::Json => println!("{}", report.to_json()?),
        Format::Text => {
            if config.echo_console {
                println!();
            }
            println!("{}", "Boot report".bold().blue());
            println!("{}", "===========".blue());
            if show_trace {
                print!("{report}");
            } else {
                println!("outcome  {} at {:#x}", report.outcome.kind, report.outcome.pc);
                println!("console  {:?}", report.console);
                println!();
                for check in &report.checks {
                    let tag = if check.passed { "ok".green() } else { "FAIL".red().bold() };
                    println!("[{:^4}] {}", tag, check.name);
                }
            }
            if !report.all_passed() {
                log::debug!("registers at stop:\n{}", vm.register_dump());
            }
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} boot check(s) failed");
    }
    Ok(())
}

fn show_layout(layout: Option<&Path>, json: bool) -> Result<()> {
    let layout = load_layout(layout)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }
    println!("{}", "Boot layout".bold().blue());
    for stage in Stage::ALL {
        let region = layout.region(stage);
        println!(
            "  {:<8} {:#010x}..{:#010x}  {}.bin",
            stage.name(),
            region.base,
            region.end(),
            stage.file_stem()
        );
    }
    println!("  {:<8} {:#010x}..{:#010x}", "dram", layout.dram.base, layout.dram.end());
    let stack = layout.stack();
    println!("  {:<8} {:#010x}..{:#010x}", "stack", stack.base, stack.end());
    println!("  {:<8} {}", "delay", layout.delay_iterations);
    Ok(())
}

fn disasm(stage: &str, symbols: bool, layout: Option<&Path>) -> Result<()> {
    let Some(stage) = Stage::from_name(stage) else {
        anyhow::bail!("Unknown stage: {stage}");
    };
    let layout = load_layout(layout)?;
    let image = bootloader::build_stage(stage, &layout)
        .with_context(|| format!("Failed to assemble {stage}"))?;
    if symbols {
        print!("{}", listing::symbol_table(&image));
    } else {
        print!("{}", listing::render(&image));
    }
    Ok(())
}
