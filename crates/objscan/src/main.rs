//! objscan - inspect the symbols and sections of object files
//!
//! Usage:
//!   objscan <binary>                      Show header information
//!   objscan <binary> sections             List sections
//!   objscan <binary> symbols [--dynamic]  List symbols
//!   objscan <binary> section --name .text Show one section

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use objscan_core::{Architecture, Endianness, Format, Section, Symbol, SymbolKind};
use objscan_formats::File;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "objscan", version)]
#[command(about = "Inspect symbols and sections of ELF, Mach-O, PE and COFF binaries", long_about = None)]
struct Cli {
    /// Path to the binary file
    binary: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show binary header information (the default)
    Info,
    /// List sections in the binary
    Sections,
    /// List symbols in the binary
    Symbols {
        /// List the dynamic (exported/imported) symbols instead
        #[arg(short, long)]
        dynamic: bool,
        /// Only symbols of this kind (text, data, section, file, label, tls, unknown)
        #[arg(short, long)]
        kind: Option<SymbolKind>,
        /// Only symbols whose name contains this string
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Look up a single section
    #[command(group(ArgGroup::new("which").required(true).args(["index", "name"])))]
    Section {
        /// Position in the section table
        #[arg(short, long)]
        index: Option<usize>,
        /// Section name; the first match wins
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Serialize)]
struct Info {
    format: Format,
    endianness: Endianness,
    architecture: Architecture,
    entry_point: Option<u64>,
    sections: usize,
    symbols: usize,
    dynamic_symbols: usize,
}

impl Info {
    fn new(file: &File) -> Self {
        Self {
            format: file.format(),
            endianness: file.endianness(),
            architecture: file.architecture(),
            entry_point: file.entry_point(),
            sections: file.sections().len(),
            symbols: file.symbols().len(),
            dynamic_symbols: file.dynamic_symbols().len(),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    // RUST_LOG, when set, overrides the -v level.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data = fs::read(&cli.binary)
        .with_context(|| format!("Failed to read binary: {}", cli.binary.display()))?;
    let file = File::parse(&data)
        .map_err(|err| {
            if err.is_truncated() {
                log::warn!("{} is {} bytes, it may be truncated", cli.binary.display(), data.len());
            }
            err
        })
        .with_context(|| format!("Failed to parse {}", cli.binary.display()))?;
    log::info!(
        "{}: {} {}",
        cli.binary.display(),
        file.format(),
        file.architecture().name()
    );

    match cli.command.unwrap_or(Commands::Info) {
        Commands::Info => {
            let info = Info::new(&file);
            if cli.json {
                print_json(&info)?;
            } else {
                print_info(&info);
            }
        }
        Commands::Sections => {
            if cli.json {
                print_json(file.sections())?;
            } else {
                print_sections(file.sections());
            }
        }
        Commands::Symbols {
            dynamic,
            kind,
            name,
        } => {
            let table = if dynamic {
                file.dynamic_symbols()
            } else {
                file.symbols()
            };
            let symbols: Vec<&Symbol> = table
                .iter()
                .filter(|s| kind.map_or(true, |k| s.kind == k))
                .filter(|s| name.as_deref().map_or(true, |n| s.name.contains(n)))
                .collect();
            if cli.json {
                print_json(&symbols)?;
            } else {
                print_symbols(&symbols);
            }
        }
        Commands::Section { index, name } => {
            let section = match index {
                Some(index) => file
                    .section_by_index(index)
                    .with_context(|| format!("No section at index {index}"))?,
                None => {
                    let name = name.context("Either --index or --name is required")?;
                    file.section_by_name(&name)
                        .with_context(|| format!("No section named {name:?}"))?
                }
            };
            if cli.json {
                print_json(section)?;
            } else {
                print_sections(std::slice::from_ref(section));
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn print_info(info: &Info) {
    println!("Binary Information");
    println!("==================");
    println!("Format:          {}", info.format);
    println!("Architecture:    {}", info.architecture.name());
    println!("Endianness:      {}", info.endianness.name());
    match info.entry_point {
        Some(entry) => println!("Entry Point:     {entry:#x}"),
        None => println!("Entry Point:     none"),
    }
    println!();
    println!("Sections:        {}", info.sections);
    println!("Symbols:         {}", info.symbols);
    println!("Dynamic Symbols: {}", info.dynamic_symbols);
}

fn print_sections(sections: &[Section]) {
    println!(
        "{:<4} {:<24} {:<18} {:<12} {:<8} {}",
        "Idx", "Name", "Address", "Size", "Align", "File Range"
    );
    println!("{}", "-".repeat(90));

    for section in sections {
        let range = match section.file_range {
            Some((offset, len)) => format!("{offset:#x}+{len:#x}"),
            None => "-".to_string(),
        };
        println!(
            "{:<4} {:<24} {:#018x} {:<12} {:<8} {}",
            section.index,
            section.name,
            section.address,
            format!("{:#x}", section.size),
            section.align,
            range
        );
    }
}

fn print_symbols(symbols: &[&Symbol]) {
    println!(
        "{:<6} {:<18} {:<10} {:<8} {}",
        "Idx", "Address", "Size", "Kind", "Name"
    );
    println!("{}", "-".repeat(70));

    for symbol in symbols {
        println!(
            "{:<6} {:#018x} {:<10} {:<8} {}",
            symbol.index,
            symbol.address,
            symbol.size,
            symbol.kind.as_str(),
            symbol.name
        );
    }
}
