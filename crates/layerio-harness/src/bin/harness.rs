//! CLI entrypoint for the layerio harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use layerio_core::log::{self, JsonlSink, LogLevel};
use layerio_harness::report::to_json;
use layerio_harness::{LinesRequest, bom, copy, lines};

/// Drives layerio streams over files and prints JSON reports.
#[derive(Debug, Parser)]
#[command(name = "harness")]
#[command(about = "Drive layerio streams over files")]
struct Cli {
    /// Emit structured logs to stderr at this level (trace..error).
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split a file into lines.
    Lines {
        file: PathBuf,
        /// Literal separator (default: newline).
        #[arg(long)]
        separator: Option<String>,
        /// Paragraph mode: split on blank-line runs.
        #[arg(long)]
        paragraph: bool,
        /// No separator: one record for the whole file.
        #[arg(long)]
        whole: bool,
        /// Maximum bytes per line.
        #[arg(long)]
        limit: Option<usize>,
        /// Strip separators.
        #[arg(long)]
        chomp: bool,
        /// Encoding spec, e.g. "BOM|utf-8" or "utf-16le:utf-8".
        #[arg(long)]
        encoding: Option<String>,
    },
    /// Detect a byte-order mark.
    Bom { file: PathBuf },
    /// Copy a file through buffered streams.
    Copy {
        src: PathBuf,
        dst: PathBuf,
        #[arg(long, default_value_t = layerio_core::BUFSIZ)]
        buffer_size: usize,
        /// Write through without batching.
        #[arg(long)]
        sync: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(level) = cli.log_level.as_deref() {
        let level = LogLevel::from_str_loose(level)
            .ok_or_else(|| format!("unknown log level {level:?}"))?;
        log::install_sink(Box::new(JsonlSink::new(std::io::stderr())));
        log::set_level(Some(level));
    }

    let json = match cli.command {
        Command::Lines {
            file,
            separator,
            paragraph,
            whole,
            limit,
            chomp,
            encoding,
        } => {
            let req = LinesRequest {
                separator,
                paragraph,
                whole,
                limit,
                chomp,
                encoding,
            };
            to_json(&lines(&file, &req)?)?
        }
        Command::Bom { file } => to_json(&bom(&file)?)?,
        Command::Copy {
            src,
            dst,
            buffer_size,
            sync,
        } => to_json(&copy(&src, &dst, buffer_size, sync)?)?,
    };
    println!("{json}");
    Ok(())
}
