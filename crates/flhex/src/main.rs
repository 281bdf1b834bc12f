use clap::{Parser, ValueEnum};
use env_logger::Env;
use flhex_core::{FlattenOptions, DEFAULT_PADDING};
use log::*;

use std::{io::Write, path::PathBuf, process::ExitCode};

use crate::flatten::flatten_file;

mod flatten;
mod reporter;

/// Parse a byte as decimal or `0x` prefixed hex
fn byte_parser(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex byte '{}': {}", s, e))
    } else {
        s.parse::<u8>()
            .map_err(|e| format!("Invalid byte '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None, author = "Jonathan Nilsson")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Set the logging verbosity
    #[clap(short, long, value_enum, default_value_t = LogLevel::Info)]
    verbose: LogLevel,

    /// Per-record byte count (by default, will match input)
    #[clap(long, value_name = "N", value_parser = byte_parser, default_value_t = 0)]
    count: u8,

    /// Padding value for bytes the input never wrote
    #[clap(long, value_name = "N", value_parser = byte_parser, default_value_t = DEFAULT_PADDING)]
    padding: u8,

    /// Output file
    #[clap(short, long, value_name = "FILE", default_value = "out.hex")]
    output: PathBuf,

    /// Input Intel HEX file
    input: PathBuf,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(cli.verbose.into())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level();
            if level == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();

    let options = FlattenOptions {
        padding: cli.padding,
        record_width: cli.count,
    };

    match flatten_file(&cli.input, &cli.output, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("flhex: {}", err);
            ExitCode::FAILURE
        }
    }
}
