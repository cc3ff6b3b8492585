//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, bail, Context};
use cc8::{error::Diagnostics, Options, DEFAULT_ORIGIN};
use clap::{self, crate_version, Arg};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = clap::Command::new("cc8")
        .version(crate_version!())
        .about("C-like compiler for an 8-bit accumulator CPU")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .help("Source file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output file (defaults to INPUT with .asm extension, '-' for stdout)"),
        )
        .arg(
            Arg::new("origin")
                .long("origin")
                .takes_value(true)
                .value_name("HEX")
                .help("Load address of the program"),
        )
        .arg(
            Arg::new("prelude")
                .long("prelude")
                .takes_value(true)
                .value_name("FILE")
                .help("Assembly file included before generated code"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase log verbosity"),
        )
        .get_matches();

    let level = match args.occurrences_of("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("Failed to initialize logger")?;

    // Se extraen argumentos necesarios
    let input = match args.value_of("input") {
        Some(input) => PathBuf::from(input),
        None => bail!("Missing input file"),
    };

    let origin = match args.value_of("origin") {
        Some(origin) => parse_origin(origin)?,
        None => DEFAULT_ORIGIN,
    };

    let options = Options {
        origin,
        prelude: args.value_of("prelude").map(String::from),
    };

    log::info!("Compiling {}", input.display());
    let compiled = match cc8::compile_file(&input, &options) {
        Ok(compiled) => compiled,
        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            bail!("Failed to compile {}", input.display());
        }
    };

    if !compiled.warnings.is_empty() {
        eprint!("{}", Diagnostics::warnings(compiled.warnings));
    }

    match args.value_of("output") {
        // Salida a stdout
        Some("-") => io::stdout()
            .write_all(compiled.assembly.as_bytes())
            .context("Failed to write to stdout")?,

        // Salida a archivo
        path => {
            let path = path.map_or_else(|| input.with_extension("asm"), PathBuf::from);
            write_file(&path, &compiled.assembly)?;
        }
    }

    Ok(())
}

fn parse_origin(origin: &str) -> anyhow::Result<u16> {
    let digits = origin
        .strip_prefix("0x")
        .or_else(|| origin.strip_prefix("0X"))
        .unwrap_or(origin);

    u16::from_str_radix(digits, 16).with_context(|| format!("Bad origin address: {}", origin))
}

fn write_file(path: &Path, assembly: &str) -> anyhow::Result<()> {
    fs::write(path, assembly)
        .with_context(|| format!("Failed to open for writing: {}", path.display()))?;

    log::info!("Wrote {}", path.display());
    Ok(())
}
