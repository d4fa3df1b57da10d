/*
 * Part of psgmmlc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use libpsgmmlc::driver::{compile, LineDiagnostic};
use libpsgmmlc::object::assemble;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
psgmmlc: a three-channel PSG MML compiler

Usage:

    psgmmlc [-b addr] [-v] input.mml output.bin

Options:

    -b <addr>
        Base load address for the compiled object, as decimal, a
        0x-prefixed hex literal, or a 0-prefixed octal literal. Must be
        in 0..=0xFFFF. Default 0.

    -v
        Verbose mode: trace channel routing and per-line compile progress
        to stderr.

    -h
    --help
        Print this help text.
";

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args_os();
    let _ = args.next(); // ignore argv[0]

    let mut base: u32 = 0;
    let mut verbose = false;
    let mut in_path = None;
    let mut out_path = None;

    while let Some(arg) = args.next() {
        if arg == "-h" || arg == "--help" {
            eprintln!("{}", USAGE);
            return Ok(());
        } else if arg == "-b" {
            let val = args.next().ok_or("Missing address after -b")?;
            let val = val.to_str().ok_or("Invalid -b argument")?;
            base = parse_base_addr(val).ok_or_else(|| format!("Invalid -b address: {:?}", val))?;
        } else if arg == "-v" {
            verbose = true;
        } else if in_path.is_none() {
            in_path = Some(PathBuf::from(arg));
        } else if out_path.is_none() {
            out_path = Some(PathBuf::from(arg));
        } else {
            return Err(format!("Unexpected argument: {:?}", arg).into());
        }
    }

    let (Some(in_path), Some(out_path)) = (in_path, out_path) else {
        eprintln!("{}", USAGE);
        return Err("Expected an input MML file and an output binary file".into());
    };

    let source = fs::read_to_string(&in_path)
        .map_err(|e| format!("Could not open input MML file {:?}: {}", in_path, e))?;

    let mut log_sink = std::io::stderr();
    let output = compile(&source, verbose, &mut log_sink);

    if output.had_errors() {
        for d in &output.diagnostics {
            print_diagnostic(d);
        }
        return Err("Compile errors; not writing output".into());
    }

    let object = assemble(&output.channel_bytes, base as u16);
    fs::write(&out_path, &object)
        .map_err(|e| format!("Could not write output binary file {:?}: {}", out_path, e))?;

    Ok(())
}

fn print_diagnostic(d: &LineDiagnostic) {
    let letter = [b'D', b'E', b'F'][d.channel] as char;
    eprintln!("error (channel {}): {}", letter, d.diagnostic);
    eprintln!("{}", d.source_line);
    if let Some(col) = d.diagnostic.column {
        eprintln!("{}^", " ".repeat(col.saturating_sub(1) as usize));
    }
}

/// Parse a base address the way the original compiler's `strtol(s, &endptr,
/// 0)` does: decimal by default, `0x`/`0X`-prefixed hex, or a leading `0`
/// selecting octal.
fn parse_base_addr(s: &str) -> Option<u32> {
    let (radix, digits) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, hex)
    } else if s.len() > 1 && s.starts_with('0') {
        (8, &s[1..])
    } else {
        (10, s)
    };
    u32::from_str_radix(digits, radix).ok().filter(|v| *v <= 0xFFFF)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_hex_and_octal() {
        assert_eq!(parse_base_addr("32768"), Some(32768));
        assert_eq!(parse_base_addr("0x8000"), Some(0x8000));
        assert_eq!(parse_base_addr("0100"), Some(0o100));
        assert_eq!(parse_base_addr("0"), Some(0));
    }

    #[test]
    fn rejects_out_of_range_or_malformed() {
        assert_eq!(parse_base_addr("0x10000"), None);
        assert_eq!(parse_base_addr("-1"), None);
        assert_eq!(parse_base_addr("not a number"), None);
    }
}
