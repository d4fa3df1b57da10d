/*
 * Part of psgmmlc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! The external driver: reads MML source line by line, strips the
//! optional original-compiler `[lineno] "` prefix, routes each line by
//! its leading channel letter (`D`, `E`, `F`) to one of three independent
//! [`ChannelCompiler`]s, and honours the `X` toggle that suspends/resumes
//! compilation for the rest of the file.
//!
//! This module owns no compiler logic of its own; it is the thin glue
//! the core explicitly treats as an external collaborator.

use crate::channel::ChannelCompiler;
use crate::error::Diagnostic;
use std::io::Write;

/// Three PSG channels, always compiled in this order.
pub const PSG_NCH: usize = 3;

macro_rules! log {
    ($to:expr, $($arg:tt)+) => {
        {
            writeln!($to, $($arg)*).unwrap();
        }
    }
}

macro_rules! logif {
    ($verbose:ident, $to:expr, $($arg:tt)+) => {
        if $verbose {
            log!($to, $($arg)*);
        }
    }
}

/// One channel's compile error, paired with enough source context for a
/// CLI to render a caret under the offending token.
pub struct LineDiagnostic {
    pub channel: usize,
    pub diagnostic: Diagnostic,
    /// The per-channel statement text the error was raised against (the
    /// line with its leading `[lineno] "` prefix and channel letter
    /// already stripped).
    pub source_line: String,
}

pub struct CompileOutput {
    pub channel_bytes: [Vec<u8>; PSG_NCH],
    pub diagnostics: Vec<LineDiagnostic>,
}

impl CompileOutput {
    pub fn had_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Skip leading whitespace, then an optional `[lineno] "` prefix (the
/// original Z80-era compiler's line-numbered format), returning the byte
/// offset of the channel-selector character.
fn skip_prefix(line: &[u8]) -> usize {
    let mut i = 0;
    while i < line.len() && matches!(line[i], b' ' | b'\t') {
        i += 1;
    }
    if i < line.len() && line[i].is_ascii_digit() {
        while i < line.len() && line[i].is_ascii_digit() {
            i += 1;
        }
        while i < line.len() && line[i] == b' ' {
            i += 1;
        }
        if i < line.len() && line[i] == b'"' {
            i += 1;
        }
    }
    i
}

/// Compile a complete MML source file into three channel bytecode
/// streams, collecting any diagnostics raised along the way.
pub fn compile(source: &str, verbose: bool, log_to: &mut dyn Write) -> CompileOutput {
    let mut channels = [
        ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY),
        ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY),
        ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY),
    ];
    let mut last_line: [String; PSG_NCH] = Default::default();
    let mut diagnostics = Vec::new();
    let mut x_disabled = false;

    for (i, raw_line) in source.lines().enumerate() {
        let line_no = (i + 1) as u32;
        let bytes = raw_line.as_bytes();
        let start = skip_prefix(bytes);
        let ch = bytes.get(start).copied().unwrap_or(0).to_ascii_uppercase();

        for (idx, letter) in [b'D', b'E', b'F'].into_iter().enumerate() {
            if !x_disabled && ch == letter {
                let rest = std::str::from_utf8(&bytes[start + 1..]).unwrap_or("");
                last_line[idx] = rest.to_string();
                if let Some(d) = channels[idx].compile_line(rest, line_no) {
                    logif!(verbose, log_to, "channel {}: line {}: {}", idx, line_no, d);
                    diagnostics.push(LineDiagnostic {
                        channel: idx,
                        diagnostic: d,
                        source_line: rest.to_string(),
                    });
                }
            }
        }

        if ch == b'X' {
            x_disabled = !x_disabled;
        } else {
            logif!(verbose, log_to, "ignored line {}", line_no);
        }
    }

    let mut channel_bytes: [Vec<u8>; PSG_NCH] = Default::default();
    for (idx, channel) in channels.iter_mut().enumerate() {
        if let Err(d) = channel.finish() {
            diagnostics.push(LineDiagnostic {
                channel: idx,
                diagnostic: d,
                source_line: std::mem::take(&mut last_line[idx]),
            });
        }
        logif!(verbose, log_to, "channel {} out_len = {}", idx, channel.out_len());
        channel_bytes[idx] = channel.out().to_vec();
    }

    CompileOutput {
        channel_bytes,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_quiet(src: &str) -> CompileOutput {
        let mut sink = Vec::new();
        compile(src, false, &mut sink)
    }

    #[test]
    fn routes_lines_by_leading_channel_letter() {
        let out = compile_quiet("D c\nE d\nF e\n");
        assert!(!out.had_errors());
        assert_eq!(out.channel_bytes[0], vec![0x01, 0xFF]);
        assert_eq!(out.channel_bytes[1], vec![0x03, 0xFF]);
        assert_eq!(out.channel_bytes[2], vec![0x05, 0xFF]);
    }

    #[test]
    fn line_number_prefix_is_stripped() {
        let out = compile_quiet("10 D c\n");
        assert!(!out.had_errors());
        assert_eq!(out.channel_bytes[0], vec![0x01, 0xFF]);
    }

    #[test]
    fn quoted_line_number_prefix_is_stripped() {
        let out = compile_quiet("10 \"D c\n");
        assert!(!out.had_errors());
        assert_eq!(out.channel_bytes[0], vec![0x01, 0xFF]);
    }

    #[test]
    fn x_toggle_suspends_and_resumes_compilation() {
        let out = compile_quiet("D c\nX\nD d\nX\nD e\n");
        assert!(!out.had_errors());
        // The middle "D d" falls between the two X lines, so it's skipped.
        assert_eq!(out.channel_bytes[0], vec![0x01, 0x05, 0xFF]);
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let out = compile_quiet("; just a comment with no channel letter\nD c\n");
        assert!(!out.had_errors());
        assert_eq!(out.channel_bytes[0], vec![0x01, 0xFF]);
    }

    #[test]
    fn error_on_one_channel_does_not_block_the_others() {
        let out = compile_quiet("D Z\nE d\n");
        assert!(out.had_errors());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].channel, 0);
        assert_eq!(out.channel_bytes[1], vec![0x03, 0xFF]);
    }

    #[test]
    fn unclosed_loop_reports_finish_diagnostic() {
        let out = compile_quiet("D [ c\n");
        assert!(out.had_errors());
        assert_eq!(out.diagnostics[0].diagnostic.kind, crate::error::MmlErrorKind::CloseNest);
    }
}
