/*
 * Part of psgmmlc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! The per-channel statement compiler: dispatches each MML statement to a
//! note/rest handler or a command handler, maintains channel state
//! (octave, default lengths, key shift, loop nesting) and drives the
//! [`crate::emit`] buffer.
//!
//! This is the "driver" component described in the design: everything
//! else ([`crate::scanner`], [`crate::para`], [`crate::length`]) exists to
//! serve it.

use crate::emit::OutputBuffer;
use crate::error::{Diagnostic, MmlErrorKind};
use crate::length::{resolve_length, LengthError};
use crate::para::ParaFlags;
use crate::scanner::Scanner;

/// Loops may nest at most this deep (`[` the fifth time is rejected).
pub const MAX_NEST: usize = 4;

/// Channel state snapshotted when a `:` break is emitted, restored when
/// the enclosing `]` closes the loop, so that state mutations inside the
/// post-`:` loop tail don't leak past the loop.
#[derive(Debug, Clone, Copy)]
struct SavedState {
    l_len96: u16,
    lp_len96: u16,
    octave: u8,
    octave_last: u8,
}

/// Per-nesting-level bookkeeping for `[` / `:` / `]`.
#[derive(Debug, Clone, Copy, Default)]
struct LoopState {
    /// Byte offset one past the `[` preamble's count byte.
    loop_start: usize,
    /// Byte offset one past the `:` break marker, if `:` was used at this level.
    exit_mark: Option<usize>,
    saved: Option<SavedState>,
}

/// Compiles one PSG channel's worth of MML, line by line, into a bytecode
/// buffer. State (octave, default lengths, key shift, loop nesting)
/// persists across calls to [`ChannelCompiler::compile_line`]; the error
/// field is reset at the start of each line (see [`ChannelCompiler::record_error`]).
pub struct ChannelCompiler {
    out: OutputBuffer,

    l_len96: u16,
    lp_len96: u16,
    octave: u8,
    octave_last: u8,
    key_shift: i8,

    nest_depth: usize,
    loops: [LoopState; MAX_NEST],

    error: Option<Diagnostic>,
    line: u32,
}

impl ChannelCompiler {
    pub fn new(capacity: usize) -> Self {
        ChannelCompiler {
            out: OutputBuffer::new(capacity),
            l_len96: 24,
            lp_len96: 192,
            octave: 4,
            octave_last: 4,
            key_shift: 0,
            nest_depth: 0,
            loops: [LoopState::default(); MAX_NEST],
            error: None,
            line: 0,
        }
    }

    pub fn out(&self) -> &[u8] {
        self.out.as_slice()
    }

    pub fn out_len(&self) -> usize {
        self.out.len()
    }

    /// Compile one line's worth of statements. Errors are reset at entry
    /// (the "first error sticks" rule applies within a single line), and
    /// the line's error, if any, is returned.
    pub fn compile_line(&mut self, src: &str, line_no: u32) -> Option<Diagnostic> {
        self.error = None;
        self.line = line_no;

        let mut s = Scanner::new(src);
        while !s.at_end() && self.error.is_none() {
            self.compile_statement(&mut s);
        }
        self.error.clone()
    }

    /// Check loop balance and append the end-of-stream sentinel `0xFF`.
    pub fn finish(&mut self) -> Result<(), Diagnostic> {
        if self.nest_depth != 0 {
            return Err(self.diagnostic(
                MmlErrorKind::CloseNest,
                None,
                "loop not closed before end of channel".to_string(),
            ));
        }
        if self.out.emit_byte(0xFF).is_err() {
            return Err(self.diagnostic(MmlErrorKind::Internal, None, "output buffer overflow".to_string()));
        }
        Ok(())
    }

    fn diagnostic(&self, kind: MmlErrorKind, column: Option<u32>, message: String) -> Diagnostic {
        Diagnostic {
            kind,
            line: self.line,
            column,
            message,
        }
    }

    /// Record an error iff none has been recorded yet this line.
    fn record_error(&mut self, kind: MmlErrorKind, column: Option<u32>, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(self.diagnostic(kind, column, message.into()));
        }
    }

    fn record_internal(&mut self, column: Option<u32>) {
        self.record_error(MmlErrorKind::Internal, column, "output buffer overflow");
    }

    // --- statement dispatch -------------------------------------------------

    fn compile_statement(&mut self, s: &mut Scanner) {
        s.skip_space();
        let Some(ch) = s.peek() else { return };
        if ch == b';' {
            s.discard_to_end();
            return;
        }

        let ch = s.advance().expect("peeked Some above");
        let up = ch.to_ascii_uppercase();
        if matches!(up, b'A'..=b'G' | b'R') {
            self.compile_note(s, up);
        } else {
            self.compile_command(s, up);
        }
    }

    // --- notes ---------------------------------------------------------------

    fn compile_note(&mut self, s: &mut Scanner, note: u8) {
        let col = s.column();
        let mut octave: i32 = self.octave as i32;

        let mut tone = if note == b'R' {
            0i32
        } else {
            let mut t = notename_to_tone(note);
            s.skip_space();
            match s.peek() {
                Some(b'#') | Some(b'+') => {
                    s.advance();
                    t += 1;
                }
                Some(b'-') => {
                    s.advance();
                    t -= 1;
                }
                _ => {}
            }
            t.clamp(1, 12)
        };

        if note != b'R' && self.key_shift != 0 {
            tone += self.key_shift as i32;
            if tone > 12 {
                octave += 1;
                tone -= 12;
            } else if tone < 1 {
                octave -= 1;
                tone += 12;
            }
            if !(1..=8).contains(&octave) {
                self.record_error(MmlErrorKind::NoteOverflow, Some(col), "note transposed out of range");
                return;
            }
        }

        let len = match resolve_length(s, self.l_len96) {
            Ok(len) => len,
            Err(e) => {
                self.record_error(MmlErrorKind::FuncRange, Some(s.column()), length_error_message(e));
                return;
            }
        };
        if len.flags.contains(ParaFlags::PLUS) {
            self.record_error(MmlErrorKind::FuncRange, Some(s.column()), "note length may not use '+'");
            return;
        }
        if len.flags.contains(ParaFlags::MINUS) {
            self.record_error(MmlErrorKind::FuncRange, Some(s.column()), "note length may not use '-'");
            return;
        }

        s.skip_space();
        let tie = if s.peek() == Some(b'&') {
            s.advance();
            true
        } else {
            false
        };

        let octave = octave as u8;
        if octave != self.octave_last {
            if self.out.emit_octave(octave).is_err() {
                self.record_internal(Some(col));
                return;
            }
            self.octave_last = octave;
        }

        let header = make_note_header(tone as u8, len.ticks, tie, self.l_len96, self.lp_len96);
        if self.out.emit_byte(header).is_err() {
            self.record_internal(Some(col));
            return;
        }
        if len.ticks != self.l_len96 && len.ticks != self.lp_len96 {
            let emitted = if len.ticks <= 255 {
                self.out.emit_byte(len.ticks as u8)
            } else {
                self.out.emit_word_le(len.ticks)
            };
            if emitted.is_err() {
                self.record_internal(Some(col));
            }
        }
    }

    // --- commands --------------------------------------------------------------

    fn compile_command(&mut self, s: &mut Scanner, command: u8) {
        match command {
            b'O' => {
                let col = s.column();
                match s.parse_unsigned() {
                    None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'O' requires a value"),
                    Some(v) => self.set_octave(v as i32, col),
                }
            }
            b'>' => {
                let col = s.column();
                let v = s.parse_unsigned().unwrap_or(1) as i32;
                self.set_octave(self.octave as i32 + v, col);
            }
            b'<' => {
                let col = s.column();
                let v = s.parse_unsigned().unwrap_or(1) as i32;
                self.set_octave(self.octave as i32 - v, col);
            }
            b'V' => {
                let col = s.column();
                match s.parse_unsigned() {
                    None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'V' requires a value"),
                    Some(v) if v <= 15 => self.emit_byte_checked(0x90 + v as u8, col),
                    Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'V' out of range (0..=15)"),
                }
            }
            b'(' => {
                let col = s.column();
                let v = s.parse_unsigned().unwrap_or(1);
                if (1..=15).contains(&v) {
                    self.emit_byte_checked(0xB0 + v as u8, col);
                } else {
                    self.record_error(MmlErrorKind::FuncRange, Some(col), "'(' out of range (1..=15)");
                }
            }
            b')' => {
                let col = s.column();
                let v = s.parse_unsigned().unwrap_or(1);
                if (1..=15).contains(&v) {
                    self.emit_byte_checked(0xA0 + v as u8, col);
                } else {
                    self.record_error(MmlErrorKind::FuncRange, Some(col), "')' out of range (1..=15)");
                }
            }
            b'I' => {
                let col = s.column();
                match s.parse_unsigned() {
                    None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'I' requires a value"),
                    Some(v) if v <= 255 => {
                        if self.out.emit_byte(0xF4).is_ok() {
                            self.emit_byte_checked(v as u8, col);
                        } else {
                            self.record_internal(Some(col));
                        }
                    }
                    Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'I' out of range (0..=255)"),
                }
            }
            b'J' => {
                let col = s.column();
                if self.nest_depth > 0 {
                    self.record_error(MmlErrorKind::ReturnInNest, Some(col), "'J' not allowed inside a loop");
                    self.nest_depth = 0;
                    return;
                }
                self.emit_byte_checked(0xFE, col);
            }
            b'L' => self.compile_length_command(s),
            b'M' => self.compile_vibrato_command(s),
            b'N' => {
                let col = s.column();
                self.emit_byte_checked(0xF6, col);
            }
            b'P' => {
                let col = s.column();
                match s.parse_unsigned() {
                    Some(1) => self.emit_byte_checked(0xED, col),
                    Some(2) => self.emit_byte_checked(0xEE, col),
                    Some(3) => self.emit_byte_checked(0xEF, col),
                    None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'P' requires a value"),
                    Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'P' out of range (1,2,3)"),
                }
            }
            b'Q' => {
                let col = s.column();
                match s.parse_unsigned() {
                    None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'Q' requires a value"),
                    Some(v) if v <= 255 => {
                        if self.out.emit_byte(0xFA).is_ok() {
                            self.emit_byte_checked(v as u8, col);
                        } else {
                            self.record_internal(Some(col));
                        }
                    }
                    Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'Q' out of range (0..=255)"),
                }
            }
            b'S' => self.compile_envelope_command(s),
            b'T' => self.compile_tempo_command(s),
            b'U' => self.compile_detune_command(s),
            b'W' => self.compile_noise_freq_command(s),
            b'X' => {
                let col = s.column();
                if self.nest_depth > 0 {
                    self.record_error(MmlErrorKind::ReturnInNest, Some(col), "'X' not allowed inside a loop");
                    self.nest_depth = 0;
                    return;
                }
                self.emit_byte_checked(0xE9, col);
                s.discard_to_end();
            }
            b'_' => {
                let col = s.column();
                match s.parse_signed() {
                    None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'_' requires a value"),
                    Some(v) if (-12..=12).contains(&v) => self.key_shift = v as i8,
                    Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'_' out of range (-12..=12)"),
                }
            }
            b'[' => self.compile_loop_open(s),
            b']' => self.compile_loop_close(s),
            b':' => self.compile_loop_exit(s),
            b';' => s.discard_to_end(),
            _ => {
                let col = s.column();
                self.record_error(MmlErrorKind::Syntax, Some(col), "unrecognised command");
            }
        }
    }

    fn emit_byte_checked(&mut self, v: u8, col: u32) {
        if self.out.emit_byte(v).is_err() {
            self.record_internal(Some(col));
        }
    }

    fn set_octave(&mut self, n: i32, col: u32) {
        if !(1..=8).contains(&n) {
            self.record_error(MmlErrorKind::Octave, Some(col), "octave out of range (1..=8)");
            return;
        }
        self.octave = n as u8;
    }

    fn compile_length_command(&mut self, s: &mut Scanner) {
        let col = s.column();
        let len = match resolve_length(s, self.l_len96) {
            Ok(len) => len,
            Err(e) => {
                self.record_error(MmlErrorKind::FuncRange, Some(col), length_error_message(e));
                return;
            }
        };
        if len.flags.contains(ParaFlags::NOVALUE) {
            self.record_error(MmlErrorKind::FuncRange, Some(col), "'L' requires a value");
            return;
        }
        if len.flags.contains(ParaFlags::MINUS) {
            self.record_error(MmlErrorKind::FuncRange, Some(col), "'L' may not use '-'");
            return;
        }
        if len.ticks < 1 || len.ticks > 255 {
            self.record_error(MmlErrorKind::FuncRange, Some(col), "'L' out of range (1..=255)");
            return;
        }
        if len.flags.contains(ParaFlags::PLUS) {
            self.lp_len96 = len.ticks;
            if self.out.emit_byte(0xF7).is_ok() {
                self.emit_byte_checked(len.ticks as u8, col);
            } else {
                self.record_internal(Some(col));
            }
        } else {
            self.l_len96 = len.ticks;
            if self.out.emit_byte(0xF9).is_ok() {
                self.emit_byte_checked(len.ticks as u8, col);
            } else {
                self.record_internal(Some(col));
            }
        }
    }

    fn compile_vibrato_command(&mut self, s: &mut Scanner) {
        let col = s.column();
        s.skip_space();
        if s.peek() == Some(b'%') {
            s.advance();
            match s.parse_signed() {
                None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'M%' requires a value"),
                Some(v) if (-127..=127).contains(&v) => {
                    if self.out.emit_byte(0xFD).is_ok() {
                        self.emit_byte_checked(sign_byte(v), col);
                    } else {
                        self.record_internal(Some(col));
                    }
                }
                Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'M%' out of range (-127..=127)"),
            }
            return;
        }

        let Some(n1) = s.parse_unsigned() else {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'M' parameters are invalid");
        };
        if !self.expect_comma(s) {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'M' parameters are invalid");
        }
        let Some(n2) = s.parse_unsigned() else {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'M' parameters are invalid");
        };
        if !self.expect_comma(s) {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'M' parameters are invalid");
        }
        let Some(n3) = s.parse_unsigned() else {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'M' parameters are invalid");
        };
        if !self.expect_comma(s) {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'M' parameters are invalid");
        }
        let Some(n4) = s.parse_signed() else {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'M' parameters are invalid");
        };

        if self.out.emit_byte(0xF5).is_ok()
            && self.out.emit_byte(n1 as u8).is_ok()
            && self.out.emit_byte(n2 as u8).is_ok()
            && self.out.emit_byte(n3 as u8).is_ok()
            && self.out.emit_byte(sign_byte(n4)).is_ok()
        {
            // emitted
        } else {
            self.record_internal(Some(col));
        }
    }

    fn compile_envelope_command(&mut self, s: &mut Scanner) {
        let col = s.column();
        let bad = |c: &mut Self| c.record_error(MmlErrorKind::FuncRange, Some(col), "'S' parameters are invalid");

        let Some(n1) = s.parse_signed() else {
            return bad(self);
        };
        if !self.expect_comma(s) {
            return bad(self);
        }
        let Some(n2) = s.parse_unsigned() else {
            return bad(self);
        };
        if !self.expect_comma(s) {
            return bad(self);
        }
        let Some(n3) = s.parse_signed() else {
            return bad(self);
        };
        if !self.expect_comma(s) {
            return bad(self);
        }
        let Some(n4) = s.parse_signed() else {
            return bad(self);
        };
        if !self.expect_comma(s) {
            return bad(self);
        }
        let Some(n5) = s.parse_signed() else {
            return bad(self);
        };

        if self.out.emit_byte(0xEA).is_err() {
            return self.record_internal(Some(col));
        }
        if self.out.emit_byte(n1 as u8).is_err() {
            return self.record_internal(Some(col));
        }
        // If the envelope is off (n1 == 0), the remaining parameters are omitted.
        if n1 != 0 {
            if self.out.emit_byte(n2 as u8).is_err()
                || self.out.emit_byte(n3 as u8).is_err()
                || self.out.emit_byte(n4 as u8).is_err()
                || self.out.emit_byte(sign_byte(n5)).is_err()
            {
                self.record_internal(Some(col));
            }
        }
    }

    fn compile_tempo_command(&mut self, s: &mut Scanner) {
        let col = s.column();
        let bad = |c: &mut Self| c.record_error(MmlErrorKind::FuncRange, Some(col), "'T' parameters are invalid");

        let Some(n1) = s.parse_unsigned() else {
            return bad(self);
        };
        if !(1..=255).contains(&n1) {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'T' n1 out of range (1..=255)");
        }
        if !self.expect_comma(s) {
            return bad(self);
        }
        let Some(n2) = s.parse_unsigned() else {
            return bad(self);
        };
        if n2 > 255 {
            return self.record_error(MmlErrorKind::FuncRange, Some(col), "'T' n2 out of range (0..=255)");
        }

        if self.out.emit_byte(0xF8).is_ok() && self.out.emit_byte(n1 as u8).is_ok() && self.out.emit_byte(n2 as u8).is_ok()
        {
            // emitted
        } else {
            self.record_internal(Some(col));
        }
    }

    fn compile_detune_command(&mut self, s: &mut Scanner) {
        let col = s.column();
        s.skip_space();
        match s.peek() {
            Some(b'%') => {
                s.advance();
                match s.parse_signed() {
                    None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'U%' requires a value"),
                    Some(v) if (-127..=127).contains(&v) => {
                        if self.out.emit_byte(0xFB).is_ok() {
                            self.emit_byte_checked(sign_byte(v), col);
                        } else {
                            self.record_internal(Some(col));
                        }
                    }
                    Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'U%' out of range (-127..=127)"),
                }
            }
            Some(b'+') | Some(b'-') => match s.parse_signed() {
                None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'U+/-' requires a value"),
                Some(v) if (-127..=127).contains(&v) => {
                    if self.out.emit_byte(0xFC).is_ok() {
                        self.emit_byte_checked(v as u8, col);
                    } else {
                        self.record_internal(Some(col));
                    }
                }
                Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'U+/-' out of range (-127..=127)"),
            },
            _ => self.record_error(MmlErrorKind::FuncRange, Some(col), "'U' syntax is invalid"),
        }
    }

    fn compile_noise_freq_command(&mut self, s: &mut Scanner) {
        let col = s.column();
        s.skip_space();
        match s.peek() {
            Some(b'+') | Some(b'-') => match s.parse_signed() {
                None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'W+/-' requires a value"),
                Some(v) if (-31..=31).contains(&v) => {
                    if self.out.emit_byte(0xEC).is_ok() {
                        self.emit_byte_checked(v as u8, col);
                    } else {
                        self.record_internal(Some(col));
                    }
                }
                Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'W+/-' out of range (-31..=31)"),
            },
            _ => match s.parse_unsigned() {
                None => self.record_error(MmlErrorKind::FuncRange, Some(col), "'W' requires a value"),
                Some(v) if v <= 31 => {
                    if self.out.emit_byte(0xEB).is_ok() {
                        self.emit_byte_checked(v as u8, col);
                    } else {
                        self.record_internal(Some(col));
                    }
                }
                Some(_) => self.record_error(MmlErrorKind::FuncRange, Some(col), "'W' out of range (0..=31)"),
            },
        }
    }

    fn expect_comma(&mut self, s: &mut Scanner) -> bool {
        s.skip_space();
        if s.peek() == Some(b',') {
            s.advance();
            true
        } else {
            false
        }
    }

    // --- loops -----------------------------------------------------------------

    fn compile_loop_open(&mut self, s: &mut Scanner) {
        let col = s.column();
        if self.nest_depth >= MAX_NEST {
            self.record_error(MmlErrorKind::FuncRange, Some(col), "loop nesting too deep (max 4)");
            self.nest_depth = 0;
            return;
        }
        if self.out.emit_byte(0xF0).is_err() || self.out.emit_byte(0x00).is_err() {
            self.record_internal(Some(col));
            return;
        }
        self.loops[self.nest_depth] = LoopState {
            loop_start: self.out.len(),
            exit_mark: None,
            saved: None,
        };
        self.nest_depth += 1;
    }

    fn compile_loop_close(&mut self, s: &mut Scanner) {
        let col = s.column();
        if self.nest_depth == 0 {
            self.record_error(MmlErrorKind::OutOfNest, Some(col), "']' without a matching '['");
            return;
        }
        let Some(count) = s.parse_unsigned() else {
            self.record_error(MmlErrorKind::FuncRange, Some(col), "']' requires a value");
            return;
        };
        if !(2..=255).contains(&count) {
            self.record_error(MmlErrorKind::FuncRange, Some(col), "']' out of range (2..=255)");
            return;
        }

        let level = self.nest_depth - 1;
        let ls = self.loops[level];

        self.out.patch_byte(ls.loop_start - 1, count as u8);

        let jump_pos = self.out.len() as i64;
        let mut offset = ls.loop_start as i64 - (jump_pos + 3);
        if (-256..=-1).contains(&offset) {
            offset += 1;
            if self.out.emit_byte(0xF1).is_err() || self.out.emit_byte((offset as i32 & 0xFF) as u8).is_err() {
                self.record_internal(Some(col));
                return;
            }
        } else {
            if self.out.emit_byte(0xF2).is_err() || self.out.emit_word_le(offset as u16).is_err() {
                self.record_internal(Some(col));
                return;
            }
        }

        if let Some(exit_mark) = ls.exit_mark {
            let jump_pos2 = self.out.len() as i64;
            let colon_pos = exit_mark - 3;
            let ex_off = jump_pos2 - (colon_pos as i64 + 3);
            self.out.patch_word_le(colon_pos + 1, ex_off as u16);
        }

        self.nest_depth -= 1;
        if let Some(saved) = ls.saved {
            self.l_len96 = saved.l_len96;
            self.lp_len96 = saved.lp_len96;
            self.octave = saved.octave;
            self.octave_last = saved.octave_last;
        }
    }

    fn compile_loop_exit(&mut self, s: &mut Scanner) {
        let col = s.column();
        if self.nest_depth == 0 {
            self.record_error(MmlErrorKind::OutOfNest, Some(col), "':' outside a loop");
            self.nest_depth = 0;
            return;
        }
        let level = self.nest_depth - 1;
        if self.loops[level].exit_mark.is_some() {
            self.record_error(MmlErrorKind::DupExit, Some(col), "more than one ':' at this loop level");
            self.nest_depth = 0;
            return;
        }
        if self.out.emit_byte(0xF3).is_err() || self.out.emit_word_le(0x0000).is_err() {
            self.record_internal(Some(col));
            return;
        }
        self.loops[level].exit_mark = Some(self.out.len());
        self.loops[level].saved = Some(SavedState {
            l_len96: self.l_len96,
            lp_len96: self.lp_len96,
            octave: self.octave,
            octave_last: self.octave_last,
        });
    }
}

fn notename_to_tone(name: u8) -> i32 {
    match name {
        b'C' => 1,
        b'D' => 3,
        b'E' => 5,
        b'F' => 6,
        b'G' => 8,
        b'A' => 10,
        b'B' => 12,
        _ => unreachable!("caller only dispatches A..G here"),
    }
}

fn make_note_header(tone: u8, ticks: u16, tie: bool, l_len96: u16, lp_len96: u16) -> u8 {
    let mut header = 0u8;
    if tie {
        header |= 0x40;
    }
    header |= if ticks == l_len96 {
        0x00
    } else if ticks == lp_len96 {
        0x10
    } else if ticks <= 255 {
        0x20
    } else {
        0x30
    };
    header | (tone & 0x0F)
}

/// Sign-magnitude byte encoding used by `M%`, `M`'s 4th parameter, `S`'s
/// 5th parameter and `U%`. Not to be confused with the raw two's-complement
/// byte `U+`/`U-` and `W+`/`W-` emit.
fn sign_byte(v: i32) -> u8 {
    if v >= 0 {
        v as u8
    } else {
        0x80 | ((-v) as u8)
    }
}

fn length_error_message(e: LengthError) -> &'static str {
    match e {
        LengthError::PercentNoValue => "length '%' requires a value",
        LengthError::PercentOutOfRange => "length '%' out of range (1..=255)",
        LengthError::BadDenominator => "length denominator is invalid (1,2,3,4,6,8,12,16,24,32,48,96)",
        LengthError::UnplayableDot => "'.' produces an unplayable (odd) length",
        LengthError::OutOfRange => "resolved length out of range (1..=32767)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> Vec<u8> {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        for (i, line) in src.lines().enumerate() {
            let err = c.compile_line(line, (i + 1) as u32);
            assert!(err.is_none(), "unexpected error compiling {:?}: {:?}", line, err);
        }
        c.finish().expect("finish should succeed");
        c.out().to_vec()
    }

    #[test]
    fn single_default_note_emits_no_octave_byte() {
        assert_eq!(compile("c"), vec![0x01, 0xFF]);
    }

    #[test]
    fn l_command_then_default_note() {
        assert_eq!(compile("L8 c"), vec![0xF9, 0x0C, 0x01, 0xFF]);
    }

    #[test]
    fn explicit_length_byte() {
        assert_eq!(compile("c8"), vec![0x21, 0x0C, 0xFF]);
    }

    #[test]
    fn loop_with_one_byte_backjump() {
        assert_eq!(
            compile("[ c d ]3"),
            vec![0xF0, 0x03, 0x01, 0x03, 0xF1, 0xFC, 0xFF]
        );
    }

    #[test]
    fn tie_bit_is_on_the_first_note() {
        assert_eq!(compile("c&d"), vec![0x41, 0x03, 0xFF]);
    }

    #[test]
    fn octave_change_then_note() {
        assert_eq!(compile("O5 c"), vec![0x85, 0x01, 0xFF]);
    }

    #[test]
    fn l96_and_l1_are_boundary_ticks() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        assert!(c.compile_line("L96", 1).is_none());
        assert_eq!(c.l_len96, 1);
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        assert!(c.compile_line("L1", 1).is_none());
        assert_eq!(c.l_len96, 96);
    }

    #[test]
    fn dot_on_odd_length_is_rejected() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        let err = c.compile_line("L3.", 1).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::FuncRange);
    }

    #[test]
    fn loop_close_rejects_count_one() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        c.compile_line("[", 1);
        let err = c.compile_line("c ]1", 2).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::FuncRange);
    }

    #[test]
    fn loop_close_accepts_count_two() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        c.compile_line("[", 1);
        assert!(c.compile_line("c ]2", 2).is_none());
    }

    #[test]
    fn fifth_nested_open_is_rejected() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        let err = c.compile_line("[[[[[", 1).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::FuncRange);
        assert_eq!(c.nest_depth, 0);
    }

    #[test]
    fn transposition_overflow_is_note_overflow() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        let err = c.compile_line("_12 o8 b", 1).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::NoteOverflow);
    }

    #[test]
    fn colon_snapshot_is_restored_after_close() {
        // Inside the loop body after ':' the default length changes, but
        // that must not leak past the matching ']'.
        let bytes = compile("[ L8 c : L16 d ]2\nc");
        // After the loop, L has been restored to 24 (L4), so a trailing
        // default-length note again costs just the header byte.
        assert_eq!(bytes.last(), Some(&0xFF));
        assert_eq!(bytes[bytes.len() - 2], 0x01);
    }

    #[test]
    fn j_inside_loop_is_rejected_and_resets_nesting() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        c.compile_line("[", 1);
        let err = c.compile_line("J", 2).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::ReturnInNest);
        assert_eq!(c.nest_depth, 0);
    }

    #[test]
    fn x_discards_rest_of_line_but_not_channel() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        assert!(c.compile_line("Xc", 1).is_none());
        assert_eq!(c.out(), &[0xE9]);
    }

    #[test]
    fn unknown_command_is_syntax_error() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        let err = c.compile_line("Z", 1).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::Syntax);
    }

    #[test]
    fn colon_without_loop_is_out_of_nest() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        let err = c.compile_line(":", 1).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::OutOfNest);
    }

    #[test]
    fn duplicate_exit_marker_is_rejected() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        c.compile_line("[", 1);
        let err = c.compile_line(": :", 2).expect("should error");
        assert_eq!(err.kind, MmlErrorKind::DupExit);
    }

    #[test]
    fn unclosed_loop_fails_finish() {
        let mut c = ChannelCompiler::new(crate::emit::DEFAULT_CAPACITY);
        c.compile_line("[", 1);
        let err = c.finish().expect_err("should error");
        assert_eq!(err.kind, MmlErrorKind::CloseNest);
    }
}
