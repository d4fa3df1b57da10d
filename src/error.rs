/*
 * Part of psgmmlc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Compile error kinds and the diagnostic record that carries source
//! position alongside them.

use std::fmt;

/// One compile-time error condition, one per original `MML_ERR_*` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MmlErrorKind {
    /// Unexpected character or unknown command.
    #[error("syntax error")]
    Syntax,
    /// Missing value or out-of-range parameter.
    #[error("parameter out of range")]
    FuncRange,
    /// `O`/`<`/`>` leaves the octave outside 1..=8.
    #[error("octave out of range")]
    Octave,
    /// `:` or `]` used without an enclosing `[`.
    #[error("not inside a loop")]
    OutOfNest,
    /// Channel finished with an unclosed `[`.
    #[error("loop not closed before end of channel")]
    CloseNest,
    /// More than one `:` at the same loop nesting level.
    #[error("duplicate loop exit")]
    DupExit,
    /// `J` or `X` used inside a loop.
    #[error("not allowed inside a loop")]
    ReturnInNest,
    /// Transposition pushed a note's octave outside 1..=8.
    #[error("note transposed out of range")]
    NoteOverflow,
    /// Output buffer capacity exceeded.
    #[error("internal: output buffer overflow")]
    Internal,
}

/// A single compile error together with where it happened.
///
/// Only the first error raised against a [`crate::channel::ChannelCompiler`]
/// is ever recorded: once set, it sticks until the next line reset. See
/// [`crate::channel::ChannelCompiler::record_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: MmlErrorKind,
    pub line: u32,
    /// 1-based column, or `None` if the error has no specific token.
    pub column: Option<u32>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(col) => write!(
                f,
                "{} (line {}, column {}): {}",
                self.kind, self.line, col, self.message
            ),
            None => write!(f, "{} (line {}): {}", self.kind, self.line, self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

pub type MmlResult<T> = Result<T, Diagnostic>;
