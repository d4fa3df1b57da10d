/*
 * Part of psgmmlc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! The shared `[%] [+|-] digits*` operand form ("PARA" in the original)
//! accepted by several commands (`L`, `M%`, `U%`, `U+`/`U-`, length specs,
//! ...).
//!
//! This parser does no range validation of its own; callers decide what
//! combinations of flags and values are legal for their command.

use crate::scanner::Scanner;
use bitflags::bitflags;

bitflags! {
    /// Which optional tokens were present in a PARA operand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParaFlags: u8 {
        const PERCENT = 0b0001;
        const PLUS    = 0b0010;
        const MINUS   = 0b0100;
        /// Set when no digit was found; `value` is then meaningless (0).
        const NOVALUE = 0b1000;
    }
}

/// The result of parsing one PARA operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Para {
    pub flags: ParaFlags,
    /// Saturated at 65535 if the digit run overflows, per the original.
    pub value: u16,
}

/// Parse `['%'] ['+'|'-'] digits*`, allowing whitespace between tokens.
pub fn parse_para(s: &mut Scanner) -> Para {
    let mut flags = ParaFlags::empty();

    s.skip_space();
    if s.peek() == Some(b'%') {
        s.advance();
        flags |= ParaFlags::PERCENT;
        s.skip_space();
    }

    match s.peek() {
        Some(b'-') => {
            s.advance();
            flags |= ParaFlags::MINUS;
            s.skip_space();
        }
        Some(b'+') => {
            s.advance();
            flags |= ParaFlags::PLUS;
            s.skip_space();
        }
        _ => {}
    }

    let value = match s.parse_unsigned() {
        Some(v) => v.min(u16::MAX as u32) as u16,
        None => {
            flags |= ParaFlags::NOVALUE;
            0
        }
    };

    Para { flags, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_digits() {
        let mut s = Scanner::new("42");
        let p = parse_para(&mut s);
        assert_eq!(p.flags, ParaFlags::empty());
        assert_eq!(p.value, 42);
    }

    #[test]
    fn percent_prefixed() {
        let mut s = Scanner::new("%12");
        let p = parse_para(&mut s);
        assert_eq!(p.flags, ParaFlags::PERCENT);
        assert_eq!(p.value, 12);
    }

    #[test]
    fn signed_forms() {
        let mut s = Scanner::new("+5");
        let p = parse_para(&mut s);
        assert_eq!(p.flags, ParaFlags::PLUS);
        assert_eq!(p.value, 5);

        let mut s = Scanner::new("-5");
        let p = parse_para(&mut s);
        assert_eq!(p.flags, ParaFlags::MINUS);
        assert_eq!(p.value, 5);
    }

    #[test]
    fn whitespace_between_tokens_is_allowed() {
        let mut s = Scanner::new("% - 7");
        let p = parse_para(&mut s);
        assert_eq!(p.flags, ParaFlags::PERCENT | ParaFlags::MINUS);
        assert_eq!(p.value, 7);
    }

    #[test]
    fn no_digits_sets_novalue() {
        let mut s = Scanner::new("%+x");
        let p = parse_para(&mut s);
        assert!(p.flags.contains(ParaFlags::NOVALUE));
        assert_eq!(p.value, 0);
        // The non-digit character is left for the caller to reinterpret.
        assert_eq!(s.peek(), Some(b'x'));
    }
}
