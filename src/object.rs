/*
 * Part of psgmmlc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Assembles three compiled channel bytecode streams into the final
//! object file: an 8-byte little-endian address header followed by the
//! three streams concatenated in channel order.
//!
//! Mirrors the original compiler's object-file layout exactly (see
//! `CH1_ADDR_OFFSET`..`CH1_START_OFFSET` in the original `main.c`), kept
//! separate from [`crate::driver`] since it has nothing to do with
//! parsing MML and everything to do with the output container format.

use crate::driver::PSG_NCH;

/// Byte offset, within the object file, at which channel 1's bytecode begins.
pub const CH1_START_OFFSET: u16 = 8;

/// Build the final object file: an 8-byte header of three little-endian
/// start addresses, followed by each channel's bytecode in order.
///
/// `base` is the caller-supplied load address (`-b` on the CLI); each
/// channel's recorded start address is `base + CH1_START_OFFSET + (bytes
/// of all preceding channels)`.
pub fn assemble(channel_bytes: &[Vec<u8>; PSG_NCH], base: u16) -> Vec<u8> {
    let mut offsets = [0u16; PSG_NCH];
    let mut acc = CH1_START_OFFSET;
    for i in 0..PSG_NCH {
        offsets[i] = acc;
        acc += channel_bytes[i].len() as u16;
    }

    let total_len = CH1_START_OFFSET as usize + channel_bytes.iter().map(|b| b.len()).sum::<usize>();
    let mut out = Vec::with_capacity(total_len);

    for i in 0..PSG_NCH {
        out.extend_from_slice(&base.wrapping_add(offsets[i]).to_le_bytes());
    }
    // Offset 6, size 2: unused, zero.
    out.resize(CH1_START_OFFSET as usize, 0);
    for bytes in channel_bytes {
        out.extend_from_slice(bytes);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_addresses_chain_off_channel_lengths() {
        let channels: [Vec<u8>; PSG_NCH] = [vec![0xFF], vec![0x01, 0xFF], vec![0xFF]];
        let out = assemble(&channels, 0x2000);
        // ch1 = 0x2000 + 8 = 0x2008
        assert_eq!(&out[0..2], &[0x08, 0x20]);
        // ch2 = 0x2008 + 1 = 0x2009
        assert_eq!(&out[2..4], &[0x09, 0x20]);
        // ch3 = 0x2009 + 2 = 0x200B
        assert_eq!(&out[4..6], &[0x0B, 0x20]);
        assert_eq!(&out[8..], &[0xFF, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn default_base_is_zero() {
        let channels: [Vec<u8>; PSG_NCH] = [vec![0xFF], vec![0xFF], vec![0xFF]];
        let out = assemble(&channels, 0);
        assert_eq!(&out[0..2], &[0x08, 0x00]);
    }

    #[test]
    fn total_length_is_header_plus_all_channels() {
        let channels: [Vec<u8>; PSG_NCH] = [vec![0; 10], vec![0; 20], vec![0; 30]];
        let out = assemble(&channels, 0);
        assert_eq!(out.len(), 8 + 10 + 20 + 30);
    }
}
