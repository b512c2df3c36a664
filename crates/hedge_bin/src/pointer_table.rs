//! Packed pointer tables.
//!
//! Relocatable files end with a table listing every location in the file that holds a pointer, so the
//! game can fix them up after loading. Locations are stored as deltas from the previous location,
//! divided by four, in one of three widths picked by the top two bits of the first byte:
//!
//! | Tag    | Size    | Payload                      |
//! |--------|---------|------------------------------|
//! | `00`   | -       | padding, ends the table      |
//! | `01`   | 1 byte  | 6 bit delta                  |
//! | `10`   | 2 bytes | 14 bit delta (big endian)    |
//! | `11`   | 4 bytes | 30 bit delta (big endian)    |
//!
//! The first delta is taken from a base, usually the length of the file header. Because deltas are
//! stored divided by four, every pointer location must be 4 byte aligned.

use crate::error::{Error, Result};

const TAG_MASK: u8 = 0xC0;
const TAG_6: u8 = 0x40;
const TAG_14: u8 = 0x80;
const TAG_30: u8 = 0xC0;

/// Encode strictly increasing pointer locations into a packed table
///
/// Every location must be 4 byte aligned and greater than the previous one (the first one greater or
/// equal to `base`). These preconditions are not checked in release builds; violating them produces a
/// table that decodes to different locations. The result is padded with zeros to a multiple of 4.
pub fn encode_pointer_table(offsets: &[u32], base: u32) -> Vec<u8> {
    let mut table = Vec::with_capacity(offsets.len() + 3);
    let mut last = base;

    for &offset in offsets {
        debug_assert!(offset % 4 == 0, "pointer location {offset:#X} is not aligned");
        debug_assert!(offset >= last, "pointer location {offset:#X} is out of order");

        let delta = offset.wrapping_sub(last) >> 2;
        if delta <= 0x3F {
            table.push(TAG_6 | delta as u8);
        } else if delta <= 0x3FFF {
            table.push(TAG_14 | (delta >> 8) as u8);
            table.push(delta as u8);
        } else {
            table.push(TAG_30 | (delta >> 24) as u8);
            table.push((delta >> 16) as u8);
            table.push((delta >> 8) as u8);
            table.push(delta as u8);
        }

        last = offset;
    }

    while table.len() % 4 != 0 {
        table.push(0);
    }
    table
}

/// Decode a packed table back into absolute pointer locations
///
/// Decoding stops at the first padding byte or at the end of `table`. A multi-byte entry cut off by the
/// end of `table` is an error.
pub fn decode_pointer_table(table: &[u8], base: u32) -> Result<Vec<u32>> {
    let mut offsets = Vec::new();
    let mut last = base;
    let mut i = 0;

    while i < table.len() {
        let tag = table[i] & TAG_MASK;
        let width = match tag {
            TAG_6 => 1,
            TAG_14 => 2,
            TAG_30 => 4,
            _ => break,
        };

        let Some(bytes) = table.get(i..i + width) else {
            return Err(Error::UnexpectedEndOfData {
                position: table.len() as u64,
            });
        };

        let delta = bytes
            .iter()
            .skip(1)
            .fold((bytes[0] & !TAG_MASK) as u32, |acc, &b| (acc << 8) | b as u32);

        last = last.wrapping_add(delta << 2);
        offsets.push(last);
        i += width;
    }

    Ok(offsets)
}
