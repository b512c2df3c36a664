//! This library provides the binary plumbing shared by the archive formats of the *Sonic the Hedgehog*
//! games from the Hedgehog Engine era and their predecessors.
//!
//! # Overview
//!
//! - [`BinaryReader`] and [`BinaryWriter`] read and write fixed-width scalars, `f32` vector aggregates
//!   and strings with a byte order that is chosen per stream and can be switched at any point.
//! - [`BinaryWriter`] additionally keeps a table of relocation slots: placeholders that are written
//!   before the value they hold is known and filled in ("backpatched") later.
//! - [`pointer_table`] encodes and decodes the packed pointer tables that relocatable files end with.
//!
//! ## Relocation Slots
//!
//! | Operation                         | Effect                                                        |
//! |-----------------------------------|---------------------------------------------------------------|
//! | `reserve_u32` / `reserve_u64`     | writes a zero placeholder and returns a [`Slot`] handle       |
//! | `reserve_pointer`                 | like `reserve_u64`, and records the location as a pointer     |
//! | `reserve_named`                   | writes a zero placeholder tracked by name                     |
//! | `backpatch*`                      | writes the value into the placeholder, restores the position  |
//! | `finish`                          | fails if any placeholder was never filled                     |
//!
//! ## Pointer Table Encoding
//!
//! | Tag    | Size    | Payload                      |
//! |--------|---------|------------------------------|
//! | `01`   | 1 byte  | 6 bit delta                  |
//! | `10`   | 2 bytes | 14 bit delta                 |
//! | `11`   | 4 bytes | 30 bit delta                 |
//!
//! Deltas are measured between consecutive pointer locations in units of 4 bytes.
//!

pub mod error;
pub mod pointer_table;
pub mod read;
pub mod types;
pub mod write;

pub use pointer_table::{decode_pointer_table, encode_pointer_table};
pub use read::BinaryReader;
pub use types::{Endian, Quaternion, Vector3, Vector4};
pub use write::{BinaryWriter, Slot, SlotWidth};
