//! Endian-aware stream writing with deferred offsets
//!

use binrw::BinWrite;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use indexmap::IndexMap;
use std::fmt;
use std::io::{Seek, SeekFrom, Write};
use tracing::{instrument, trace};

use crate::{
    error::{Error, Result},
    pointer_table::encode_pointer_table,
    types::{Endian, Quaternion, Vector3, Vector4},
};

macro_rules! write_scalar {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $method:ident) => {
        $(#[$doc])*
        pub fn $name(&mut self, value: $ty) -> Result<()> {
            match self.endian {
                Endian::Little => self.inner.$method::<LittleEndian>(value)?,
                Endian::Big => self.inner.$method::<BigEndian>(value)?,
            }
            Ok(())
        }
    };
}

/// Width of a reserved placeholder
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotWidth {
    /// 4 byte offset
    U32,

    /// 8 byte offset
    U64,
}

/// Handle to a placeholder reserved with [`BinaryWriter::reserve_u32`] or [`BinaryWriter::reserve_u64`]
///
/// The handle is consumed when the slot is backpatched, so a slot can only be filled once.
#[must_use = "a reserved slot has to be backpatched before the writer is finished"]
#[derive(Debug, PartialEq, Eq)]
pub struct Slot {
    id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Anonymous(u64),
    Named(String),
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Anonymous(id) => write!(f, "#{id}"),
            SlotKey::Named(name) => write!(f, "'{name}'"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSlot {
    position: u64,
    width: SlotWidth,
}

/// Writes scalars, aggregates and strings to a seekable stream
///
/// Besides plain writes the writer keeps a table of relocation slots: placeholders written now whose
/// value (usually the position of something written later) is filled in once it is known. The table
/// belongs to one writer, so it lives exactly as long as one save. [`BinaryWriter::finish`] refuses
/// to hand the stream back while any slot is still pending.
///
/// ```
/// # fn doit() -> hedge_bin::error::Result<()> {
/// use hedge_bin::{BinaryWriter, Endian};
///
/// let mut writer = BinaryWriter::new(std::io::Cursor::new(Vec::new()), Endian::Little);
/// let names = writer.reserve_u32()?;
/// writer.write_u32(0xFFFF_FFFF)?;
/// writer.backpatch(names)?;
/// writer.write_cstring("hello")?;
///
/// let stream = writer.finish()?;
/// assert_eq!(&stream.get_ref()[..4], &[0x08, 0x00, 0x00, 0x00]);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct BinaryWriter<W: Write + Seek> {
    inner: W,
    endian: Endian,
    pending: IndexMap<SlotKey, PendingSlot>,
    next_slot: u64,
    pointers: Vec<u32>,
}

impl<W: Write + Seek> BinaryWriter<W> {
    /// Wrap a stream, writing multi-byte values in the given order
    pub fn new(inner: W, endian: Endian) -> Self {
        Self {
            inner,
            endian,
            pending: IndexMap::new(),
            next_slot: 0,
            pointers: Vec::new(),
        }
    }

    /// The byte order currently used for writes
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Change the byte order for all following writes
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Run `f` with a temporary byte order, restoring the previous one afterwards
    pub fn with_endian<T>(
        &mut self,
        endian: Endian,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.endian, endian);
        let result = f(self);
        self.endian = previous;
        result
    }

    /// Current absolute position
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Seek to an absolute position
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Seek relative to the current position
    pub fn seek_by(&mut self, delta: i64) -> Result<()> {
        self.inner.seek(SeekFrom::Current(delta))?;
        Ok(())
    }

    /// Write zero bytes until the position is a multiple of `alignment`
    pub fn pad_to(&mut self, alignment: u64) -> Result<()> {
        if alignment > 1 {
            let remainder = self.position()? % alignment;
            if remainder != 0 {
                self.write_zeros((alignment - remainder) as usize)?;
            }
        }
        Ok(())
    }

    pub fn write_zeros(&mut self, count: usize) -> Result<()> {
        self.inner.write_all(&vec![0u8; count])?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        Ok(())
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.inner.write_i8(value)?;
        Ok(())
    }

    write_scalar!(write_u16, u16, write_u16);
    write_scalar!(write_i16, i16, write_i16);
    write_scalar!(write_u32, u32, write_u32);
    write_scalar!(write_i32, i32, write_i32);
    write_scalar!(write_u64, u64, write_u64);
    write_scalar!(write_i64, i64, write_i64);
    write_scalar!(write_f32, f32, write_f32);
    write_scalar!(write_f64, f64, write_f64);

    pub fn write_vector3(&mut self, value: &Vector3) -> Result<()> {
        self.write_struct(value)
    }

    pub fn write_vector4(&mut self, value: &Vector4) -> Result<()> {
        self.write_struct(value)
    }

    pub fn write_quaternion(&mut self, value: &Quaternion) -> Result<()> {
        self.write_struct(value)
    }

    /// Write any [`BinWrite`] type using the writer's current byte order
    pub fn write_struct<T>(&mut self, value: &T) -> Result<()>
    where
        T: BinWrite,
        for<'a> T::Args<'a>: Default,
    {
        value.write_options(&mut self.inner, self.endian.into(), Default::default())?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    /// Write a string followed by a null terminator
    pub fn write_cstring(&mut self, value: &str) -> Result<()> {
        self.inner.write_all(value.as_bytes())?;
        self.inner.write_u8(0)?;
        Ok(())
    }

    /// Write a string into a fixed-size slot, padding the remainder with zeros
    ///
    /// The caller is responsible for checking that the string fits; anything longer is cut off.
    pub fn write_fixed_string(&mut self, value: &str, size: usize) -> Result<()> {
        let bytes = value.as_bytes();
        let used = bytes.len().min(size);
        self.inner.write_all(&bytes[..used])?;
        self.write_zeros(size - used)
    }

    /// Reserve a 4 byte placeholder at the current position
    pub fn reserve_u32(&mut self) -> Result<Slot> {
        self.reserve(SlotWidth::U32)
    }

    /// Reserve an 8 byte placeholder at the current position
    pub fn reserve_u64(&mut self) -> Result<Slot> {
        self.reserve(SlotWidth::U64)
    }

    /// Reserve an 8 byte placeholder and record its location in the pointer table
    pub fn reserve_pointer(&mut self) -> Result<Slot> {
        let position = self.position()?;
        let position =
            u32::try_from(position).map_err(|_| Error::OffsetOverflow { value: position })?;
        self.pointers.push(position);
        self.reserve(SlotWidth::U64)
    }

    /// Reserve a placeholder identified by name
    ///
    /// Reserving a name that is still pending replaces the earlier reservation, whose placeholder
    /// stays zero.
    pub fn reserve_named(&mut self, name: impl Into<String>, width: SlotWidth) -> Result<()> {
        let key = SlotKey::Named(name.into());
        let position = self.position()?;
        if let Some(previous) = self.pending.get(&key) {
            trace!(slot = %key, previous = previous.position, "replacing pending slot");
        }
        self.write_placeholder(width)?;
        self.pending.insert(key, PendingSlot { position, width });
        Ok(())
    }

    /// Fill a slot with the current position
    pub fn backpatch(&mut self, slot: Slot) -> Result<()> {
        let position = self.position()?;
        self.patch(&SlotKey::Anonymous(slot.id), position)
    }

    /// Fill a slot with an explicit value
    pub fn backpatch_with(&mut self, slot: Slot, value: u64) -> Result<()> {
        self.patch(&SlotKey::Anonymous(slot.id), value)
    }

    /// Fill a slot with the current position minus `base`
    pub fn backpatch_relative(&mut self, slot: Slot, base: u64) -> Result<()> {
        let position = self.position()?;
        let value = position
            .checked_sub(base)
            .ok_or(Error::NegativeOffset { position, base })?;
        self.patch(&SlotKey::Anonymous(slot.id), value)
    }

    /// Fill a named slot with the current position
    pub fn backpatch_named(&mut self, name: &str) -> Result<()> {
        let position = self.position()?;
        self.patch(&SlotKey::Named(name.to_owned()), position)
    }

    /// Fill a named slot with an explicit value
    pub fn backpatch_named_with(&mut self, name: &str, value: u64) -> Result<()> {
        self.patch(&SlotKey::Named(name.to_owned()), value)
    }

    /// Number of slots still waiting for a value
    pub fn pending_slots(&self) -> usize {
        self.pending.len()
    }

    /// Absolute positions of every pointer reserved with [`BinaryWriter::reserve_pointer`]
    pub fn pointers(&self) -> &[u32] {
        &self.pointers
    }

    /// Encode the recorded pointers at the current position, returning the table size
    #[instrument(skip(self), err)]
    pub fn write_pointer_table(&mut self, base: u32) -> Result<u32> {
        let mut pointers = self.pointers.clone();
        pointers.sort_unstable();
        let table = encode_pointer_table(&pointers, base);
        self.inner.write_all(&table)?;
        Ok(table.len() as u32)
    }

    /// Verify every slot was filled and hand back the stream
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        if !self.pending.is_empty() {
            let unresolved = self
                .pending
                .iter()
                .map(|(key, slot)| format!("{key} at {:#X}", slot.position))
                .collect();
            return Err(Error::UnresolvedSlots(unresolved));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn reserve(&mut self, width: SlotWidth) -> Result<Slot> {
        let id = self.next_slot;
        self.next_slot += 1;

        let position = self.position()?;
        self.write_placeholder(width)?;
        self.pending
            .insert(SlotKey::Anonymous(id), PendingSlot { position, width });
        Ok(Slot { id })
    }

    fn write_placeholder(&mut self, width: SlotWidth) -> Result<()> {
        match width {
            SlotWidth::U32 => self.write_u32(0),
            SlotWidth::U64 => self.write_u64(0),
        }
    }

    fn patch(&mut self, key: &SlotKey, value: u64) -> Result<()> {
        let Some(slot) = self.pending.get(key).copied() else {
            return Err(Error::UnknownSlot(key.to_string()));
        };
        if slot.width == SlotWidth::U32 && value > u32::MAX as u64 {
            return Err(Error::OffsetOverflow { value });
        }
        self.pending.shift_remove(key);

        trace!(slot = %key, position = slot.position, value, "backpatching");
        let resume = self.position()?;
        self.seek_to(slot.position)?;
        match slot.width {
            SlotWidth::U32 => self.write_u32(value as u32)?,
            SlotWidth::U64 => self.write_u64(value)?,
        }
        self.seek_to(resume)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    use crate::error::{Error, Result};
    use crate::types::{Endian, Vector3};
    use crate::write::{BinaryWriter, SlotWidth};

    #[test]
    fn write_scalars_big_endian() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Big);
        writer.write_u16(0x1234)?;
        writer.write_u32(0x55AA382D)?;
        writer.write_f32(1.0)?;

        #[rustfmt::skip]
        let expected = vec![
            0x12, 0x34,
            0x55, 0xAA, 0x38, 0x2D,
            0x3F, 0x80, 0x00, 0x00,
        ];
        assert_eq!(writer.finish()?.into_inner(), expected);

        Ok(())
    }

    #[test]
    fn write_vector_and_strings() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);
        writer.write_vector3(&Vector3 {
            x: 0.0,
            y: 1.0,
            z: 0.0,
        })?;
        writer.write_cstring("ab")?;
        writer.write_fixed_string("xyz", 5)?;

        #[rustfmt::skip]
        let expected = vec![
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x80, 0x3F,
            0x00, 0x00, 0x00, 0x00,
            b'a', b'b', 0x00,
            b'x', b'y', b'z', 0x00, 0x00,
        ];
        assert_eq!(writer.finish()?.into_inner(), expected);

        Ok(())
    }

    #[test]
    fn pad_to_boundary() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);
        writer.write_u8(1)?;
        writer.pad_to(4)?;
        writer.pad_to(4)?;

        assert_eq!(writer.finish()?.into_inner(), vec![1, 0, 0, 0]);

        Ok(())
    }

    #[test]
    fn backpatch_relative_to_base() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Big);
        writer.write_zeros(8)?;
        let slot = writer.reserve_u32()?;
        writer.write_zeros(4)?;
        writer.backpatch_relative(slot, 8)?;

        #[rustfmt::skip]
        let expected = vec![
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x08,
            0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(writer.finish()?.into_inner(), expected);

        Ok(())
    }

    #[test]
    fn named_slot_last_reservation_wins() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);
        writer.reserve_named("data", SlotWidth::U32)?;
        writer.reserve_named("data", SlotWidth::U32)?;
        writer.backpatch_named_with("data", 0xAB)?;

        assert_eq!(writer.pending_slots(), 0);
        assert_eq!(
            writer.finish()?.into_inner(),
            vec![0, 0, 0, 0, 0xAB, 0, 0, 0]
        );

        Ok(())
    }

    #[test]
    fn unknown_named_slot_fails() {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);

        assert!(matches!(
            writer.backpatch_named("missing"),
            Err(Error::UnknownSlot(_))
        ));
    }

    #[test]
    fn finish_with_pending_slot_fails() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);
        let _slot = writer.reserve_u64()?;
        writer.reserve_named("names", SlotWidth::U32)?;

        match writer.finish() {
            Err(Error::UnresolvedSlots(slots)) => assert_eq!(slots.len(), 2),
            _ => panic!("writer with pending slots must not finish"),
        }

        Ok(())
    }

    #[test]
    fn oversized_value_in_u32_slot_fails() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);
        let slot = writer.reserve_u32()?;

        assert!(matches!(
            writer.backpatch_with(slot, 0x1_0000_0000),
            Err(Error::OffsetOverflow { .. })
        ));

        Ok(())
    }

    #[test]
    fn reserve_pointer_records_position() -> Result<()> {
        let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);
        writer.write_zeros(0x10)?;
        let first = writer.reserve_pointer()?;
        let second = writer.reserve_pointer()?;
        writer.backpatch(first)?;
        writer.backpatch(second)?;

        assert_eq!(writer.pointers(), &[0x10, 0x18]);

        Ok(())
    }
}
