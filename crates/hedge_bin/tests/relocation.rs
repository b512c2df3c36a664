use hedge_bin::{error::Error, BinaryReader, BinaryWriter, Endian, SlotWidth};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use tracing::info;
use tracing_test::traced_test;

/// Writes a tiny relocatable file: a header with a pointer to a name and a pointer table at the end.
fn write_relocatable(endian: Endian) -> Result<Vec<u8>, Error> {
    let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), endian);

    writer.write_bytes(b"TEST")?;
    let table_size = writer.reserve_u32()?;
    let name = writer.reserve_pointer()?;
    writer.write_vector3(&hedge_bin::Vector3 {
        x: 1.0,
        y: 2.0,
        z: 3.0,
    })?;
    writer.pad_to(8)?;
    let other = writer.reserve_pointer()?;

    writer.backpatch(name)?;
    writer.write_cstring("sonic")?;
    writer.backpatch(other)?;
    writer.write_cstring("tails")?;
    writer.pad_to(4)?;

    let table_start = writer.position()? as u32;
    let size = writer.write_pointer_table(8)?;
    info!("pointer table of {size} bytes at {table_start:#X}");
    writer.backpatch_with(table_size, size as u64)?;

    Ok(writer.finish()?.into_inner())
}

#[traced_test]
#[test]
fn relocated_pointers_can_be_followed() -> Result<(), Error> {
    for endian in [Endian::Little, Endian::Big] {
        let data = write_relocatable(endian)?;
        let mut reader = BinaryReader::new(Cursor::new(data.clone()), endian);

        assert_eq!(reader.read_bytes(4)?, b"TEST");
        let table_size = reader.read_u32()? as usize;
        let name = reader.read_u64()?;
        let vector = reader.read_vector3()?;
        assert_eq!(vector.z, 3.0);
        reader.align(8)?;
        let other = reader.read_u64()?;

        assert_eq!(reader.read_at(name, |r| r.read_cstring())?, "sonic");
        assert_eq!(reader.read_at(other, |r| r.read_cstring())?, "tails");

        reader.seek_to((data.len() - table_size) as u64)?;
        let pointers = reader.read_pointer_table(table_size, 8)?;
        assert_eq!(pointers, vec![0x08, 0x20]);
    }

    Ok(())
}

#[test]
fn every_slot_must_be_resolved() -> Result<(), Error> {
    let mut writer = BinaryWriter::new(Cursor::new(Vec::new()), Endian::Little);
    let resolved = writer.reserve_u32()?;
    writer.reserve_named("file_0", SlotWidth::U32)?;
    writer.backpatch(resolved)?;

    match writer.finish() {
        Err(Error::UnresolvedSlots(slots)) => {
            assert_eq!(slots, vec!["'file_0' at 0x4".to_string()]);
        }
        _ => panic!("finishing with an unresolved slot must fail"),
    }

    Ok(())
}
