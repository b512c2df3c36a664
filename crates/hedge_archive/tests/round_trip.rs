use hedge_archive::{
    error::Error, AnyArchive, ArchiveEntry, ArchiveFile, CompressionMethod, Format, GensArchive,
    GensWriteOptions, OneArchive, OneMagic, PacArchive, PacWriteOptions, StorybookArchive,
    U8Archive, U8WriteOptions,
};
use hedge_bin::Endian;
use pretty_assertions::assert_eq;
use std::fs;
use tracing::info;
use tracing_test::traced_test;

fn sample_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("ghz_obj.bin", b"objects".to_vec()),
        ("ghz_sky.dds", vec![0x44; 0x45]),
        ("ghz_sky.material", b"material".to_vec()),
        ("empty.txt", Vec::new()),
    ]
}

/// Names and contents of every file, in archive order
fn contents(archive: &hedge_archive::Archive) -> Vec<(String, Vec<u8>)> {
    archive
        .files(true)
        .into_iter()
        .map(|f| (f.path, f.file.data().to_vec()))
        .collect()
}

fn expected() -> Vec<(String, Vec<u8>)> {
    sample_files()
        .into_iter()
        .map(|(name, data)| (name.to_owned(), data))
        .collect()
}

#[traced_test]
#[test]
fn every_format_round_trips_through_disk() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;

    for (format, name) in [
        (Format::Gens, "stage.ar"),
        (Format::Pac, "stage.pac"),
        (Format::One, "stage.one"),
        (Format::U8, "stage.arc"),
        (Format::Storybook, "story.one"),
    ] {
        info!("testing {format}");
        let path = directory.path().join(name);

        let mut archive = AnyArchive::new(format);
        for (name, data) in sample_files() {
            archive.archive_mut().add_file(name, data)?;
        }
        archive.save(&path, None)?;
        assert!(archive.archive().is_saved());

        assert_eq!(Format::detect(&path)?, format);
        let loaded = AnyArchive::load(format, &path)?;
        assert_eq!(loaded.format(), format);
        assert!(loaded.archive().is_saved());

        let mut actual = contents(loaded.archive());
        let mut wanted = expected();
        if format == Format::Pac {
            // files are grouped by type
            actual.sort();
            wanted.sort();
        }
        assert_eq!(actual, wanted);
    }

    Ok(())
}

/// Load `path` and save it again next to it, returning the bytes of both
fn resave(format: Format, path: &std::path::Path) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let resaved = path.with_extension("resaved");
    AnyArchive::load(format, path)?.save(&resaved, None)?;
    Ok((fs::read(path)?, fs::read(&resaved)?))
}

#[test]
fn saving_a_loaded_archive_is_byte_identical() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;

    let mut ar = GensArchive::new(0x40);
    let mut wii = U8Archive::new();
    let mut story = StorybookArchive::new();
    let mut one = OneArchive::new(OneMagic::Shadow060);
    for (name, data) in sample_files() {
        ar.add_file(name, data.clone())?;
        wii.add_file(format!("stage/{name}").as_str(), data.clone())?;
        story.add_file(name, data.clone())?;
        one.add_file(name, data)?;
    }

    let path = directory.path().join("stage.ar");
    ar.save(&path, &GensWriteOptions::default())?;
    let (original, resaved) = resave(Format::Gens, &path)?;
    assert_eq!(resaved, original);

    for compression in [CompressionMethod::None, CompressionMethod::Zlib] {
        let path = directory.path().join("stage.arc");
        let options = U8WriteOptions::builder().compression(compression).build();
        wii.save(&path, &options)?;
        let (original, resaved) = resave(Format::U8, &path)?;
        assert_eq!(resaved, original);
    }

    let path = directory.path().join("story.one");
    story.save(&path)?;
    let (original, resaved) = resave(Format::Storybook, &path)?;
    assert_eq!(resaved, original);

    let path = directory.path().join("shadow.one");
    one.save(&path)?;
    let (original, resaved) = resave(Format::One, &path)?;
    assert_eq!(resaved, original);
    Ok(())
}

#[test]
fn pac_is_stable_after_the_first_save() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("stage.pac");

    let mut archive = AnyArchive::new(Format::Pac);
    for (name, data) in sample_files() {
        archive.archive_mut().add_file(name, data)?;
    }
    archive.save(&path, None)?;

    // files are grouped by type on the first save, after that the layout stays put
    let (first, second) = resave(Format::Pac, &path)?;
    assert_eq!(second, first);
    Ok(())
}

#[test]
fn removed_file_stays_removed() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("a.ar");

    let mut archive = GensArchive::default();
    archive.add_file("a.txt", b"hi".to_vec())?;
    archive.add_file("b.txt", b"bye".to_vec())?;
    archive.save(&path, &GensWriteOptions::default())?;

    let mut archive = GensArchive::load(&path)?;
    assert!(archive.remove("a.txt").is_some());
    assert!(!archive.is_saved());
    archive.save(&path, &GensWriteOptions::default())?;

    let archive = GensArchive::load(&path)?;
    assert_eq!(
        archive.entries(),
        &[ArchiveEntry::File(ArchiveFile::new("b.txt", b"bye".to_vec()))]
    );
    Ok(())
}

#[test]
fn directories_survive_only_in_u8() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;

    let mut wii = U8Archive::new();
    wii.add_file("stage/ghz/sky.dds", b"sky".to_vec())?;
    wii.add_file("stage/ghz/set.bin", b"set".to_vec())?;
    let path = directory.path().join("stage.arc");
    wii.save(&path, &U8WriteOptions::default())?;

    let loaded = U8Archive::load(&path)?;
    assert_eq!(loaded.file("stage/ghz/set.bin")?.data(), b"set");

    let mut ar = GensArchive::from_archive(loaded.into_archive(), 0x10);
    let path = directory.path().join("stage.ar");
    ar.save(&path, &GensWriteOptions::default())?;

    let names: Vec<_> = GensArchive::load(&path)?
        .files(true)
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(names, ["sky.dds", "set.bin"]);
    Ok(())
}

#[test]
fn format_settings_are_kept() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;

    let mut pac = PacArchive::new(Endian::Big);
    pac.add_file("a.txt", b"a".to_vec())?;
    let path = directory.path().join("a.pac");
    let options = PacWriteOptions::builder()
        .endian(Endian::Big)
        .uid(0x1234)
        .build();
    pac.save(&path, &options)?;

    let loaded = PacArchive::load(&path)?;
    assert_eq!(loaded.endian(), Endian::Big);
    assert_eq!(loaded.uid(), 0x1234);

    let mut one = OneArchive::new(OneMagic::Shadow050);
    one.add_file("a.bin", b"a".to_vec())?;
    let path = directory.path().join("a.one");
    one.save(&path)?;
    assert_eq!(OneArchive::load(&path)?.magic(), OneMagic::Shadow050);

    let mut story = StorybookArchive::new();
    story.add_file("a.bin", b"a".to_vec())?;
    let path = directory.path().join("b.one");
    story.save(&path)?;
    assert_eq!(Format::detect(&path)?, Format::Storybook);

    let bytes = fs::read(&path)?;
    assert_eq!(&bytes[..4], &[0, 0, 0, 1]);
    Ok(())
}

#[test]
fn extracted_tree_matches_archive() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let output = directory.path().join("out");

    let mut archive = U8Archive::new();
    archive.add_file("a/b/c.txt", b"c".to_vec())?;
    archive.add_file("d.txt", b"d".to_vec())?;
    archive.extract(&output)?;

    assert_eq!(fs::read(output.join("a/b/c.txt"))?, b"c");
    assert_eq!(fs::read(output.join("d.txt"))?, b"d");

    let mut packed = U8Archive::new();
    packed.add_directory(&output, true)?;
    packed.sort();
    archive.sort();
    assert_eq!(packed.entries(), archive.entries());
    Ok(())
}
