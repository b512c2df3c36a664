use hedge_archive::{
    error::Error, split::split_archives, AnyArchive, Format, GensArchive, GensWriteOptions,
    PacArchive, PacWriteOptions,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tracing_test::traced_test;

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn discovery_stops_at_first_gap() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    for index in [0, 1, 2, 3, 4, 6] {
        fs::write(directory.path().join(format!("base.{index:03}")), b"")?;
    }

    let parts = split_archives(directory.path().join("base"), 3);
    assert_eq!(
        file_names(&parts),
        ["base.000", "base.001", "base.002", "base.003", "base.004"]
    );

    assert!(split_archives(directory.path().join("missing"), 3).is_empty());
    Ok(())
}

#[traced_test]
#[test]
fn ar_split_chain_loads_from_any_member() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("ghz200.ar");

    let mut archive = GensArchive::new(0x10);
    archive.add_file("a.bin", vec![0xA; 0x10])?;
    archive.add_file("b.bin", vec![0xB; 0x10])?;
    archive.add_file("c.bin", vec![0xC; 0x100])?;

    let options = GensWriteOptions::builder()
        .padding(0x10)
        .split_size(0x40)
        .build();
    archive.save(&path, &options)?;
    assert!(!path.exists());

    let list = directory.path().join("ghz200.arl");
    assert!(list.is_file());
    assert_eq!(
        file_names(&GensArchive::split_archives(&list)),
        ["ghz200.ar.00", "ghz200.ar.01", "ghz200.ar.02"]
    );

    let listed = GensArchive::read_list(fs::File::open(&list)?)?;
    assert_eq!(listed.file_names, ["a.bin", "b.bin", "c.bin"]);
    let sizes: Vec<u64> = GensArchive::split_archives(&list)
        .iter()
        .map(|p| fs::metadata(p).map(|m| m.len()))
        .collect::<std::io::Result<_>>()?;
    let listed_sizes: Vec<u64> = listed.part_sizes.iter().map(|&s| u64::from(s)).collect();
    assert_eq!(listed_sizes, sizes);

    for member in ["ghz200.arl", "ghz200.ar.00", "ghz200.ar.02"] {
        let loaded = GensArchive::load(directory.path().join(member))?;
        assert_eq!(loaded.entries(), archive.entries());
    }
    assert!(logs_contain("found 3 split parts"));
    Ok(())
}

#[test]
fn ar_list_must_match_parts() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("ghz200.ar");

    let mut archive = GensArchive::new(0x10);
    archive.add_file("a.bin", vec![0xA; 0x30])?;
    archive.add_file("b.bin", vec![0xB; 0x30])?;
    let options = GensWriteOptions::builder()
        .padding(0x10)
        .split_size(0x40)
        .build();
    archive.save(&path, &options)?;

    fs::remove_file(directory.path().join("ghz200.ar.01"))?;
    assert!(matches!(
        GensArchive::load(directory.path().join("ghz200.arl")),
        Err(Error::Integrity(_))
    ));
    Ok(())
}

#[traced_test]
#[test]
fn pac_root_loads_its_parts() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("w1r03.pac");

    let mut archive = PacArchive::default();
    archive.add_file("chr_sonic.model", b"model".to_vec())?;
    archive.add_file("tex1.dds", vec![1; 0x20])?;
    archive.add_file("tex2.dds", vec![2; 0x20])?;

    let options = PacWriteOptions::builder()
        .uid(0xBEEF)
        .split_size(0x20)
        .build();
    archive.save(&path, &options)?;
    assert!(logs_contain("keeping chr_sonic.model in the root archive"));
    assert_eq!(archive.split_names(), ["w1r03.pac.000", "w1r03.pac.001"]);

    assert_eq!(
        file_names(&PacArchive::split_archives(&path)),
        ["w1r03.pac", "w1r03.pac.000", "w1r03.pac.001"]
    );

    let root = PacArchive::load(&path)?;
    assert_eq!(root.uid(), 0xBEEF);
    let mut names: Vec<_> = root.files(true).into_iter().map(|f| f.path).collect();
    names.sort();
    assert_eq!(names, ["chr_sonic.model", "tex1.dds", "tex2.dds"]);

    let part = PacArchive::load(directory.path().join("w1r03.pac.001"))?;
    assert!(part.split_names().is_empty());
    assert_eq!(part.file("tex2.dds")?.data(), &[2; 0x20]);
    assert_eq!(part.len(), 1);
    Ok(())
}

#[test]
fn pac_parts_must_sit_beside_the_root() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("w1r03.pac");

    let mut archive = PacArchive::default();
    archive.add_file("tex1.dds", vec![1; 0x20])?;
    archive.add_file("tex2.dds", vec![2; 0x20])?;
    let options = PacWriteOptions::builder()
        .uid(0xBEEF)
        .split_size(0x20)
        .build();
    archive.save(&path, &options)?;

    let root = fs::read(&path)?;
    let name = b"w1r03.pac.000";
    for replacement in [b"../03.pac.000", b"/w1r03.pac.00", b"w1r03/pac.000"] {
        let mut patched = root.clone();
        let start = patched
            .windows(name.len())
            .position(|w| w == name)
            .ok_or_else(|| Error::CustomError("part name not found".to_owned()))?;
        patched[start..start + name.len()].copy_from_slice(replacement);
        fs::write(&path, &patched)?;

        assert!(matches!(PacArchive::load(&path), Err(Error::Integrity(_))));
    }
    Ok(())
}

#[test]
fn any_archive_lists_splits_per_format() -> Result<(), Error> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("stage.pac");

    let mut archive = AnyArchive::new(Format::Pac);
    archive.archive_mut().add_file("a.dds", vec![0; 0x30])?;
    archive.archive_mut().add_file("b.dds", vec![0; 0x30])?;
    archive.save(&path, Some(0x30))?;

    assert_eq!(AnyArchive::split_archives(Format::Pac, &path).len(), 3);
    assert_eq!(
        AnyArchive::split_archives(Format::U8, directory.path().join("none.arc")),
        Vec::<PathBuf>::new()
    );
    Ok(())
}
