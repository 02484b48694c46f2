use std::{fs, path::Path};

use l5_archive::{
    error::Error, Archive, ArchiveKind, ArchiveOptions, CompressionMethod, EntryStatus,
    FileHandle, VirtualDirectory,
};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tracing::info;
use tracing_test::traced_test;
use walkdir::WalkDir;

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

fn options(table_compression: CompressionMethod) -> ArchiveOptions {
    ArchiveOptions::builder()
        .table_compression(table_compression)
        .build()
}

#[traced_test]
#[test]
fn readme_and_data_folder() -> Result<(), Error> {
    let payload = random_bytes(1000, 1);

    let mut archive = Archive::new(ArchiveKind::Arc0, ArchiveOptions::default());
    let root = archive.directory_mut();
    root.add_file("readme.txt", FileHandle::from_bytes(&b"hi"[..]))?;
    root.create_folder("data")?
        .add_file("x.bin", FileHandle::from_bytes(payload.clone()))?;

    let decoded = Archive::from_bytes(archive.save_to_bytes(None)?, ArchiveOptions::default())?;
    let root = decoded.directory();

    assert_eq!(root.size(), 2 + 1000);
    assert_eq!(&*root.resolve("/data")?.files()["x.bin"].read()?, &payload[..]);
    assert_eq!(&*root.resolve("/")?.files()["readme.txt"].read()?, b"hi");

    Ok(())
}

fn populate(root: &mut VirtualDirectory) -> Result<(), Error> {
    root.insert_file("/menu/bg.img", FileHandle::from_bytes(random_bytes(333, 2)))?;
    root.insert_file("/menu/font/jp.fnt", FileHandle::from_bytes(random_bytes(70, 3)))?;
    root.insert_file("/menu/font/empty.fnt", FileHandle::from_bytes(Vec::<u8>::new()))?;
    root.insert_file("/sound/se/click.snd", FileHandle::from_bytes(random_bytes(17, 4)))?;
    root.insert_file("/テキスト/台詞.cfg.bin", FileHandle::from_bytes(random_bytes(64, 5)))?;
    root.add_file("version.txt", FileHandle::from_bytes(&b"1.0.2"[..]))?;
    Ok(())
}

fn assert_same_files(expected: &VirtualDirectory, actual: &VirtualDirectory) -> Result<(), Error> {
    let expected_files = expected.all_files();
    let actual_files = actual.all_files();
    let expected_paths: Vec<_> = expected_files.iter().map(|(p, _)| p.as_str()).collect();
    let actual_paths: Vec<_> = actual_files.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(expected_paths, actual_paths);

    for ((path, a), (_, b)) in expected_files.iter().zip(actual_files.iter()) {
        info!("comparing {path}");
        assert_eq!(a.read()?, b.read()?);
    }
    Ok(())
}

#[traced_test]
#[test]
fn every_kind_and_compression() -> Result<(), Error> {
    let mut expected = VirtualDirectory::root();
    populate(&mut expected)?;
    expected.sort_alphabetically();

    for kind in ArchiveKind::ALL {
        for compression in [CompressionMethod::None, CompressionMethod::Zlib] {
            info!("testing {} with {compression:?} tables", kind.name());

            let mut archive = Archive::from_directory(kind, expected.clone(), options(compression));
            let bytes = archive.save_to_bytes(None)?;
            let decoded = Archive::from_bytes(bytes.clone(), options(compression))?;
            assert_same_files(&expected, decoded.directory())?;

            // a second pass over a decoded archive writes the same bytes
            let mut decoded = decoded;
            assert_eq!(decoded.save_to_bytes(None)?, bytes);
        }
    }

    Ok(())
}

#[traced_test]
#[test]
fn empty_file_written_first_keeps_the_padding() -> Result<(), Error> {
    // "y.bin" sorts last by name but first by CRC-32
    let mut root = VirtualDirectory::root();
    root.add_file("y.bin", FileHandle::from_bytes(Vec::<u8>::new()))?;
    root.add_file("a.bin", FileHandle::from_bytes(random_bytes(33, 8)))?;

    for kind in ArchiveKind::ALL {
        for compression in [CompressionMethod::None, CompressionMethod::Zlib] {
            let mut archive = Archive::from_directory(kind, root.clone(), options(compression));
            let bytes = archive.save_to_bytes(None)?;
            let decoded = Archive::from_bytes(bytes.clone(), options(compression))?;

            let empty = decoded.directory().file("/y.bin")?;
            assert!(empty.offset() <= bytes.len() as u64);
            assert!(empty.read()?.is_empty());
            assert_eq!(decoded.directory().read_file("/a.bin")?.len(), 33);
        }
    }

    Ok(())
}

#[traced_test]
#[test]
fn edits_survive_a_save() -> Result<(), Error> {
    let mut archive = Archive::new(ArchiveKind::Xfsa, ArchiveOptions::default());
    populate(archive.directory_mut())?;
    let mut archive = Archive::from_bytes(archive.save_to_bytes(None)?, ArchiveOptions::default())?;

    let root = archive.directory_mut();
    root.resolve_mut("/menu")?.replace_file("bg.img", &b"new background"[..])?;
    root.resolve_mut("/menu/font")?.remove_file("empty.fnt")?;
    root.resolve_mut("/sound")?.rename_folder("se", "effects")?;
    root.remove_folder("テキスト")?;
    assert_eq!(root.resolve("/menu")?.files()["bg.img"].status(), EntryStatus::Replaced);

    let decoded = Archive::from_bytes(archive.save_to_bytes(None)?, ArchiveOptions::default())?;
    let root = decoded.directory();

    assert_eq!(&*root.read_file("/menu/bg.img")?, b"new background");
    assert!(!root.exists("/menu/font/empty.fnt"));
    assert_eq!(root.read_file("/sound/effects/click.snd")?.len(), 17);
    assert!(root.resolve("/テキスト").is_err());
    assert_eq!(root.resolve("/menu")?.files()["bg.img"].status(), EntryStatus::Original);

    Ok(())
}

fn write_tree(base: &Path) -> Result<(), Error> {
    fs::create_dir_all(base.join("data/sub"))?;
    fs::write(base.join("readme.txt"), b"hi")?;
    fs::write(base.join("data/x.bin"), random_bytes(1000, 6))?;
    fs::write(base.join("data/sub/y.bin"), random_bytes(5, 7))?;
    Ok(())
}

#[traced_test]
#[test]
fn save_in_place_replaces_the_source() -> Result<(), Error> {
    let workdir = tempfile::tempdir()?;
    let input = workdir.path().join("input");
    write_tree(&input)?;

    let mut archive = Archive::new(ArchiveKind::Arc0, ArchiveOptions::default());
    for entry in WalkDir::new(&input).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(&input)
            .map_err(|e| Error::CustomError(e.to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        archive
            .directory_mut()
            .insert_file(&relative, FileHandle::from_bytes(fs::read(entry.path())?))?;
    }

    let path = workdir.path().join("game.fa");
    archive.save(&path, None)?;

    let mut archive = Archive::open_path(&path, ArchiveOptions::default())?;
    archive
        .directory_mut()
        .insert_file("/data/sub/z.bin", FileHandle::from_bytes(&b"zz"[..]))?;
    let mut progress = Vec::new();
    archive.save(&path, Some(&mut |p: u8| progress.push(p)))?;

    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] < w[1]));

    let reopened = Archive::open_path(&path, ArchiveOptions::default())?;
    for entry in WalkDir::new(&input).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(&input).unwrap_or(entry.path());
        let expected = fs::read(entry.path())?;
        let actual = reopened
            .directory()
            .read_file(&relative.to_string_lossy().replace('\\', "/"))?;
        assert_eq!(&*actual, &expected[..]);
    }
    assert_eq!(&*reopened.directory().read_file("/data/sub/z.bin")?, b"zz");

    Ok(())
}

#[test]
fn failed_save_keeps_the_existing_file() -> Result<(), Error> {
    let workdir = tempfile::tempdir()?;
    let path = workdir.path().join("face.xc");

    let mut archive = Archive::new(ArchiveKind::Xpck, ArchiveOptions::default());
    archive
        .directory_mut()
        .add_file("a.bin", FileHandle::from_bytes(&b"abc"[..]))?;
    archive.save(&path, None)?;
    let before = fs::read(&path)?;

    // XPCK sizes are limited to 24 bits
    archive
        .directory_mut()
        .add_file("huge.bin", FileHandle::from_bytes(vec![0u8; 0x100_0000]))?;
    assert!(matches!(
        archive.save(&path, None),
        Err(Error::UnrepresentableValue { .. })
    ));
    assert_eq!(fs::read(&path)?, before);

    Ok(())
}
