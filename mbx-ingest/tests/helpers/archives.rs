//! Archive and container builders

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Cursor, Write};
use tar::{EntryType, Header};

/// Plain tar archive holding `entries` as regular files
pub fn tar_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Tar archive with one entry whose name bypasses the builder's path checks
pub fn tar_with_raw_name(name: &[u8], data: &[u8]) -> Vec<u8> {
    let mut header = Header::new_old();
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(EntryType::Regular);
    header.set_cksum();
    let mut builder = tar::Builder::new(Vec::new());
    builder.append(&header, data).unwrap();
    builder.into_inner().unwrap()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Unencrypted, compressed Android backup container around `tar_bytes`
pub fn android_backup(tar_bytes: &[u8]) -> Vec<u8> {
    let mut container = b"ANDROID BACKUP\n5\n1\nnone\n".to_vec();
    container.extend(zlib(tar_bytes));
    container
}

/// Installer package whose manifest is plain-text XML
pub fn apk_with_manifest(manifest: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("AndroidManifest.xml", options).unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    writer.start_file("classes.dex", options).unwrap();
    writer.write_all(b"dex\n035\0").unwrap();
    writer.finish().unwrap().into_inner()
}
