use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use ageha_codec::encode_utf16le_padded;
use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::read::parse_index;
use crate::types::{
    S4_ARCHIVE_NAME_SIZE, S4_FILE_ENTRY_SIZE, S5_ARCHIVE_NAME_SIZE, S5_FILE_ENTRY_SIZE,
};
use crate::{ArchiveError, FileEntry, IndexHeader, Version};

/// Rebuilds every container referenced by an index from a directory tree
/// mirroring it: `input_dir/<container-stem>/<entry-name>` replaces an
/// entry's payload when present, otherwise the payload is copied verbatim
/// from the original container. Writes the new containers and index into
/// `output_dir`.
pub fn repack(index_path: &Path, input_dir: &Path, output_dir: &Path) -> Result<()> {
    let data = std::fs::read(index_path)
        .with_context(|| format!("failed to read index {}", index_path.display()))?;
    let (header, names, entries) = parse_index(&data)?;
    if !header.is_compressed() {
        bail!(ArchiveError::NotSupported(
            "repacking an uncompressed index".to_string()
        ));
    }

    let base_dir = index_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut new_entries: Vec<FileEntry> = Vec::with_capacity(entries.len());
    for (arc_index, name) in names.iter().enumerate() {
        let mut group: Vec<&FileEntry> = entries
            .iter()
            .filter(|e| e.archive_index as usize == arc_index)
            .collect();
        group.sort_by_key(|e| e.file_index);
        if group.is_empty() {
            continue;
        }

        let out_path = output_dir.join(name);
        let mut out = File::create(&out_path)
            .with_context(|| format!("failed to create container {}", out_path.display()))?;
        let orig_path = base_dir.join(name);
        let mut original = File::open(&orig_path).with_context(|| {
            format!("failed to open original container {}", orig_path.display())
        })?;
        let replace_dir = input_dir.join(stem(name));

        let mut offset = 0u32;
        for entry in group {
            let replacement = replace_dir.join(&entry.name);
            let payload = if replacement.is_file() {
                debug!(file = %replacement.display(), "using replacement");
                std::fs::read(&replacement)
                    .with_context(|| format!("failed to read {}", replacement.display()))?
            } else {
                original.seek(SeekFrom::Start(entry.offset as u64))?;
                let mut payload = vec![0u8; entry.length as usize];
                original
                    .read_exact(&mut payload)
                    .with_context(|| format!("failed to copy '{}' from {}", entry.name, name))?;
                payload
            };

            out.write_all(&payload)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            new_entries.push(FileEntry {
                name: entry.name.clone(),
                archive_index: entry.archive_index,
                file_index: entry.file_index,
                offset,
                length: payload.len() as u32,
            });
            offset += payload.len() as u32;
        }
        info!(container = %out_path.display(), "rebuilt container");
    }

    new_entries.sort_by_key(|e| (e.archive_index, e.file_index));

    let metadata = build_metadata(header.version, &names, &new_entries);
    let index_bytes = write_index_bytes(&header, &metadata);
    let index_name = index_path
        .file_name()
        .context("index path has no file name")?;
    let out_index = output_dir.join(index_name);
    std::fs::write(&out_index, index_bytes)
        .with_context(|| format!("failed to write {}", out_index.display()))?;
    info!(index = %out_index.display(), entries = new_entries.len(), "rebuilt index");
    Ok(())
}

/// Appends one new container to an S5-compressed index: every file under
/// `input_dir` (walked in sorted order) lands in a fresh `DATA*.ALF` next to
/// `output_path`, and the rewritten index lists it after the existing
/// containers.
pub fn add_archive(
    index_path: &Path,
    archive_name: &str,
    input_dir: &Path,
    output_path: &Path,
) -> Result<()> {
    let data = std::fs::read(index_path)
        .with_context(|| format!("failed to read index {}", index_path.display()))?;
    let (header, mut names, mut entries) = parse_index(&data)?;
    if header.version != Version::S5 || !header.is_compressed() {
        bail!(ArchiveError::NotSupported(
            "add-archive needs an S5 compressed index".to_string()
        ));
    }

    let files = collect_files(input_dir)?;
    if files.is_empty() {
        bail!("no files found in {}", input_dir.display());
    }

    let out_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let container_path = out_dir.join(archive_name);
    let mut container = File::create(&container_path)
        .with_context(|| format!("failed to create {}", container_path.display()))?;

    let new_archive_index = names.len() as u32;
    let mut offset = 0u32;
    for (file_index, name) in files.iter().enumerate() {
        let payload = std::fs::read(input_dir.join(name))
            .with_context(|| format!("failed to read {}", name))?;
        container
            .write_all(&payload)
            .with_context(|| format!("failed to write {}", container_path.display()))?;
        entries.push(FileEntry {
            name: name.clone(),
            archive_index: new_archive_index,
            file_index: file_index as u32,
            offset,
            length: payload.len() as u32,
        });
        debug!(file = %name, offset, "added");
        offset += payload.len() as u32;
    }
    names.push(archive_name.to_string());

    let metadata = build_metadata(header.version, &names, &entries);
    let index_bytes = write_index_bytes(&header, &metadata);
    std::fs::write(output_path, index_bytes)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    info!(
        container = %container_path.display(),
        files = files.len(),
        "appended archive"
    );
    Ok(())
}

/// Walks a directory and returns file paths relative to it, in sorted order.
fn collect_files(dir: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .expect("walkdir yields paths under its root");
        files.push(relative.to_string_lossy().into_owned());
    }
    Ok(files)
}

/// Serializes the metadata section: container count and names, then entry
/// count and entries, with the fixed field widths of the version.
pub(crate) fn build_metadata(version: Version, names: &[String], entries: &[FileEntry]) -> Vec<u8> {
    let (name_size, entry_size) = match version {
        Version::S4 => (S4_ARCHIVE_NAME_SIZE, S4_FILE_ENTRY_SIZE),
        Version::S5 => (S5_ARCHIVE_NAME_SIZE, S5_FILE_ENTRY_SIZE),
    };
    let mut buf =
        Vec::with_capacity(8 + names.len() * name_size + entries.len() * entry_size);

    buf.extend_from_slice(&(names.len() as u32).to_le_bytes());
    for name in names {
        match version {
            Version::S4 => buf.extend_from_slice(&encode_utf8_padded(name, name_size)),
            Version::S5 => buf.extend_from_slice(&encode_utf16le_padded(name, name_size)),
        }
    }

    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        match version {
            Version::S4 => buf.extend_from_slice(&encode_utf8_padded(&entry.name, 0x40)),
            Version::S5 => buf.extend_from_slice(&encode_utf16le_padded(&entry.name, 0x80)),
        }
        buf.extend_from_slice(&entry.archive_index.to_le_bytes());
        buf.extend_from_slice(&entry.file_index.to_le_bytes());
        buf.extend_from_slice(&entry.offset.to_le_bytes());
        buf.extend_from_slice(&entry.length.to_le_bytes());
    }

    buf
}

/// Emits a complete index file: the original fixed header bytes up to the
/// descriptor, the descriptor `(len, len, compressed_len)`, then the
/// compressed metadata.
pub(crate) fn write_index_bytes(header: &IndexHeader, metadata: &[u8]) -> Vec<u8> {
    let compressed = ageha_codec::compress(metadata);
    let descriptor_offset = header.metadata_offset();

    let mut out = Vec::with_capacity(descriptor_offset + 12 + compressed.len());
    out.extend_from_slice(&header.raw[..descriptor_offset]);
    out.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
    out.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    out.extend_from_slice(&compressed);
    out
}

fn encode_utf8_padded(text: &str, size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    let bytes = text.as_bytes();
    let len = bytes.len().min(size);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}
