use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use ageha_codec::read_utf16le_field;
use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::types::{
    S4_ARCHIVE_NAME_SIZE, S4_FILE_ENTRY_SIZE, S5_ARCHIVE_NAME_SIZE, S5_FILE_ENTRY_SIZE,
};
use crate::{Archive, ArchiveError, ArchiveSource, FileEntry, IndexHeader, Version};

/// Parses an index file into its header, container names, and file entries
/// without touching the containers themselves.
pub fn parse_index(data: &[u8]) -> Result<(IndexHeader, Vec<String>, Vec<FileEntry>)> {
    let header = IndexHeader::parse(data).context("failed to read index header")?;

    if header.version == Version::S4 && !header.is_compressed() {
        bail!(ArchiveError::NotSupported(
            "uncompressed S4 index".to_string()
        ));
    }

    if header.version == Version::S5 && !header.is_compressed() {
        let (names, entries) = parse_inline_s5(data, &header)?;
        return Ok((header, names, entries));
    }

    let metadata = read_metadata_block(data, &header)?;
    let (names, entries) = parse_metadata(&metadata, header.version)?;
    Ok((header, names, entries))
}

/// Reads the 12-byte compression descriptor and returns the metadata block,
/// LZSS-decompressing when the stored length differs from the original.
fn read_metadata_block(data: &[u8], header: &IndexHeader) -> Result<Vec<u8>> {
    let offset = header.metadata_offset();
    if offset + 12 > data.len() {
        bail!(ArchiveError::UnexpectedEof { offset });
    }
    let original = LittleEndian::read_u32(&data[offset..]) as usize;
    let stored = LittleEndian::read_u32(&data[offset + 8..]) as usize;

    let start = offset + 12;
    let end = start + stored;
    if end > data.len() {
        bail!(ArchiveError::UnexpectedEof { offset: data.len() });
    }

    if stored == original {
        return Ok(data[start..end].to_vec());
    }
    let metadata = ageha_codec::decompress(&data[start..end]);
    if metadata.len() != original {
        bail!(
            "metadata decompressed to {} bytes, descriptor says {}",
            metadata.len(),
            original
        );
    }
    Ok(metadata)
}

fn parse_metadata(metadata: &[u8], version: Version) -> Result<(Vec<String>, Vec<FileEntry>)> {
    let (name_size, entry_size) = match version {
        Version::S4 => (S4_ARCHIVE_NAME_SIZE, S4_FILE_ENTRY_SIZE),
        Version::S5 => (S5_ARCHIVE_NAME_SIZE, S5_FILE_ENTRY_SIZE),
    };

    let mut pos = 0usize;
    let arc_count = read_u32(metadata, &mut pos)?;

    let mut names = Vec::with_capacity(arc_count as usize);
    for _ in 0..arc_count {
        if pos + name_size > metadata.len() {
            bail!(ArchiveError::UnexpectedEof { offset: pos });
        }
        names.push(match version {
            Version::S4 => read_utf8_field(&metadata[pos..pos + name_size]),
            Version::S5 => read_utf16le_field(metadata, pos, name_size),
        });
        pos += name_size;
    }

    let entry_count = read_u32(metadata, &mut pos)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for i in 0..entry_count {
        if pos + entry_size > metadata.len() {
            bail!(ArchiveError::UnexpectedEof { offset: pos });
        }
        let entry = match version {
            Version::S4 => FileEntry {
                name: read_utf8_field(&metadata[pos..pos + 0x40]),
                archive_index: LittleEndian::read_u32(&metadata[pos + 0x40..]),
                file_index: LittleEndian::read_u32(&metadata[pos + 0x44..]),
                offset: LittleEndian::read_u32(&metadata[pos + 0x48..]),
                length: LittleEndian::read_u32(&metadata[pos + 0x4C..]),
            },
            Version::S5 => FileEntry {
                name: read_utf16le_field(metadata, pos, 0x80),
                archive_index: LittleEndian::read_u32(&metadata[pos + 0x80..]),
                file_index: LittleEndian::read_u32(&metadata[pos + 0x84..]),
                offset: LittleEndian::read_u32(&metadata[pos + 0x88..]),
                length: LittleEndian::read_u32(&metadata[pos + 0x8C..]),
            },
        };
        if entry.archive_index >= arc_count {
            bail!(
                "entry {} ('{}') references archive {} of {}",
                i,
                entry.name,
                entry.archive_index,
                arc_count
            );
        }
        entries.push(entry);
        pos += entry_size;
    }

    Ok((names, entries))
}

/// S5IN indices carry their metadata uncompressed at 0x200: a single
/// container name, then entries without archive/file index fields.
fn parse_inline_s5(data: &[u8], header: &IndexHeader) -> Result<(Vec<String>, Vec<FileEntry>)> {
    let mut pos = header.metadata_offset();
    if pos + 0x200 > data.len() {
        bail!(ArchiveError::UnexpectedEof { offset: pos });
    }
    let name = read_utf16le_field(data, pos, 0x200);
    pos += 0x200;

    let entry_count = read_u32(data, &mut pos)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for i in 0..entry_count {
        if pos + S5_FILE_ENTRY_SIZE > data.len() {
            bail!(ArchiveError::UnexpectedEof { offset: pos });
        }
        entries.push(FileEntry {
            name: read_utf16le_field(data, pos, 0x88),
            archive_index: 0,
            file_index: i,
            offset: LittleEndian::read_u32(&data[pos + 0x88..]),
            length: LittleEndian::read_u32(&data[pos + 0x8C..]),
        });
        pos += S5_FILE_ENTRY_SIZE;
    }

    Ok((vec![name], entries))
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32> {
    if *pos + 4 > data.len() {
        bail!(ArchiveError::UnexpectedEof { offset: *pos });
    }
    let value = LittleEndian::read_u32(&data[*pos..]);
    *pos += 4;
    Ok(value)
}

fn read_utf8_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[derive(Debug, Default, Clone)]
pub struct ExtractOptions {
    pub output_dir: PathBuf,
    /// Case-insensitive substring match on entry names.
    pub filter: Option<String>,
}

impl Archive {
    /// Loads an index file and eagerly opens a handle on every referenced
    /// container. A missing container is tolerated: its entries simply fail
    /// to read.
    pub fn open(index_path: &Path) -> Result<Archive> {
        let data = std::fs::read(index_path)
            .with_context(|| format!("failed to read index {}", index_path.display()))?;
        let (header, names, entries) = parse_index(&data)?;

        let base_dir = index_path.parent().unwrap_or_else(|| Path::new("."));
        let mut sources = Vec::with_capacity(names.len());
        for name in names {
            let path = base_dir.join(&name);
            let handle = match File::open(&path) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!(container = %path.display(), %err, "container not available");
                    None
                }
            };
            sources.push(ArchiveSource { name, path, handle });
        }

        debug!(
            containers = sources.len(),
            entries = entries.len(),
            "opened archive index"
        );
        Ok(Archive {
            header,
            sources,
            entries,
            index_path: index_path.to_path_buf(),
        })
    }

    /// Reads one entry's payload from its container.
    pub fn read(&self, entry: &FileEntry) -> Result<Vec<u8>> {
        let source = self
            .sources
            .get(entry.archive_index as usize)
            .with_context(|| format!("archive index {} out of range", entry.archive_index))?;
        let handle = source
            .handle
            .as_ref()
            .with_context(|| format!("container {} is not open", source.name))?;
        read_payload(handle, entry, &source.name)
    }

    /// Extracts entries into `output_dir/<container-stem>/<entry-name>`, one
    /// worker per container. Workers hold their own read cursors; the first
    /// error is reported after every worker has finished its in-flight work.
    pub fn extract(&self, opts: &ExtractOptions) -> Result<()> {
        let mut groups: BTreeMap<u32, Vec<&FileEntry>> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(filter) = &opts.filter {
                if !entry
                    .name
                    .to_lowercase()
                    .contains(&filter.to_lowercase())
                {
                    continue;
                }
            }
            groups.entry(entry.archive_index).or_default().push(entry);
        }

        std::thread::scope(|scope| {
            let mut workers = Vec::new();
            for (arc_index, entries) in &groups {
                workers.push(scope.spawn(move || {
                    self.extract_from_container(*arc_index, entries, &opts.output_dir)
                }));
            }
            let mut first_error = None;
            for worker in workers {
                match worker.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        first_error.get_or_insert(err);
                    }
                    Err(_) => {
                        first_error.get_or_insert(anyhow::anyhow!("extraction worker panicked"));
                    }
                }
            }
            match first_error {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn extract_from_container(
        &self,
        arc_index: u32,
        entries: &[&FileEntry],
        output_dir: &Path,
    ) -> Result<()> {
        let source = self
            .sources
            .get(arc_index as usize)
            .with_context(|| format!("archive index {} out of range", arc_index))?;
        // Workers never share a cursor with the archive's own handle.
        let handle = File::open(&source.path)
            .with_context(|| format!("failed to open container {}", source.path.display()))?;

        let stem = source.name.rsplit_once('.').map_or(source.name.as_str(), |(stem, _)| stem);
        let out_dir = output_dir.join(stem);
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;

        for &entry in entries {
            let data = read_payload(&handle, entry, &source.name)?;
            let out_path = out_dir.join(&entry.name);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(&out_path, data)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            debug!(file = %out_path.display(), "extracted");
        }
        Ok(())
    }
}

fn read_payload(handle: &File, entry: &FileEntry, container: &str) -> Result<Vec<u8>> {
    let size = handle
        .metadata()
        .with_context(|| format!("failed to stat container {}", container))?
        .len();
    let end = entry.offset as u64 + entry.length as u64;
    if end > size {
        bail!(
            "entry '{}' spans 0x{:X}..0x{:X} but container {} is only 0x{:X} bytes",
            entry.name,
            entry.offset,
            end,
            container,
            size
        );
    }

    let mut reader = handle;
    reader
        .seek(SeekFrom::Start(entry.offset as u64))
        .with_context(|| format!("failed to seek container {}", container))?;
    let mut data = vec![0u8; entry.length as usize];
    reader
        .read_exact(&mut data)
        .with_context(|| format!("failed to read '{}' from {}", entry.name, container))?;
    Ok(data)
}
