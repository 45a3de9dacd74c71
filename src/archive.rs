//! The multi-file container: trailer layout, offset bookkeeping, and the
//! `bundle`/`unbundle` entry points.
//!
//! Grounded on the original archiver's `archive_compress`/`archive_decompress`:
//! each member is written as `[serialised tree][payload]` at a pre-computed
//! offset, members are laid out back-to-back, and a trailer recording every
//! member's name, original size, and compressed size is appended last so the
//! unbundler can find it by reading the final 8 bytes of the file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;

use log::{debug, info, warn};

use crate::bits::{BitStreamReader, BitStreamWriter};
use crate::filecodec::{self, MemberStats};
use crate::huffman::Tree;
use crate::Error;

/// One member's bookkeeping: its basename, sizes, and its byte offset into
/// the archive's blob region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub offset: u64,
}

/// Encodes the trailer: `file_count`, then per-entry `name_length`/`name`/
/// `size`/`compressed_size`, then `trailer_length` including itself.
fn encode_trailer(entries: &[MemberEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(entries.len() as u64).to_be_bytes());
    for entry in entries {
        let name_bytes = entry.name.as_bytes();
        out.extend_from_slice(&(name_bytes.len() as u64).to_be_bytes());
        out.extend_from_slice(name_bytes);
        out.extend_from_slice(&entry.size.to_be_bytes());
        out.extend_from_slice(&entry.compressed_size.to_be_bytes());
    }
    let trailer_length = out.len() as u64 + 8;
    out.extend_from_slice(&trailer_length.to_be_bytes());
    out
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let end = pos.checked_add(8).ok_or(Error::TrailerFormatMismatch)?;
    let slice = bytes.get(*pos..end).ok_or(Error::TrailerFormatMismatch)?;
    *pos = end;
    Ok(u64::from_be_bytes(slice.try_into().expect("slice is exactly 8 bytes")))
}

/// Decodes a trailer and recomputes each member's offset by running a
/// prefix sum over `compressed_size` (offset[0] = 0).
///
/// `blob_region_len` is the number of archive bytes preceding the trailer
/// (`file_len - trailer_length`). The recomputed offsets must tile that
/// region exactly — any overflow or short/long fit means the trailer and
/// the file disagree about a member's `compressed_size`, which is a format
/// error rather than something to read past.
fn decode_trailer(bytes: &[u8], blob_region_len: u64) -> Result<Vec<MemberEntry>, Error> {
    let mut pos = 0usize;
    let file_count = read_u64(bytes, &mut pos)?;
    // `file_count` is untrusted input read before any bound is established;
    // don't let a corrupt value drive an unbounded up-front allocation.
    let mut entries = Vec::new();
    for _ in 0..file_count {
        let name_length = read_u64(bytes, &mut pos)?;
        let end = pos.checked_add(name_length as usize).ok_or(Error::TrailerFormatMismatch)?;
        let name_bytes = bytes.get(pos..end).ok_or(Error::TrailerFormatMismatch)?;
        let name = std::str::from_utf8(name_bytes).map_err(|_| Error::BadMemberName)?.to_string();
        pos = end;
        let size = read_u64(bytes, &mut pos)?;
        let compressed_size = read_u64(bytes, &mut pos)?;
        entries.push(MemberEntry { name, size, compressed_size, offset: 0 });
    }

    let mut offset = 0u64;
    for entry in &mut entries {
        entry.offset = offset;
        offset = offset.checked_add(entry.compressed_size).ok_or(Error::TrailerFormatMismatch)?;
    }
    if offset != blob_region_len {
        return Err(Error::TrailerFormatMismatch);
    }
    Ok(entries)
}

fn member_name(path: &Path) -> Result<String, Error> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::NoFileName(path.display().to_string()))
}

/// Compresses `inputs` into a fresh archive at `archive_path`, returning the
/// sizes recorded for each member.
///
/// Pass 1 (frequency counting and tree building) runs for every member
/// before any Pass-2 emission begins, since offsets depend on every
/// member's `compressed_size`. Both passes fan out one thread per member;
/// each Pass-2 worker opens its own read handle on its input and its own
/// write handle on the archive, seeking to its pre-computed offset before
/// writing, so no cursor state is shared between threads.
pub fn bundle(archive_path: &Path, inputs: &[PathBuf]) -> Result<Vec<MemberEntry>, Error> {
    info!("bundling {} file(s) into {}", inputs.len(), archive_path.display());

    let names = inputs.iter().map(|p| member_name(p)).collect::<Result<Vec<_>, _>>()?;

    let built: Vec<(MemberStats, Tree)> = thread::scope(|scope| -> Result<Vec<_>, Error> {
        let handles: Vec<_> = inputs
            .iter()
            .map(|path| {
                scope.spawn(move || -> Result<(MemberStats, Tree), Error> {
                    let mut input = File::open(path)?;
                    let (freq, size) = filecodec::count_frequencies(&mut input)?;
                    let tree = Tree::build(&freq);
                    let compressed_size = filecodec::compressed_size_bytes(&tree);
                    Ok((MemberStats { size, compressed_size }, tree))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("pass-1 worker panicked"))
            .collect()
    })?;

    let mut entries = Vec::with_capacity(inputs.len());
    let mut offset = 0u64;
    for (name, (stats, _)) in names.into_iter().zip(built.iter()) {
        entries.push(MemberEntry {
            name,
            size: stats.size,
            compressed_size: stats.compressed_size,
            offset,
        });
        offset += stats.compressed_size;
    }
    let blob_region_len = offset;
    debug!("pass 1 complete: {} member(s), {blob_region_len} blob byte(s)", entries.len());

    {
        let file = File::create(archive_path)?;
        file.set_len(blob_region_len)?;
    }

    thread::scope(|scope| -> Result<(), Error> {
        let handles: Vec<_> = inputs
            .iter()
            .zip(built.iter())
            .zip(entries.iter())
            .map(|((path, (_, tree)), entry)| {
                scope.spawn(move || -> Result<(), Error> {
                    let mut input = File::open(path)?;
                    let archive_file = OpenOptions::new().write(true).open(archive_path)?;
                    let mut writer = BitStreamWriter::at_offset(archive_file, entry.offset)?;
                    filecodec::emit_member(&mut input, tree, &mut writer)?;
                    writer.close()?;
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("pass-2 worker panicked")?;
        }
        Ok(())
    })?;

    let trailer = encode_trailer(&entries);
    let mut archive_file = OpenOptions::new().append(true).open(archive_path)?;
    archive_file.write_all(&trailer)?;

    info!(
        "bundle complete: {} member(s), archive size {}",
        entries.len(),
        blob_region_len + trailer.len() as u64
    );
    Ok(entries)
}

/// Extracts `names` (basenames as recorded in the trailer) from the archive
/// at `archive_path` into `out_dir`. An empty `names` list extracts every
/// member.
pub fn unbundle(archive_path: &Path, names: &[String], out_dir: &Path) -> Result<Vec<MemberEntry>, Error> {
    info!("unbundling {} from {}", archive_path.display(), out_dir.display());

    let mut file = File::open(archive_path)?;
    let file_len = file.seek(SeekFrom::End(0))?;
    if file_len < 8 {
        return Err(Error::TrailerFormatMismatch);
    }
    file.seek(SeekFrom::End(-8))?;
    let mut len_buf = [0u8; 8];
    file.read_exact(&mut len_buf)?;
    let trailer_length = u64::from_be_bytes(len_buf);
    if trailer_length > file_len {
        return Err(Error::TrailerFormatMismatch);
    }
    let blob_region_len = file_len - trailer_length;
    file.seek(SeekFrom::Start(blob_region_len))?;
    let mut trailer_bytes = vec![0u8; trailer_length as usize];
    file.read_exact(&mut trailer_bytes)?;
    let entries = decode_trailer(&trailer_bytes, blob_region_len)?;
    debug!("trailer parsed: {} member(s)", entries.len());

    let selected: Vec<MemberEntry> = if names.is_empty() {
        entries
    } else {
        names
            .iter()
            .map(|wanted| {
                entries
                    .iter()
                    .find(|e| &e.name == wanted)
                    .cloned()
                    .ok_or_else(|| Error::MemberNotFound(wanted.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    thread::scope(|scope| -> Result<(), Error> {
        let handles: Vec<_> = selected
            .iter()
            .map(|entry| {
                let out_path = out_dir.join(&entry.name);
                scope.spawn(move || -> Result<(), Error> {
                    let archive_file = File::open(archive_path)?;
                    let mut reader = BitStreamReader::at_offset(archive_file, entry.offset)?;
                    let mut output = File::create(out_path)?;
                    filecodec::decompress_member(&mut reader, entry.size, &mut output)?;
                    Ok(())
                })
            })
            .collect();
        for (entry, handle) in selected.iter().zip(handles) {
            if let Err(e) = handle.join().expect("unbundle worker panicked") {
                warn!(
                    "extraction of member `{}` failed, partial file left at {}: {e}",
                    entry.name,
                    out_dir.join(&entry.name).display()
                );
                return Err(e);
            }
        }
        Ok(())
    })?;

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn bundle_then_unbundle_roundtrip() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("out.bnc");

        let a_path = dir.path().join("a.txt");
        let b_path = dir.path().join("b.txt");
        fs::write(&a_path, b"the quick brown fox").unwrap();
        fs::write(&b_path, b"jumps over the lazy dog, the lazy dog sleeps").unwrap();

        let inputs = vec![a_path, b_path];
        let bundled = bundle(&archive_path, &inputs).unwrap();
        assert_eq!(bundled.len(), 2);
        assert_eq!(bundled[0].offset, 0);
        assert_eq!(bundled[1].offset, bundled[0].compressed_size);

        let extract_dir = tempdir().unwrap();
        let extracted = unbundle(&archive_path, &[], extract_dir.path()).unwrap();
        assert_eq!(extracted.len(), 2);

        assert_eq!(fs::read(extract_dir.path().join("a.txt")).unwrap(), b"the quick brown fox");
        assert_eq!(
            fs::read(extract_dir.path().join("b.txt")).unwrap(),
            b"jumps over the lazy dog, the lazy dog sleeps"
        );
    }

    #[test]
    fn unbundle_selects_only_requested_members() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("out.bnc");
        let a_path = dir.path().join("only.txt");
        fs::write(&a_path, b"alpha beta gamma").unwrap();
        bundle(&archive_path, &[a_path]).unwrap();

        let extract_dir = tempdir().unwrap();
        let extracted = unbundle(
            &archive_path,
            &["only.txt".to_string()],
            extract_dir.path(),
        )
        .unwrap();
        assert_eq!(extracted.len(), 1);
        assert!(extract_dir.path().join("only.txt").exists());
    }

    #[test]
    fn unbundle_missing_member_is_an_error() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("out.bnc");
        let a_path = dir.path().join("present.txt");
        fs::write(&a_path, b"data").unwrap();
        bundle(&archive_path, &[a_path]).unwrap();

        let extract_dir = tempdir().unwrap();
        let err = unbundle(
            &archive_path,
            &["absent.txt".to_string()],
            extract_dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MemberNotFound(name) if name == "absent.txt"));
    }

    #[test]
    fn bundle_strips_leading_path_components() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        let nested_file = nested.join("deep.txt");
        fs::write(&nested_file, b"nested contents").unwrap();

        let archive_path = dir.path().join("out.bnc");
        let entries = bundle(&archive_path, &[nested_file]).unwrap();
        assert_eq!(entries[0].name, "deep.txt");
    }

    #[test]
    fn empty_archive_roundtrips() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("out.bnc");
        let empty_path = dir.path().join("empty.txt");
        fs::write(&empty_path, b"").unwrap();
        let entries = bundle(&archive_path, &[empty_path]).unwrap();
        assert_eq!(entries[0].size, 0);

        let extract_dir = tempdir().unwrap();
        unbundle(&archive_path, &[], extract_dir.path()).unwrap();
        assert_eq!(fs::read(extract_dir.path().join("empty.txt")).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn truncated_archive_is_a_format_error() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("short.bnc");
        fs::write(&archive_path, b"\x01\x02").unwrap();
        let extract_dir = tempdir().unwrap();
        let err = unbundle(&archive_path, &[], extract_dir.path()).unwrap_err();
        assert!(matches!(err, Error::TrailerFormatMismatch));
    }

    #[test]
    fn overstated_compressed_size_is_a_format_error() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("out.bnc");
        let a_path = dir.path().join("present.txt");
        fs::write(&a_path, b"some member contents").unwrap();
        bundle(&archive_path, &[a_path]).unwrap();

        // The trailer's sole entry's `compressed_size` sits 16 bytes before
        // EOF (8 for the field itself, 8 for the trailing `trailer_length`).
        // Inflate it so the recomputed blob region no longer tiles the file.
        let mut bytes = fs::read(&archive_path).unwrap();
        let len = bytes.len();
        let field = &mut bytes[len - 16..len - 8];
        let mut compressed_size = u64::from_be_bytes(field.try_into().unwrap());
        compressed_size = compressed_size.wrapping_add(1);
        field.copy_from_slice(&compressed_size.to_be_bytes());
        fs::write(&archive_path, &bytes).unwrap();

        let extract_dir = tempdir().unwrap();
        let err = unbundle(&archive_path, &[], extract_dir.path()).unwrap_err();
        assert!(matches!(err, Error::TrailerFormatMismatch));
        assert_eq!(fs::read_dir(extract_dir.path()).unwrap().count(), 0);
    }
}
