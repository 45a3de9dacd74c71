//! Two-pass per-file codec: counts byte frequencies, builds a tree, then
//! emits the tree followed by the coded payload; decoding walks the tree
//! once per symbol until the recorded original size is reached.
//!
//! Grounded on the original archiver's `file_open_read`/`file_write`/
//! `file_read` sequence: a full read to build frequencies, then a rewind and
//! a second pass to emit.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use crate::bits::{BitBuffer, BitStreamReader, BitStreamWriter};
use crate::huffman::Tree;

/// Sizes recorded for one member after compression: the original byte
/// length and the compressed blob length (serialised tree + payload,
/// rounded up to a whole byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberStats {
    pub size: u64,
    pub compressed_size: u64,
}

/// Pass 1: reads `input` to exhaustion, accumulating a 256-entry byte
/// frequency table and the total byte count.
pub fn count_frequencies<R: Read>(input: &mut R) -> io::Result<([u64; 256], u64)> {
    let mut freq = [0u64; 256];
    let mut size = 0u64;
    let mut chunk = [0u8; 8192];
    loop {
        let n = input.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        for &b in &chunk[..n] {
            freq[b as usize] += 1;
        }
        size += n as u64;
    }
    Ok((freq, size))
}

/// `ceil(tree_bits + payload_bits) / 8)`, the blob length a built tree will
/// occupy once emitted.
pub fn compressed_size_bytes(tree: &Tree) -> u64 {
    let tree_bits = tree.serialize().len() as u64;
    let payload_bits = tree.root().bit_count();
    (tree_bits + payload_bits + 7) / 8
}

/// Pass 2: rewinds `input`, then writes the serialised tree followed by the
/// coded form of every byte in the file to `writer`.
pub fn emit_member<R: Read + Seek, W: Write + Seek>(
    input: &mut R,
    tree: &Tree,
    writer: &mut BitStreamWriter<W>,
) -> io::Result<()> {
    input.seek(SeekFrom::Start(0))?;
    writer.write_bits(&tree.serialize())?;

    let mut chunk = [0u8; 8192];
    let mut emitted = BitBuffer::new();
    loop {
        let n = input.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        for &b in &chunk[..n] {
            emitted.append(tree.code_for(b));
        }
        writer.write_bits(&emitted)?;
        emitted = BitBuffer::new();
    }
    Ok(())
}

/// Counts, builds the tree, and emits a full member in one call, returning
/// its recorded sizes. `input` must support seeking back to its start for
/// Pass 2.
pub fn compress_member<R: Read + Seek, W: Write + Seek>(
    input: &mut R,
    writer: &mut BitStreamWriter<W>,
) -> io::Result<MemberStats> {
    let (freq, size) = count_frequencies(input)?;
    trace!("pass 1 complete: {size} bytes read, {} distinct symbols", freq.iter().filter(|&&c| c > 0).count());

    let tree = Tree::build(&freq);
    let compressed_size = compressed_size_bytes(&tree);
    debug!("built tree for {size}-byte member, compressed size {compressed_size} bytes");

    emit_member(input, &tree, writer)?;
    trace!("pass 2 complete: emitted {compressed_size} bytes");

    Ok(MemberStats { size, compressed_size })
}

/// Deserialises the tree from `reader`, then decodes exactly `size` symbols,
/// writing them to `output`. The payload carries no end marker: decoding
/// stops solely because `size` has been reached.
pub fn decompress_member<R: Read, W: Write>(
    reader: &mut BitStreamReader<R>,
    size: u64,
    output: &mut W,
) -> io::Result<()> {
    let tree = Tree::deserialize(reader)?;
    debug!("decoding {size} symbols");
    let mut buf = Vec::with_capacity(8192.min(size as usize));
    for _ in 0..size {
        buf.push(tree.decode_next(reader)?);
        if buf.len() == buf.capacity() {
            output.write_all(&buf)?;
            buf.clear();
        }
    }
    if !buf.is_empty() {
        output.write_all(&buf)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_small_text() {
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut input = Cursor::new(data.clone());
        let mut archive = Cursor::new(Vec::new());
        let stats;
        {
            let mut writer = BitStreamWriter::new(&mut archive);
            stats = compress_member(&mut input, &mut writer).unwrap();
            writer.close().unwrap();
        }
        assert_eq!(stats.size, data.len() as u64);

        let mut reader = BitStreamReader::new(Cursor::new(archive.into_inner()));
        let mut output = Vec::new();
        decompress_member(&mut reader, stats.size, &mut output).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn roundtrip_empty_file() {
        let mut input = Cursor::new(Vec::new());
        let mut archive = Cursor::new(Vec::new());
        let stats;
        {
            let mut writer = BitStreamWriter::new(&mut archive);
            stats = compress_member(&mut input, &mut writer).unwrap();
            writer.close().unwrap();
        }
        assert_eq!(stats.size, 0);

        let mut reader = BitStreamReader::new(Cursor::new(archive.into_inner()));
        let mut output = Vec::new();
        decompress_member(&mut reader, 0, &mut output).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn roundtrip_single_repeated_byte() {
        let data = vec![b'x'; 4096];
        let mut input = Cursor::new(data.clone());
        let mut archive = Cursor::new(Vec::new());
        let stats;
        {
            let mut writer = BitStreamWriter::new(&mut archive);
            stats = compress_member(&mut input, &mut writer).unwrap();
            writer.close().unwrap();
        }

        let mut reader = BitStreamReader::new(Cursor::new(archive.into_inner()));
        let mut output = Vec::new();
        decompress_member(&mut reader, stats.size, &mut output).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn roundtrip_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).cycle().take(2000).collect();
        let mut input = Cursor::new(data.clone());
        let mut archive = Cursor::new(Vec::new());
        let stats;
        {
            let mut writer = BitStreamWriter::new(&mut archive);
            stats = compress_member(&mut input, &mut writer).unwrap();
            writer.close().unwrap();
        }

        let mut reader = BitStreamReader::new(Cursor::new(archive.into_inner()));
        let mut output = Vec::new();
        decompress_member(&mut reader, stats.size, &mut output).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn compressed_size_matches_what_was_actually_written() {
        let data = b"aaaaaaaaaaaaaaaaaaaabbbbbbbbbbccc".to_vec();
        let mut input = Cursor::new(data);
        let mut archive = Cursor::new(Vec::new());
        let stats;
        {
            let mut writer = BitStreamWriter::new(&mut archive);
            stats = compress_member(&mut input, &mut writer).unwrap();
            writer.close().unwrap();
        }
        assert_eq!(archive.into_inner().len() as u64, stats.compressed_size);
    }
}
