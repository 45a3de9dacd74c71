//! # Bunchiver
//!
//! A multi-file archiver that compresses each member independently with a
//! static (non-adaptive), per-file Huffman code, then concatenates the
//! compressed blobs and appends a trailer describing where each one lives.
//!
//! * `bits` — LSB-first bit buffer and bit-granular stream reader/writer.
//! * `huffman` — tree construction, serialisation, and the code table.
//! * `filecodec` — the two-pass per-member compress/decompress codec.
//! * `archive` — the multi-file container: trailer layout, `bundle`/`unbundle`.
//!
//! ## Example
//!
//! ```rs
//! use bunchiver::archive;
//! let members = archive::bundle("my_archive.bnc", &["a.txt", "b.txt"]).expect("bundle failed");
//! for m in &members {
//!     eprintln!("{} : {} -> {} bytes", m.name, m.size, m.compressed_size);
//! }
//! ```

pub mod archive;
pub mod bits;
pub mod filecodec;
pub mod huffman;

/// Boxed dynamic error, used at the library/CLI boundary where callers don't
/// need to match on a specific variant.
pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(), DYNERR>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive trailer is truncated or malformed")]
    TrailerFormatMismatch,
    #[error("member name is not valid UTF-8")]
    BadMemberName,
    #[error("no member named `{0}` in archive")]
    MemberNotFound(String),
    #[error("input path `{0}` has no file name component")]
    NoFileName(String),
}

/// Formats a byte count as `%.4f UNIT`, stepping through B/KiB/MiB/GiB/TiB/PiB
/// by powers of 1024, matching the archiver's own size summary formatter.
pub fn pretty_print_size(size: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut scaled = size;
    let mut power = 0usize;
    while (scaled >> 10) > 0 && power + 1 < UNITS.len() {
        scaled >>= 10;
        power += 1;
    }
    let divisor = 1u64 << (10 * power as u32);
    let value = size as f64 / divisor as f64;
    format!("{:.4} {}", value, UNITS[power])
}
