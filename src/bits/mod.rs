//! Bit-level primitives: the growable bit buffer and the stream reader/writer
//! built on top of it. Bit order is LSB-first throughout (see crate docs).

pub mod buffer;
pub mod stream;

pub use buffer::BitBuffer;
pub use stream::{BitStreamReader, BitStreamWriter};
