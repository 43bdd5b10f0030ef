//! The reader (§4.5): turns source bytes into canonical `Value` trees,
//! allocating directly into a [`shi_gc::Heap`] as it parses.

pub mod cursor;
pub mod reader;

pub use reader::{ReadError, Reader};
