//! Class-file constant pool decoding and remapping. Only the constant
//! pool is understood; everything after it is opaque bytes the caller
//! copies through unchanged.

pub mod pool;
pub mod remap;

pub use pool::{ConstantPoolDecoder, Tag};
pub use remap::ConstantPoolRemapper;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MAX_SUPPORTED_MAJOR_VERSION: u16 = 52;
