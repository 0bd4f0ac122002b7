//! On-disk formats produced or consumed by the core:
//!
//! - the compiled script module file (header + function records + token table)
//! - the two recognised tile-collision formats, `TIL\0` (RSDK) and `TCOL` (HCOL)
//! - scene file magic dispatch (`HSCN` / RSDK / Tiled XML)
//!
//! This crate only deals in bytes; it knows nothing about the VM or the
//! scene driver that consume the structures it produces.

pub mod module;
pub mod scenefile;
pub mod tilecfg;

pub use module::{CompiledFunction, CompiledModule, ModuleHeader};
pub use scenefile::SceneFileKind;
pub use tilecfg::{TileCollisionFormat, TileConfig, TileConfigSet};

#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("unexpected end of file while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("bad magic number: expected {expected:?}, found {found:?}")]
    BadMagic {
        expected: &'static [u8],
        found: Vec<u8>,
    },
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("zlib stream was corrupt: {0}")]
    Inflate(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed XML scene file: {0}")]
    Xml(String),
}

pub type Result<T> = std::result::Result<T, FormatError>;
