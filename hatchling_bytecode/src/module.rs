//! The compiled script module file used for module loading.
//!
//! Layout, little-endian throughout:
//!
//! ```text
//! magic:          4 bytes, b"HBC\0"
//! version:        u16
//! debug_info:     u8 (0/1)
//! source_filename: Option<length-prefixed utf8> (present iff debug_info)
//! function_count: u32
//! functions[function_count]:
//!     name_hash:       u32
//!     arity:           u8
//!     min_arity:       u8
//!     upvalue_count:   u8
//!     code_len:        u32
//!     code:            [u8; code_len]
//!     line_info_len:   u32           (0 if !debug_info)
//!     line_info:       [u32; line_info_len]  (line<<16 | column)
//!     constant_count:  u32
//!     constants:       [Constant; constant_count]
//! token_count:    u32
//! tokens[token_count]:
//!     hash: u32
//!     text: length-prefixed utf8
//! ```
//!
//! The token table (§3.2's "side token map") exists only for diagnostics:
//! every identifier lookup at runtime goes through the hash, never the text.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::{FormatError, Result};

pub const MAGIC: &[u8; 4] = b"HBC\0";
pub const VERSION: u16 = 1;

/// A constant-pool entry as written to / read from the module file.
///
/// Mirrors the runtime `Value` variants that are legal as compile-time
/// constants (§3.1): no `Object` variant other than `String` may appear in a
/// chunk's constant pool, since classes/instances/arrays are heap-allocated
/// at runtime, not baked into bytecode.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Integer(i32),
    Decimal(f32),
    String(String),
}

impl Constant {
    fn tag(&self) -> u8 {
        match self {
            Constant::Null => 0,
            Constant::Integer(_) => 1,
            Constant::Decimal(_) => 2,
            Constant::String(_) => 3,
        }
    }

    fn write(&self, w: &mut impl Write) -> Result<()> {
        w.write_u8(self.tag())?;
        match self {
            Constant::Null => {}
            Constant::Integer(v) => w.write_i32::<LittleEndian>(*v)?,
            Constant::Decimal(v) => w.write_f32::<LittleEndian>(*v)?,
            Constant::String(s) => write_string(w, s)?,
        }
        Ok(())
    }

    fn read(r: &mut impl Read) -> Result<Self> {
        Ok(match r.read_u8()? {
            0 => Constant::Null,
            1 => Constant::Integer(r.read_i32::<LittleEndian>()?),
            2 => Constant::Decimal(r.read_f32::<LittleEndian>()?),
            3 => Constant::String(read_string(r)?),
            other => {
                return Err(FormatError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown constant tag {other}"),
                )))
            }
        })
    }
}

fn write_string(w: &mut impl Write, s: &str) -> Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(r: &mut impl Read) -> Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| FormatError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name_hash: u32,
    pub arity: u8,
    pub min_arity: u8,
    pub upvalue_count: u8,
    pub code: Vec<u8>,
    /// Packed `line << 16 | column`, parallel to `code` one entry per opcode.
    pub line_info: Vec<u32>,
    pub constants: Vec<Constant>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleHeader {
    pub debug_info: bool,
    pub source_filename: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledModule {
    pub header: ModuleHeader,
    pub functions: Vec<CompiledFunction>,
    /// hash -> original identifier text, for diagnostics only (§3.2, §6).
    pub tokens: Vec<(u32, String)>,
}

impl CompiledModule {
    pub fn write(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u16::<LittleEndian>(VERSION)?;
        w.write_u8(self.header.debug_info as u8)?;
        if self.header.debug_info {
            write_string(w, self.header.source_filename.as_deref().unwrap_or(""))?;
        }
        w.write_u32::<LittleEndian>(self.functions.len() as u32)?;
        for f in &self.functions {
            w.write_u32::<LittleEndian>(f.name_hash)?;
            w.write_u8(f.arity)?;
            w.write_u8(f.min_arity)?;
            w.write_u8(f.upvalue_count)?;
            w.write_u32::<LittleEndian>(f.code.len() as u32)?;
            w.write_all(&f.code)?;
            let line_len = if self.header.debug_info { f.line_info.len() } else { 0 };
            w.write_u32::<LittleEndian>(line_len as u32)?;
            if self.header.debug_info {
                for line in &f.line_info {
                    w.write_u32::<LittleEndian>(*line)?;
                }
            }
            w.write_u32::<LittleEndian>(f.constants.len() as u32)?;
            for c in &f.constants {
                c.write(w)?;
            }
        }
        w.write_u32::<LittleEndian>(self.tokens.len() as u32)?;
        for (hash, text) in &self.tokens {
            w.write_u32::<LittleEndian>(*hash)?;
            write_string(w, text)?;
        }
        Ok(())
    }

    pub fn read(r: &mut impl Read) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(FormatError::BadMagic {
                expected: MAGIC,
                found: magic.to_vec(),
            });
        }
        let version = r.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let debug_info = r.read_u8()? != 0;
        let source_filename = if debug_info {
            Some(read_string(r)?)
        } else {
            None
        };
        let function_count = r.read_u32::<LittleEndian>()?;
        let mut functions = Vec::with_capacity(function_count as usize);
        for _ in 0..function_count {
            let name_hash = r.read_u32::<LittleEndian>()?;
            let arity = r.read_u8()?;
            let min_arity = r.read_u8()?;
            let upvalue_count = r.read_u8()?;
            let code_len = r.read_u32::<LittleEndian>()? as usize;
            let mut code = vec![0u8; code_len];
            r.read_exact(&mut code)?;
            let line_info_len = r.read_u32::<LittleEndian>()? as usize;
            let mut line_info = Vec::with_capacity(line_info_len);
            for _ in 0..line_info_len {
                line_info.push(r.read_u32::<LittleEndian>()?);
            }
            let constant_count = r.read_u32::<LittleEndian>()?;
            let mut constants = Vec::with_capacity(constant_count as usize);
            for _ in 0..constant_count {
                constants.push(Constant::read(r)?);
            }
            functions.push(CompiledFunction {
                name_hash,
                arity,
                min_arity,
                upvalue_count,
                code,
                line_info,
                constants,
            });
        }
        let token_count = r.read_u32::<LittleEndian>()?;
        let mut tokens = Vec::with_capacity(token_count as usize);
        for _ in 0..token_count {
            let hash = r.read_u32::<LittleEndian>()?;
            let text = read_string(r)?;
            tokens.push((hash, text));
        }
        Ok(CompiledModule {
            header: ModuleHeader {
                debug_info,
                source_filename,
            },
            functions,
            tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let module = CompiledModule {
            header: ModuleHeader {
                debug_info: true,
                source_filename: Some("main.hs".to_string()),
            },
            functions: vec![CompiledFunction {
                name_hash: 0xdead_beef,
                arity: 2,
                min_arity: 1,
                upvalue_count: 0,
                code: vec![0x01, 0x00, 0x02],
                line_info: vec![(1 << 16) | 1, (1 << 16) | 4],
                constants: vec![Constant::Integer(3), Constant::String("hi".into())],
            }],
            tokens: vec![(0xdead_beef, "f".to_string())],
        };

        let mut buf = Vec::new();
        module.write(&mut buf).unwrap();
        let back = CompiledModule::read(&mut &buf[..]).unwrap();

        assert_eq!(back.header.source_filename.as_deref(), Some("main.hs"));
        assert_eq!(back.functions.len(), 1);
        assert_eq!(back.functions[0].name_hash, 0xdead_beef);
        assert_eq!(back.functions[0].constants, module.functions[0].constants);
        assert_eq!(back.tokens, module.tokens);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; 16];
        let err = CompiledModule::read(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, FormatError::BadMagic { .. }));
    }
}
