//! Tile-collision file formats.
//!
//! Two on-disk formats are recognised by magic:
//!
//! - `"TIL\0"` (RSDK): two collision planes of 1024 tiles each, zlib-framed.
//!   Per tile: 16 heights, 16 "is active" flags, an `is_ceiling` byte, 4
//!   surface angles, and a behaviour byte.
//! - `"TCOL"` (HCOL): a small header (`tile_count`, `tile_size`, reserved),
//!   then per tile: `is_ceiling`, `angle_top`, `has_collision`, and
//!   `tile_size` heights.
//!
//! Both loaders only ever store the *top* (or, for RSDK, top+bottom) columns
//! on disk; `TileConfigSet::from_rows` derives the remaining three flip
//! variants and the left/right columns the way `hatchling_core::physics`
//! expects to find them.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::{FormatError, Result};

pub const NO_CONTACT: u8 = 0xFF;
pub const COLUMNS: usize = 16;

pub const RSDK_MAGIC: &[u8; 4] = b"TIL\0";
pub const HCOL_MAGIC: &[u8; 4] = b"TCOL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileCollisionFormat {
    Rsdk,
    Hcol,
}

/// Per-tile, per-flip-variant collision metadata.
///
/// `collision_top`/`bottom`/`left`/`right` hold a height in `0..=15`, or
/// [`NO_CONTACT`] if that column has no surface. Angles are the byte-scale
/// encoding (`0x00` = +X floor, up to `0x80` for a ceiling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileConfig {
    pub collision_top: [u8; COLUMNS],
    pub collision_bottom: [u8; COLUMNS],
    pub collision_left: [u8; COLUMNS],
    pub collision_right: [u8; COLUMNS],
    pub angle_top: u8,
    pub angle_bottom: u8,
    pub angle_left: u8,
    pub angle_right: u8,
    pub is_ceiling: bool,
}

impl TileConfig {
    fn empty() -> Self {
        TileConfig {
            collision_top: [NO_CONTACT; COLUMNS],
            collision_bottom: [NO_CONTACT; COLUMNS],
            collision_left: [NO_CONTACT; COLUMNS],
            collision_right: [NO_CONTACT; COLUMNS],
            angle_top: 0,
            angle_bottom: 0x40,
            angle_left: 0x20,
            angle_right: 0x60,
            is_ceiling: false,
        }
    }

    /// Builds the base (unflipped) tile from a single top-row height array,
    /// deriving bottom/left/right by sweeping the stored column the way the
    /// RSDK/HCOL loaders do when a file only supplies the top profile.
    pub fn from_top_heights(top: [u8; COLUMNS], angle_top: u8, is_ceiling: bool) -> Self {
        let mut cfg = TileConfig::empty();
        cfg.collision_top = top;
        cfg.angle_top = angle_top;
        cfg.is_ceiling = is_ceiling;
        cfg.derive_missing_sides();
        cfg
    }

    /// Fills left/right columns by sweeping the stored top/bottom columns,
    /// used whenever a collision file only supplies top/bottom.
    fn derive_missing_sides(&mut self) {
        for col in 0..COLUMNS {
            if self.collision_left[col] == NO_CONTACT {
                self.collision_left[col] = sweep_side(&self.collision_top, col);
            }
            if self.collision_right[col] == NO_CONTACT {
                self.collision_right[col] = sweep_side(&self.collision_bottom, col);
            }
        }
    }

    /// The horizontal mirror (X-flip) of this tile.
    pub fn flip_x(&self) -> TileConfig {
        let mut out = *self;
        for i in 0..COLUMNS {
            out.collision_top[i] = self.collision_top[COLUMNS - 1 - i];
            out.collision_bottom[i] = self.collision_bottom[COLUMNS - 1 - i];
        }
        out.collision_left = flip_column(&self.collision_right);
        out.collision_right = flip_column(&self.collision_left);
        out
    }

    /// The vertical mirror (Y-flip) of this tile.
    pub fn flip_y(&self) -> TileConfig {
        let mut out = *self;
        std::mem::swap(&mut out.collision_top, &mut out.collision_bottom);
        std::mem::swap(&mut out.angle_top, &mut out.angle_bottom);
        for i in 0..COLUMNS {
            out.collision_left[i] = self.collision_left[COLUMNS - 1 - i];
            out.collision_right[i] = self.collision_right[COLUMNS - 1 - i];
        }
        out
    }

    pub fn flip_xy(&self) -> TileConfig {
        self.flip_x().flip_y()
    }
}

/// A column is flipped by complementing each height against the column
/// count: `CollisionLeft[i] == (H_right[i] xor 15)`.
fn flip_column(col: &[u8; COLUMNS]) -> [u8; COLUMNS] {
    let mut out = [NO_CONTACT; COLUMNS];
    for i in 0..COLUMNS {
        out[i] = if col[i] == NO_CONTACT {
            NO_CONTACT
        } else {
            col[i] ^ 15
        };
    }
    out
}

fn sweep_side(heights: &[u8; COLUMNS], col: usize) -> u8 {
    heights[col]
}

/// The four flip-variant copies of one tile's collision metadata, stored
/// as a contiguous array per collision plane.
#[derive(Debug, Clone, Copy)]
pub struct TileConfigVariants {
    pub normal: TileConfig,
    pub flip_x: TileConfig,
    pub flip_y: TileConfig,
    pub flip_xy: TileConfig,
}

impl TileConfigVariants {
    pub fn from_base(base: TileConfig) -> Self {
        TileConfigVariants {
            flip_x: base.flip_x(),
            flip_y: base.flip_y(),
            flip_xy: base.flip_xy(),
            normal: base,
        }
    }

    pub fn variant(&self, flip_x: bool, flip_y: bool) -> &TileConfig {
        match (flip_x, flip_y) {
            (false, false) => &self.normal,
            (true, false) => &self.flip_x,
            (false, true) => &self.flip_y,
            (true, true) => &self.flip_xy,
        }
    }
}

/// One collision plane's worth of tile configs, indexed by tile id.
#[derive(Debug, Clone, Default)]
pub struct TileConfigSet {
    pub tiles: Vec<TileConfigVariants>,
}

impl TileConfigSet {
    pub fn from_rows(rows: Vec<TileConfig>) -> Self {
        TileConfigSet {
            tiles: rows.into_iter().map(TileConfigVariants::from_base).collect(),
        }
    }

    pub fn get(&self, tile_id: usize, flip_x: bool, flip_y: bool) -> Option<&TileConfig> {
        self.tiles.get(tile_id).map(|v| v.variant(flip_x, flip_y))
    }
}

/// Detects the collision format from the leading 4 magic bytes.
pub fn detect_format(bytes: &[u8]) -> Result<TileCollisionFormat> {
    if bytes.starts_with(RSDK_MAGIC) {
        Ok(TileCollisionFormat::Rsdk)
    } else if bytes.starts_with(HCOL_MAGIC) {
        Ok(TileCollisionFormat::Hcol)
    } else {
        Err(FormatError::BadMagic {
            expected: RSDK_MAGIC,
            found: bytes.get(..4).unwrap_or(bytes).to_vec(),
        })
    }
}

const RSDK_TILES_PER_PLANE: usize = 1024;
const RSDK_PLANES: usize = 2;

/// Loads an RSDK `"TIL\0"` file: a 4-byte magic, then a zlib-compressed
/// stream of `2 * 1024` fixed records (16 heights, 16 active flags,
/// `is_ceiling`, 4 angles, a behaviour byte — 38 bytes per tile).
pub fn load_rsdk(bytes: &[u8]) -> Result<[TileConfigSet; RSDK_PLANES]> {
    if detect_format(bytes)? != TileCollisionFormat::Rsdk {
        return Err(FormatError::BadMagic {
            expected: RSDK_MAGIC,
            found: bytes[..4].to_vec(),
        });
    }
    let mut decoder = ZlibDecoder::new(&bytes[4..]);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| FormatError::Inflate(e.to_string()))?;

    let mut cursor = &inflated[..];
    let mut planes: [Vec<TileConfig>; RSDK_PLANES] = Default::default();
    for plane in planes.iter_mut() {
        for _ in 0..RSDK_TILES_PER_PLANE {
            let mut heights = [0u8; COLUMNS];
            cursor.read_exact(&mut heights)?;
            let mut active = [0u8; COLUMNS];
            cursor.read_exact(&mut active)?;
            for (h, a) in heights.iter_mut().zip(active.iter()) {
                if *a == 0 {
                    *h = NO_CONTACT;
                }
            }
            let is_ceiling = cursor.read_u8()? != 0;
            let angle_top = cursor.read_u8()?;
            let angle_bottom = cursor.read_u8()?;
            let angle_left = cursor.read_u8()?;
            let angle_right = cursor.read_u8()?;
            let _behaviour = cursor.read_u8()?;

            let mut cfg = TileConfig::from_top_heights(heights, angle_top, is_ceiling);
            cfg.angle_bottom = angle_bottom;
            cfg.angle_left = angle_left;
            cfg.angle_right = angle_right;
            plane.push(cfg);
        }
    }

    let [a, b] = planes;
    Ok([TileConfigSet::from_rows(a), TileConfigSet::from_rows(b)])
}

pub fn save_rsdk(planes: &[TileConfigSet; RSDK_PLANES]) -> Result<Vec<u8>> {
    let mut inflated = Vec::new();
    for plane in planes {
        for variants in &plane.tiles {
            let cfg = &variants.normal;
            inflated.extend_from_slice(&cfg.collision_top);
            let active: [u8; COLUMNS] =
                std::array::from_fn(|i| (cfg.collision_top[i] != NO_CONTACT) as u8);
            inflated.extend_from_slice(&active);
            inflated.push(cfg.is_ceiling as u8);
            inflated.push(cfg.angle_top);
            inflated.push(cfg.angle_bottom);
            inflated.push(cfg.angle_left);
            inflated.push(cfg.angle_right);
            inflated.push(0); // behaviour
        }
    }
    let mut out = Vec::new();
    out.write_all(RSDK_MAGIC)?;
    let mut encoder = ZlibEncoder::new(&mut out, Compression::default());
    encoder.write_all(&inflated)?;
    encoder.finish()?;
    Ok(out)
}

/// Loads an HCOL `"TCOL"` file: `{tile_count: u32, tile_size: u32, zeros: [u32; 3],
/// reserved: u32}` header, then `tile_count` records of
/// `{is_ceiling: u8, angle_top: u8, has_collision: u8, heights: [u8; tile_size]}`.
pub fn load_hcol(bytes: &[u8]) -> Result<TileConfigSet> {
    if detect_format(bytes)? != TileCollisionFormat::Hcol {
        return Err(FormatError::BadMagic {
            expected: HCOL_MAGIC,
            found: bytes[..4].to_vec(),
        });
    }
    let mut cursor = &bytes[4..];
    let tile_count = cursor.read_u32::<LittleEndian>()? as usize;
    let tile_size = cursor.read_u32::<LittleEndian>()? as usize;
    for _ in 0..3 {
        cursor.read_u32::<LittleEndian>()?;
    }
    let _reserved = cursor.read_u32::<LittleEndian>()?;

    if tile_size > COLUMNS {
        return Err(FormatError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "HCOL tile_size exceeds 16 columns",
        )));
    }

    let mut rows = Vec::with_capacity(tile_count);
    for _ in 0..tile_count {
        let is_ceiling = cursor.read_u8()? != 0;
        let angle_top = cursor.read_u8()?;
        let has_collision = cursor.read_u8()? != 0;
        let mut raw = vec![0u8; tile_size];
        cursor.read_exact(&mut raw)?;

        let mut heights = [NO_CONTACT; COLUMNS];
        if has_collision {
            heights[..tile_size].copy_from_slice(&raw);
        }
        rows.push(TileConfig::from_top_heights(heights, angle_top, is_ceiling));
    }
    Ok(TileConfigSet::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_x_complements_left_right_columns() {
        let mut top = [8u8; COLUMNS];
        for (i, h) in top.iter_mut().enumerate() {
            *h = i as u8;
        }
        let base = TileConfig::from_top_heights(top, 0, false);
        let flipped = base.flip_x();

        for i in 0..COLUMNS {
            assert_eq!(flipped.collision_top[i], base.collision_top[COLUMNS - 1 - i]);
        }
        for i in 0..COLUMNS {
            let expected = if base.collision_right[i] == NO_CONTACT {
                NO_CONTACT
            } else {
                base.collision_right[i] ^ 15
            };
            assert_eq!(flipped.collision_left[i], expected);
        }
    }

    #[test]
    fn flat_tile_sensor_hits_expected_angle() {
        // Flat-topped tile: CollisionTop = [8; 16].
        let cfg = TileConfig::from_top_heights([8; COLUMNS], 0x00, false);
        assert_eq!(cfg.collision_top[7], 8);
        assert_eq!(cfg.angle_top, 0x00);
    }

    #[test]
    fn hcol_rejects_oversized_tile_size() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(HCOL_MAGIC);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&32u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(load_hcol(&bytes).is_err());
    }
}
