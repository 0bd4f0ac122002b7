//! Scene file format dispatch: a Hatch-native binary (`HSCN`), an RSDK
//! binary, or a Tiled XML map, selected by magic or by extension fallback
//! when the first bytes aren't recognised.

use byteorder::{LittleEndian, ReadBytesExt};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;

use crate::{FormatError, Result};

pub const HSCN_MAGIC: &[u8; 4] = b"HSCN";
/// RSDK scene files share a magic family with RSDK tile collision files but
/// are distinguished by a different fixed header length; the value here is
/// the one the original engine's scene reader checks for.
pub const RSDK_SCENE_MAGIC: &[u8; 4] = b"RSDK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFileKind {
    Hatch,
    Rsdk,
    Tiled,
}

/// Picks a scene file format by magic, falling back to the file extension
/// when the header doesn't match a known magic.
pub fn detect(bytes: &[u8], extension: Option<&str>) -> Result<SceneFileKind> {
    if bytes.starts_with(HSCN_MAGIC) {
        return Ok(SceneFileKind::Hatch);
    }
    if bytes.starts_with(RSDK_SCENE_MAGIC) {
        return Ok(SceneFileKind::Rsdk);
    }
    match extension.map(|e| e.to_ascii_lowercase()) {
        Some(ref ext) if ext == "tmx" || ext == "xml" => Ok(SceneFileKind::Tiled),
        Some(ref ext) if ext == "hscn" => Ok(SceneFileKind::Hatch),
        Some(ref ext) if ext == "bin" => Ok(SceneFileKind::Rsdk),
        _ => Err(FormatError::BadMagic {
            expected: HSCN_MAGIC,
            found: bytes.get(..4).unwrap_or(bytes).to_vec(),
        }),
    }
}

/// The Hatch-native binary scene header: magic, version, grid dimensions and
/// the number of tile layers that follow. The per-layer tile grids and
/// per-scanline parallax tables are read by `hatchling_core::scene::layer`
/// once the header confirms the file shape.
#[derive(Debug, Clone, Copy)]
pub struct HscnHeader {
    pub version: u16,
    pub width: u16,
    pub height: u16,
    pub layer_count: u16,
}

pub fn read_hscn_header(bytes: &[u8]) -> Result<HscnHeader> {
    if !bytes.starts_with(HSCN_MAGIC) {
        return Err(FormatError::BadMagic {
            expected: HSCN_MAGIC,
            found: bytes.get(..4).unwrap_or(bytes).to_vec(),
        });
    }
    let mut cursor = &bytes[4..];
    let version = cursor.read_u16::<LittleEndian>()?;
    let width = cursor.read_u16::<LittleEndian>()?;
    let height = cursor.read_u16::<LittleEndian>()?;
    let layer_count = cursor.read_u16::<LittleEndian>()?;
    Ok(HscnHeader {
        version,
        width,
        height,
        layer_count,
    })
}

/// A minimal in-memory view of a Tiled TMX map: enough width/height/tile
/// data per layer for `hatchling_core::scene::layer` to populate a
/// `SceneLayer`'s tile grid. Tileset image references,
/// properties and object layers are intentionally not modeled — the core
/// only needs the collision/draw grid, not the authoring metadata.
#[derive(Debug, Clone, Default)]
pub struct TiledMap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<TiledLayer>,
}

#[derive(Debug, Clone, Default)]
pub struct TiledLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Raw Tiled GIDs (1-based, 0 = empty), CSV-decoded.
    pub tiles: Vec<u32>,
}

/// Parses just enough of a Tiled TMX XML document to build a [`TiledMap`]:
/// the `<map>` attributes, and each `<layer>`'s attributes plus its
/// `<data encoding="csv">` body. Base64/compressed layer data and non-CSV
/// encodings are rejected rather than silently misread.
pub fn parse_tiled_xml(xml: &str) -> Result<TiledMap> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut map = TiledMap::default();
    let mut current_layer: Option<TiledLayer> = None;
    let mut in_data = false;
    let mut data_encoding_is_csv = true;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| FormatError::Xml(e.to_string()))?
        {
            Event::Start(e) | Event::Empty(ref e) => {
                let name = e.name();
                let local = String::from_utf8_lossy(name.as_ref()).to_string();
                match local.as_str() {
                    "map" => {
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                            let val = attr.unescape_value().unwrap_or_default().to_string();
                            match key.as_str() {
                                "width" => map.width = val.parse().unwrap_or(0),
                                "height" => map.height = val.parse().unwrap_or(0),
                                "tilewidth" => map.tile_width = val.parse().unwrap_or(0),
                                "tileheight" => map.tile_height = val.parse().unwrap_or(0),
                                _ => {}
                            }
                        }
                    }
                    "layer" => {
                        let mut layer = TiledLayer::default();
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                            let val = attr.unescape_value().unwrap_or_default().to_string();
                            match key.as_str() {
                                "name" => layer.name = val,
                                "width" => layer.width = val.parse().unwrap_or(0),
                                "height" => layer.height = val.parse().unwrap_or(0),
                                _ => {}
                            }
                        }
                        current_layer = Some(layer);
                    }
                    "data" => {
                        in_data = true;
                        data_encoding_is_csv = true;
                        for attr in e.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                            let val = attr.unescape_value().unwrap_or_default().to_string();
                            if key == "encoding" && val != "csv" {
                                data_encoding_is_csv = false;
                            }
                            if key == "compression" {
                                data_encoding_is_csv = false;
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) if in_data => {
                if !data_encoding_is_csv {
                    return Err(FormatError::Xml(
                        "only CSV-encoded Tiled layer data is supported".to_string(),
                    ));
                }
                let text = t.unescape().map_err(|e| FormatError::Xml(e.to_string()))?;
                if let Some(layer) = current_layer.as_mut() {
                    for piece in text.split(',') {
                        let trimmed = piece.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        layer.tiles.push(
                            trimmed
                                .parse()
                                .map_err(|_| FormatError::Xml(format!("bad gid {trimmed}")))?,
                        );
                    }
                }
            }
            Event::End(e) => {
                let local = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local.as_str() {
                    "data" => in_data = false,
                    "layer" => {
                        if let Some(layer) = current_layer.take() {
                            map.layers.push(layer);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(map)
}

pub fn read_all(mut r: impl Read) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_magic_before_extension() {
        let mut bytes = HSCN_MAGIC.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(detect(&bytes, Some("tmx")).unwrap(), SceneFileKind::Hatch);
    }

    #[test]
    fn falls_back_to_extension() {
        let bytes = b"<map/>".to_vec();
        assert_eq!(detect(&bytes, Some("tmx")).unwrap(), SceneFileKind::Tiled);
    }

    #[test]
    fn parses_minimal_tiled_csv_layer() {
        let xml = r#"<?xml version="1.0"?>
<map width="2" height="1" tilewidth="16" tileheight="16">
  <layer name="Ground" width="2" height="1">
    <data encoding="csv">1,2</data>
  </layer>
</map>"#;
        let map = parse_tiled_xml(xml).unwrap();
        assert_eq!(map.width, 2);
        assert_eq!(map.layers.len(), 1);
        assert_eq!(map.layers[0].tiles, vec![1, 2]);
    }

    #[test]
    fn rejects_non_csv_layer_data() {
        let xml = r#"<map width="1" height="1"><layer name="a" width="1" height="1"><data encoding="base64">AAAA</data></layer></map>"#;
        assert!(parse_tiled_xml(xml).is_err());
    }
}
