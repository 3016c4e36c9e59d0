//! GDSII stream export.
//!
//! Writes a library holding one cell with one `BOUNDARY` element. User unit
//! is 1 um, database unit 1 nm; vertex coordinates are rounded to the
//! database grid.

use std::path::Path;

use chrono::{Datelike, Timelike, Utc};
use tracing::info;
use yb_types::{ArtifactError, GeometryError, YbResult};

use crate::polygon::Polygon;

/// XY records carry at most 8191 coordinate pairs, one of which closes
/// the boundary.
pub const MAX_BOUNDARY_VERTICES: usize = 8190;

const DB_UNIT_METRES: f64 = 1e-9;
const USER_UNIT_METRES: f64 = 1e-6;

mod record {
    pub const HEADER: u8 = 0x00;
    pub const BGNLIB: u8 = 0x01;
    pub const LIBNAME: u8 = 0x02;
    pub const UNITS: u8 = 0x03;
    pub const ENDLIB: u8 = 0x04;
    pub const BGNSTR: u8 = 0x05;
    pub const STRNAME: u8 = 0x06;
    pub const ENDSTR: u8 = 0x07;
    pub const BOUNDARY: u8 = 0x08;
    pub const LAYER: u8 = 0x0D;
    pub const DATATYPE: u8 = 0x0E;
    pub const XY: u8 = 0x10;
    pub const ENDEL: u8 = 0x11;
}

mod data {
    pub const NONE: u8 = 0x00;
    pub const INT16: u8 = 0x02;
    pub const INT32: u8 = 0x03;
    pub const REAL64: u8 = 0x05;
    pub const ASCII: u8 = 0x06;
}

/// Names and layer assignment for the exported layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub library: String,
    pub cell: String,
    pub layer: i16,
    pub datatype: i16,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            library: "YBRANCH".to_string(),
            cell: "Y_BRANCH".to_string(),
            layer: 1,
            datatype: 0,
        }
    }
}

/// Encode a polygon (coordinates in metres) as a GDSII stream.
pub fn encode_gds(polygon: &Polygon, options: &LayoutOptions) -> Result<Vec<u8>, GeometryError> {
    if polygon.len() < 3 {
        return Err(GeometryError::Degenerate {
            message: format!("boundary needs 3 vertices, got {}", polygon.len()),
        });
    }
    if polygon.len() > MAX_BOUNDARY_VERTICES {
        return Err(GeometryError::TooManyVertices {
            vertices: polygon.len(),
            limit: MAX_BOUNDARY_VERTICES,
        });
    }

    let mut out = Vec::with_capacity(256 + 8 * polygon.len());
    let stamp = timestamp();

    push_record(&mut out, record::HEADER, data::INT16, &600i16.to_be_bytes());
    push_record(&mut out, record::BGNLIB, data::INT16, &int16s(&stamp));
    push_record(&mut out, record::LIBNAME, data::ASCII, &ascii(&options.library));
    let mut units = Vec::with_capacity(16);
    units.extend_from_slice(&encode_real8(DB_UNIT_METRES / USER_UNIT_METRES));
    units.extend_from_slice(&encode_real8(DB_UNIT_METRES));
    push_record(&mut out, record::UNITS, data::REAL64, &units);

    push_record(&mut out, record::BGNSTR, data::INT16, &int16s(&stamp));
    push_record(&mut out, record::STRNAME, data::ASCII, &ascii(&options.cell));

    push_record(&mut out, record::BOUNDARY, data::NONE, &[]);
    push_record(&mut out, record::LAYER, data::INT16, &options.layer.to_be_bytes());
    push_record(&mut out, record::DATATYPE, data::INT16, &options.datatype.to_be_bytes());
    let vertices = polygon.vertices();
    let mut xy = Vec::with_capacity(8 * (vertices.len() + 1));
    for p in vertices.iter().chain(std::iter::once(&vertices[0])) {
        xy.extend_from_slice(&to_db(p.x).to_be_bytes());
        xy.extend_from_slice(&to_db(p.y).to_be_bytes());
    }
    push_record(&mut out, record::XY, data::INT32, &xy);
    push_record(&mut out, record::ENDEL, data::NONE, &[]);

    push_record(&mut out, record::ENDSTR, data::NONE, &[]);
    push_record(&mut out, record::ENDLIB, data::NONE, &[]);
    Ok(out)
}

/// Write the polygon to a `.gds` file.
pub fn write_gds(polygon: &Polygon, path: &Path, options: &LayoutOptions) -> YbResult<()> {
    let bytes = encode_gds(polygon, options)?;
    std::fs::write(path, bytes).map_err(|e| ArtifactError::Layout {
        message: format!("{}: {}", path.display(), e),
    })?;
    info!(path = %path.display(), vertices = polygon.len(), "layout exported");
    Ok(())
}

fn push_record(out: &mut Vec<u8>, kind: u8, data_type: u8, payload: &[u8]) {
    let len = (4 + payload.len()) as u16;
    out.extend_from_slice(&len.to_be_bytes());
    out.push(kind);
    out.push(data_type);
    out.extend_from_slice(payload);
}

fn int16s(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// NUL-padded to even length.
fn ascii(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

fn to_db(metres: f64) -> i32 {
    (metres / DB_UNIT_METRES).round() as i32
}

/// Modification and access time, both set to now.
fn timestamp() -> [i16; 12] {
    let now = Utc::now();
    let one = [
        now.year() as i16,
        now.month() as i16,
        now.day() as i16,
        now.hour() as i16,
        now.minute() as i16,
        now.second() as i16,
    ];
    let mut both = [0i16; 12];
    both[..6].copy_from_slice(&one);
    both[6..].copy_from_slice(&one);
    both
}

/// GDSII 8-byte real: sign bit, 7-bit base-16 exponent with excess 64,
/// 56-bit mantissa in [1/16, 1).
pub fn encode_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0; 8];
    }
    let sign: u64 = if value < 0.0 { 1 } else { 0 };
    let mut mantissa = value.abs();
    let mut exponent: i32 = 64;
    while mantissa >= 1.0 {
        mantissa /= 16.0;
        exponent += 1;
    }
    while mantissa < 1.0 / 16.0 {
        mantissa *= 16.0;
        exponent -= 1;
    }
    let mut bits = (mantissa * (1u64 << 56) as f64).round() as u64;
    if bits >= 1u64 << 56 {
        bits >>= 4;
        exponent += 1;
    }
    ((sign << 63) | ((exponent as u64 & 0x7f) << 56) | bits).to_be_bytes()
}

pub fn decode_real8(bytes: [u8; 8]) -> f64 {
    let raw = u64::from_be_bytes(bytes);
    let mantissa = (raw & ((1u64 << 56) - 1)) as f64 / (1u64 << 56) as f64;
    let exponent = ((raw >> 56) & 0x7f) as i32 - 64;
    let magnitude = mantissa * 16f64.powi(exponent);
    if raw >> 63 == 1 {
        -magnitude
    } else {
        magnitude
    }
}
