//! Encoded polyline codec (precision 5).
//!
//! Each coordinate is stored as the zig-zag encoded delta from the previous
//! one, split into 5-bit chunks offset by 63 into printable ASCII.

use epanav_env::GeoPoint;
use thiserror::Error;

const PRECISION: f64 = 1e5;
const CHUNK_BITS: u32 = 5;
const CONTINUATION: i64 = 0x20;
const ASCII_OFFSET: u8 = 63;

/// Decoding failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolylineError {
    #[error("invalid character {byte:#04x} at byte {index}")]
    InvalidCharacter { index: usize, byte: u8 },

    #[error("polyline truncated at byte {index}")]
    Truncated { index: usize },

    #[error("varint overflow at byte {index}")]
    Overflow { index: usize },

    #[error("decoded coordinate out of range: lat={latitude}, lng={longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },
}

/// Decodes an encoded polyline into points in order.
pub fn decode(encoded: &str) -> Result<Vec<GeoPoint>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::with_capacity(bytes.len() / 4);
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        let start = index;
        lat = lat
            .checked_add(read_delta(bytes, &mut index)?)
            .ok_or(PolylineError::Overflow { index: start })?;
        lng = lng
            .checked_add(read_delta(bytes, &mut index)?)
            .ok_or(PolylineError::Overflow { index: start })?;

        let latitude = lat as f64 / PRECISION;
        let longitude = lng as f64 / PRECISION;
        let point = GeoPoint::new(latitude, longitude)
            .map_err(|_| PolylineError::OutOfRange { latitude, longitude })?;
        points.push(point);
    }

    Ok(points)
}

fn read_delta(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Truncated { index: *index });
        };
        if !(ASCII_OFFSET..=126).contains(&byte) {
            return Err(PolylineError::InvalidCharacter { index: *index, byte });
        }
        if shift > 60 {
            return Err(PolylineError::Overflow { index: *index });
        }

        let chunk = i64::from(byte - ASCII_OFFSET);
        result |= (chunk & 0x1f) << shift;
        shift += CHUNK_BITS;
        *index += 1;

        if chunk < CONTINUATION {
            break;
        }
    }

    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}

/// Encodes points as a polyline.
pub fn encode(points: &[GeoPoint]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for p in points {
        let lat = (p.latitude() * PRECISION).round() as i64;
        let lng = (p.longitude() * PRECISION).round() as i64;
        write_delta(&mut out, lat - prev_lat);
        write_delta(&mut out, lng - prev_lng);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn write_delta(out: &mut String, delta: i64) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };

    while value >= CONTINUATION {
        out.push(char::from((CONTINUATION | (value & 0x1f)) as u8 + ASCII_OFFSET));
        value >>= CHUNK_BITS;
    }
    out.push(char::from(value as u8 + ASCII_OFFSET));
}
