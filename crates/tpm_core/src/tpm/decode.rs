//! Typed value decoders and encoders for TPM property values.
//!
//! Property values are kept as raw text by the parser because their grammar
//! depends on the key. These functions turn that text into typed values and
//! back. They never look at block context; the builder decides which decoder
//! applies to which `(block type, key)` pair.
//!
//! # Value grammar
//!
//! - vectors: `(1.5,-2,+2.99E8)`, whitespace around commas and parens allowed
//! - faces: `(v1,v2,v3),(t1,t2,t3),(n1,n2,n3),m`, all 1-based
//! - skin vertices: `(x,y,z),bone`
//! - versions: `1.0.1`
//! - timestamps: `10/17/2026 09:05:00 PM`
//! - strings: `"text"` (no escapes)

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;
use tpm_math::{Vec2, Vec3};

use crate::mesh::Face;
use crate::scene::Version;

/// Errors that can occur while decoding a raw property value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected a parenthesised tuple, found `{0}`")]
    NotATuple(String),

    #[error("expected {expected} components, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("invalid integer `{0}`")]
    InvalidInteger(String),

    #[error("index 0 is not valid; indices are 1-based")]
    ZeroIndex,

    #[error("expected ',' before `{0}`")]
    ExpectedComma(String),

    #[error("unexpected trailing content `{0}`")]
    TrailingContent(String),

    #[error("invalid version `{0}`, expected major.minor.revision")]
    InvalidVersion(String),

    #[error("malformed timestamp `{0}`, expected m/d/y h:m:s AM|PM")]
    MalformedTimestamp(String),

    #[error("timestamp `{0}` is not a valid date and time")]
    InvalidTimestamp(String),
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Walks a composite value such as a face, one piece at a time.
struct ValueCursor<'a> {
    rest: &'a str,
}

impl<'a> ValueCursor<'a> {
    fn new(raw: &'a str) -> Self {
        Self { rest: raw.trim() }
    }

    /// Consume `( ... )` and return the text between the parens.
    fn tuple(&mut self) -> DecodeResult<&'a str> {
        let rest = self.rest.trim_start();
        let inner = rest
            .strip_prefix('(')
            .and_then(|after| after.find(')').map(|end| (&after[..end], &after[end + 1..])));

        match inner {
            Some((inner, after)) => {
                self.rest = after;
                Ok(inner)
            }
            None => Err(DecodeError::NotATuple(rest.to_string())),
        }
    }

    /// Consume a `,` separator.
    fn comma(&mut self) -> DecodeResult<()> {
        let rest = self.rest.trim_start();
        match rest.strip_prefix(',') {
            Some(after) => {
                self.rest = after;
                Ok(())
            }
            None => Err(DecodeError::ExpectedComma(rest.to_string())),
        }
    }

    /// Consume everything that is left.
    fn remainder(&mut self) -> &'a str {
        std::mem::take(&mut self.rest).trim()
    }

    fn finish(self) -> DecodeResult<()> {
        let rest = self.rest.trim();
        if rest.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingContent(rest.to_string()))
        }
    }
}

/// Split a tuple body into exactly `n` trimmed components.
fn components(inner: &str, n: usize) -> DecodeResult<Vec<&str>> {
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != n {
        return Err(DecodeError::ArityMismatch {
            expected: n,
            found: parts.len(),
        });
    }
    Ok(parts)
}

/// Decode a single float, accepting exponent forms such as `+2.99E8`.
pub fn decode_float(raw: &str) -> DecodeResult<f32> {
    let raw = raw.trim();
    raw.parse::<f32>()
        .map_err(|_| DecodeError::InvalidNumber(raw.to_string()))
}

/// Decode a single non-negative integer.
pub fn decode_uint(raw: &str) -> DecodeResult<u32> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse::<u32>()
            .map_err(|_| DecodeError::InvalidInteger(raw.to_string()))
    } else {
        Err(DecodeError::InvalidInteger(raw.to_string()))
    }
}

/// Decode `(f1,...,fN)` with exactly `n` float components.
pub fn decode_floats(raw: &str, n: usize) -> DecodeResult<Vec<f32>> {
    let mut cursor = ValueCursor::new(raw);
    let inner = cursor.tuple()?;
    cursor.finish()?;
    components(inner, n)?.into_iter().map(decode_float).collect()
}

/// Decode `(i1,...,iN)` with exactly `n` non-negative integer components.
pub fn decode_ints(raw: &str, n: usize) -> DecodeResult<Vec<u32>> {
    let mut cursor = ValueCursor::new(raw);
    let inner = cursor.tuple()?;
    cursor.finish()?;
    components(inner, n)?.into_iter().map(decode_uint).collect()
}

/// Decode `(u,v)`.
pub fn decode_vec2(raw: &str) -> DecodeResult<Vec2> {
    let c = decode_floats(raw, 2)?;
    Ok(Vec2::new(c[0], c[1]))
}

/// Decode `(x,y,z)`.
pub fn decode_vec3(raw: &str) -> DecodeResult<Vec3> {
    let c = decode_floats(raw, 3)?;
    Ok(Vec3::new(c[0], c[1], c[2]))
}

/// Decode `(i,j,k)` exactly as written (no index rebasing).
pub fn decode_ivec3(raw: &str) -> DecodeResult<[u32; 3]> {
    let c = decode_ints(raw, 3)?;
    Ok([c[0], c[1], c[2]])
}

/// Decode a 1-based index triple from a tuple body into 0-based indices.
fn zero_based_triple(inner: &str) -> DecodeResult<[u32; 3]> {
    let parts = components(inner, 3)?;
    let mut out = [0u32; 3];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = decode_uint(part)?
            .checked_sub(1)
            .ok_or(DecodeError::ZeroIndex)?;
    }
    Ok(out)
}

/// Decode a face: `(v1,v2,v3),(t1,t2,t3),(n1,n2,n3),m`.
///
/// Indices are 1-based on the wire and returned 0-based.
pub fn decode_face(raw: &str) -> DecodeResult<Face> {
    let mut cursor = ValueCursor::new(raw);

    let vertices = zero_based_triple(cursor.tuple()?)?;
    cursor.comma()?;
    let uvs = zero_based_triple(cursor.tuple()?)?;
    cursor.comma()?;
    let normals = zero_based_triple(cursor.tuple()?)?;
    cursor.comma()?;

    // Material index runs to the end of the value
    let material = decode_uint(cursor.remainder())?
        .checked_sub(1)
        .ok_or(DecodeError::ZeroIndex)?;
    cursor.finish()?;

    Ok(Face {
        vertices,
        uvs,
        normals,
        material,
    })
}

/// Decode a skin vertex: `(x,y,z),bone`. Bone index `0` is valid.
pub fn decode_skin_vertex(raw: &str) -> DecodeResult<(Vec3, u32)> {
    let mut cursor = ValueCursor::new(raw);

    let c = components(cursor.tuple()?, 3)?;
    let position = Vec3::new(decode_float(c[0])?, decode_float(c[1])?, decode_float(c[2])?);
    cursor.comma()?;
    let bone = decode_uint(cursor.remainder())?;
    cursor.finish()?;

    Ok((position, bone))
}

/// Decode `major.minor.revision`.
pub fn decode_version(raw: &str) -> DecodeResult<Version> {
    let raw = raw.trim();
    let invalid = || DecodeError::InvalidVersion(raw.to_string());

    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = decode_uint(part).map_err(|_| invalid())?;
    }

    Ok(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Split `a<sep>b<sep>c` into three all-digit fields.
fn digit_fields(s: &str, sep: char) -> Option<[u32; 3]> {
    let parts: Vec<&str> = s.split(sep).collect();
    if parts.len() != 3 {
        return None;
    }

    let mut out = [0u32; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    Some(out)
}

/// Decode `m/d/y h:m:s AM|PM` (12-hour clock).
///
/// The shape is required strictly; a well-shaped value naming an impossible
/// date or time (month 13, hour 0) is [`DecodeError::InvalidTimestamp`].
pub fn decode_timestamp(raw: &str) -> DecodeResult<NaiveDateTime> {
    let raw = raw.trim();
    let malformed = || DecodeError::MalformedTimestamp(raw.to_string());
    let invalid = || DecodeError::InvalidTimestamp(raw.to_string());

    let fields: Vec<&str> = raw.split_whitespace().collect();
    let [date, time, meridiem] = fields.as_slice() else {
        return Err(malformed());
    };

    let [month, day, year] = digit_fields(date, '/').ok_or_else(malformed)?;
    let [hour, minute, second] = digit_fields(time, ':').ok_or_else(malformed)?;
    let pm = match *meridiem {
        "AM" => false,
        "PM" => true,
        _ => return Err(malformed()),
    };

    if !(1..=12).contains(&hour) {
        return Err(invalid());
    }
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    let year = i32::try_from(year).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(invalid)
}

/// Strip one pair of enclosing double quotes, if present.
///
/// Unquoted values are returned verbatim.
pub fn decode_string(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.to_string(),
        None => raw.to_string(),
    }
}

/// Render a float with the shortest text that parses back to the same value.
pub fn encode_float(v: f32) -> String {
    format!("{}", v)
}

/// Render `(u,v)`.
pub fn encode_vec2(v: Vec2) -> String {
    format!("({},{})", encode_float(v.x), encode_float(v.y))
}

/// Render `(x,y,z)`.
pub fn encode_vec3(v: Vec3) -> String {
    format!(
        "({},{},{})",
        encode_float(v.x),
        encode_float(v.y),
        encode_float(v.z)
    )
}

/// Render a face with 1-based indices.
pub fn encode_face(face: &Face) -> String {
    let triple = |[a, b, c]: [u32; 3]| format!("({},{},{})", a + 1, b + 1, c + 1);
    format!(
        "{},{},{},{}",
        triple(face.vertices),
        triple(face.uvs),
        triple(face.normals),
        face.material + 1
    )
}

/// Render `(x,y,z),bone`.
pub fn encode_skin_vertex(position: Vec3, bone: u8) -> String {
    format!("{},{}", encode_vec3(position), bone)
}

/// Render `major.minor.revision`.
pub fn encode_version(version: Version) -> String {
    version.to_string()
}

/// Render `mm/dd/yyyy hh:mm:ss AM|PM`.
pub fn encode_timestamp(date: &NaiveDateTime) -> String {
    let (pm, hour) = date.hour12();
    format!(
        "{} {:02}:{:02}:{:02} {}",
        date.format("%m/%d/%Y"),
        hour,
        date.minute(),
        date.second(),
        if pm { "PM" } else { "AM" }
    )
}

/// Wrap text in double quotes, verbatim.
pub fn encode_string(s: &str) -> String {
    format!("\"{}\"", s)
}
