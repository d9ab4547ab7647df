//! Decoding of raw field bytes into typed values.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, warn};

use crate::format::{JetVersion, TypeCode};
use crate::props::PropertyMap;

/// Access epoch: day zero of the datetime type.
fn access_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
}

/// A decoded field value.
///
/// One variant per recognized type code plus `Null` for absent values and
/// `Unknown` for codes outside the decoder table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    /// Rendered currency amount (raw i64 scaled by 10^4)
    Currency(String),
    Float32(f32),
    Float64(f64),
    /// Rendered timestamp; `(Empty Date)` for the exact epoch,
    /// `(Invalid Date)` when the double does not fit the calendar
    DateTime(String),
    Binary(Vec<u8>),
    Text(String),
    Ole(Vec<u8>),
    Memo(String),
    /// Canonical UUID rendering of the 16 raw bytes
    Guid(String),
    /// Rendered scaled decimal
    Decimal(String),
    /// Reference into a complex-column table
    Complex(i32),
    Unknown(Vec<u8>),
}

impl Value {
    /// True for `Null` and for `Unknown` placeholders.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) | Self::Complex(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Memo(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) | Self::Ole(b) | Self::Unknown(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) | Self::Complex(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Currency(s) | Self::DateTime(s) | Self::Guid(s) | Self::Decimal(s) => {
                f.write_str(s)
            }
            Self::Text(s) | Self::Memo(s) => f.write_str(s),
            Self::Binary(b) | Self::Ole(b) | Self::Unknown(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Decode `buffer` as `type_code`.
///
/// Memo fields are not handled here: their payload needs page access to
/// chase LVAL pointers, so the record reader resolves them first and then
/// decodes the payload as text. Booleans live in the null bitmap and never
/// reach this function either.
pub fn decode(
    type_code: u8,
    buffer: &[u8],
    version: JetVersion,
    props: Option<&PropertyMap>,
) -> Value {
    let Ok(kind) = TypeCode::try_from(type_code) else {
        debug!("unsupported data type: {type_code}");
        return Value::Unknown(buffer.to_vec());
    };
    match kind {
        // Handled by the record reader from the null bitmap.
        TypeCode::Boolean => Value::Null,
        TypeCode::Int8 => match take::<1>(buffer) {
            Some(b) => Value::Int8(i8::from_le_bytes(b)),
            None => Value::Null,
        },
        TypeCode::Int16 => match take::<2>(buffer) {
            Some(b) => Value::Int16(i16::from_le_bytes(b)),
            None => Value::Null,
        },
        TypeCode::Int32 => match take::<4>(buffer) {
            Some(b) => Value::Int32(i32::from_le_bytes(b)),
            None => Value::Null,
        },
        TypeCode::Complex => match take::<4>(buffer) {
            Some(b) => Value::Complex(i32::from_le_bytes(b)),
            None => Value::Null,
        },
        TypeCode::Currency => match take::<8>(buffer) {
            Some(b) => Value::Currency(render_currency(i64::from_le_bytes(b), props)),
            None => Value::Null,
        },
        TypeCode::Float32 => match take::<4>(buffer) {
            Some(b) => Value::Float32(f32::from_le_bytes(b)),
            None => Value::Null,
        },
        TypeCode::Float64 => match take::<8>(buffer) {
            Some(b) => Value::Float64(f64::from_le_bytes(b)),
            None => Value::Null,
        },
        TypeCode::DateTime => match take::<8>(buffer) {
            Some(b) => Value::DateTime(render_datetime(f64::from_le_bytes(b))),
            None => Value::Null,
        },
        TypeCode::Binary => Value::Binary(buffer.to_vec()),
        TypeCode::Ole => Value::Ole(buffer.to_vec()),
        // Resolved by the record reader; raw descriptor bytes otherwise.
        TypeCode::Memo => Value::Binary(buffer.to_vec()),
        TypeCode::Guid => match take::<16>(buffer) {
            Some(b) => Value::Guid(uuid::Uuid::from_bytes(b).to_string()),
            None => Value::Null,
        },
        TypeCode::Decimal => match take::<17>(buffer) {
            Some(b) => Value::Decimal(render_decimal(&b, 6)),
            None => Value::Null,
        },
        TypeCode::Text => Value::Text(decode_text(buffer, version)),
    }
}

fn take<const N: usize>(buffer: &[u8]) -> Option<[u8; N]> {
    let bytes = buffer.get(..N)?;
    Some(bytes.try_into().unwrap())
}

/// Days-since-1899-12-30 double, rendered as `YYYY-MM-DD HH:MM:SS`.
pub fn render_datetime(days: f64) -> String {
    if !days.is_finite() {
        return "(Invalid Date)".to_string();
    }
    let whole = days.trunc();
    let frac_secs = days.fract() * 86_400.0;
    if whole.abs() > 3_000_000.0 {
        return "(Invalid Date)".to_string();
    }
    let moment = access_epoch()
        .checked_add_signed(Duration::days(whole as i64))
        .and_then(|d| d.checked_add_signed(Duration::milliseconds((frac_secs * 1_000.0) as i64)));
    match moment {
        Some(m) if m == access_epoch() => "(Empty Date)".to_string(),
        Some(m) => m.to_string(),
        None => "(Invalid Date)".to_string(),
    }
}

/// 17-byte decimal: sign byte, then four 32-bit little-endian limbs
/// combined most-significant-first into a 128-bit integer, scaled by
/// `10^-scale`.
pub fn render_decimal(bytes: &[u8; 17], scale: u8) -> String {
    let limb = |i: usize| {
        u128::from(u32::from_le_bytes([
            bytes[1 + i * 4],
            bytes[2 + i * 4],
            bytes[3 + i * 4],
            bytes[4 + i * 4],
        ]))
    };
    let magnitude = (limb(0) << 96) | (limb(1) << 64) | (limb(2) << 32) | limb(3);
    let digits = magnitude.to_string();
    let scale = scale as usize;
    let unsigned = if scale == 0 {
        digits
    } else if digits.len() > scale {
        let split = digits.len() - scale;
        format!("{}.{}", &digits[..split], &digits[split..])
    } else {
        format!("0.{}{}", "0".repeat(scale - digits.len()), digits)
    };
    if bytes[0] != 0 {
        format!("-{unsigned}")
    } else {
        unsigned
    }
}

/// Currency: i64 scaled by 10^4. A `Format` property hint, when present,
/// supplies the literal rendered for zero and a literal prefix (such as a
/// currency symbol) for everything else.
pub fn render_currency(units: i64, props: Option<&PropertyMap>) -> String {
    let format = props
        .and_then(|p| p.get("Format"))
        .and_then(Value::as_str);
    if let Some(format) = format {
        let sections: Vec<&str> = format.split(';').collect();
        if units == 0 {
            if let Some(zero) = sections.get(2).copied().filter(|s| !s.is_empty()) {
                return format_literal(zero);
            }
        }
        let section = if units < 0 {
            sections.get(1).copied().unwrap_or(sections[0])
        } else {
            sections[0]
        };
        return format!("{}{}", literal_prefix(section), render_scaled(units));
    }
    render_scaled(units)
}

fn render_scaled(units: i64) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let magnitude = units.unsigned_abs();
    let whole = magnitude / 10_000;
    let frac = magnitude % 10_000;
    if frac == 0 {
        return format!("{sign}{whole}");
    }
    let mut frac = format!("{frac:04}");
    while frac.ends_with('0') {
        frac.pop();
    }
    format!("{sign}{whole}.{frac}")
}

/// Strip quoting from a format-section literal (`"none"` -> `none`).
fn format_literal(section: &str) -> String {
    section.replace(['"', '\\'], "")
}

/// Leading characters of a format section that are not digit placeholders.
fn literal_prefix(section: &str) -> String {
    section
        .chars()
        .take_while(|c| !matches!(c, '#' | '0' | '.' | ',' | '-' | '+'))
        .filter(|&c| c != '"' && c != '\\')
        .collect()
}

/// Single-byte text (Jet 3 strings are Windows-1252).
pub(crate) fn decode_single_byte(bytes: &[u8]) -> String {
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    text.into_owned()
}

pub(crate) fn decode_utf16le(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::UTF_16LE.decode(bytes);
    if had_errors {
        warn!("lossy UTF-16 decode of {} bytes", bytes.len());
    }
    text.into_owned()
}

/// Text decoding. Jet 3 stores single-byte Windows-1252. Jet 4+ stores
/// UTF-16LE, optionally in the compressed framing: after an `FF FE`
/// prefix the payload alternates compressed and uncompressed segments
/// separated by single NUL bytes, starting compressed; compressed bytes
/// expand to UTF-16 code units with a zero high byte.
pub fn decode_text(bytes: &[u8], version: JetVersion) -> String {
    if !version.is_v4_plus() {
        return decode_single_byte(bytes);
    }
    if let Some(compressed) = bytes.strip_prefix(&[0xff, 0xfe]) {
        return decode_utf16le(&expand_compressed(compressed));
    }
    decode_utf16le(bytes)
}

fn expand_compressed(bytes: &[u8]) -> Vec<u8> {
    let mut utf16 = Vec::with_capacity(bytes.len() * 2);
    let mut compressed = true;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == 0 {
            // Single NUL terminates the current segment and flips modes.
            compressed = !compressed;
            i += 1;
        } else if compressed {
            utf16.push(bytes[i]);
            utf16.push(0);
            i += 1;
        } else {
            // Uncompressed segments are whole UTF-16LE code units; a unit
            // with an ASCII low byte still carries its NUL high byte here.
            utf16.push(bytes[i]);
            utf16.push(bytes.get(i + 1).copied().unwrap_or(0));
            i += 2;
        }
    }
    utf16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn datetime_rendering() {
        assert_eq!("(Empty Date)", render_datetime(0.0));
        assert_eq!("1899-12-31 12:00:00", render_datetime(1.5));
        assert_eq!("1900-01-01 00:00:00", render_datetime(2.0));
        assert_eq!("(Invalid Date)", render_datetime(f64::NAN));
        assert_eq!("(Invalid Date)", render_datetime(1.0e18));
    }

    #[test]
    fn decimal_rendering() {
        // 149804168 in the most significant limb position is enormous;
        // the value lives in the least significant limb.
        let mut bytes = [0u8; 17];
        bytes[13..17].copy_from_slice(&149_804_168u32.to_le_bytes());
        assert_eq!("149.804168", render_decimal(&bytes, 6));
        assert_eq!("0.0149804168", render_decimal(&bytes, 10));
        bytes[0] = 1;
        assert_eq!("-149.804168", render_decimal(&bytes, 6));
    }

    #[test]
    fn decimal_zero_scale() {
        let mut bytes = [0u8; 17];
        bytes[13..17].copy_from_slice(&42u32.to_le_bytes());
        assert_eq!("42", render_decimal(&bytes, 0));
    }

    #[test]
    fn decimal_high_limb() {
        let mut bytes = [0u8; 17];
        bytes[9..13].copy_from_slice(&1u32.to_le_bytes());
        // limb 2 value 1 => 2^32, scale 0
        assert_eq!("4294967296", render_decimal(&bytes, 0));
    }

    #[test]
    fn currency_rendering() {
        assert_eq!("1.2345", render_currency(12_345, None));
        assert_eq!("-2", render_currency(-20_000, None));
        assert_eq!("0", render_currency(0, None));
        assert_eq!("1.5", render_currency(15_000, None));

        let mut props: PropertyMap = HashMap::new();
        props.insert(
            "Format".to_string(),
            Value::Text("$#,##0.00;-$#,##0.00;\"free\"".to_string()),
        );
        assert_eq!("free", render_currency(0, Some(&props)));
        assert_eq!("$1.5", render_currency(15_000, Some(&props)));
    }

    #[test]
    fn text_v3_is_windows_1252() {
        // 0x80 is the euro sign in Windows-1252.
        assert_eq!("caf\u{20ac}", decode_text(b"caf\x80", JetVersion::V3));
    }

    #[test]
    fn text_v4_plain_utf16() {
        let bytes = [0x48, 0x00, 0x69, 0x00];
        assert_eq!("Hi", decode_text(&bytes, JetVersion::V4));
    }

    #[test]
    fn text_v4_compressed() {
        // Spec scenario: FF FE 48 00 69 00 -> "Hi". The first segment is
        // compressed ("H"), the NUL switches modes, and "i" arrives as an
        // uncompressed UTF-16 unit.
        let bytes = [0xff, 0xfe, 0x48, 0x00, 0x69, 0x00];
        assert_eq!("Hi", decode_text(&bytes, JetVersion::V4));
    }

    #[test]
    fn text_v4_fully_compressed() {
        let bytes = [0xff, 0xfe, b'a', b'b', b'c'];
        assert_eq!("abc", decode_text(&bytes, JetVersion::V4));
    }

    #[test]
    fn guid_decoding() {
        let mut raw = [0u8; 16];
        raw[15] = 0x42;
        let v = decode(15, &raw, JetVersion::V3, None);
        assert_eq!(
            Value::Guid("00000000-0000-0000-0000-000000000042".to_string()),
            v
        );
    }

    #[test]
    fn unknown_type_code() {
        let v = decode(13, &[1, 2, 3], JetVersion::V3, None);
        assert_eq!(Value::Unknown(vec![1, 2, 3]), v);
        assert_eq!("010203", v.to_string());
    }

    #[test]
    fn integer_decoding_is_idempotent() {
        let raw = 0x1234_5678i32.to_le_bytes();
        let first = decode(4, &raw, JetVersion::V4, None);
        let second = decode(4, &raw, JetVersion::V4, None);
        assert_eq!(first, second);
        assert_eq!(Value::Int32(0x1234_5678), first);
    }

    #[test]
    fn short_buffers_decode_to_null() {
        assert_eq!(Value::Null, decode(4, &[1, 2], JetVersion::V3, None));
        assert_eq!(Value::Null, decode(8, &[], JetVersion::V3, None));
    }
}
