//! Fixed-width ASCII field codec used by every header field.
//!
//! Each field occupies an exact number of bytes. Text is right-padded with
//! spaces on write and trailing spaces are stripped on read. Numeric fields are
//! trimmed on both sides before parsing.

use std::io::{Read, Write};
use std::str::FromStr;

use crate::error::{EdfError, Result};

/// Reads exactly `width` bytes and returns them as text without trailing spaces.
pub fn read_text<R: Read>(reader: &mut R, width: usize) -> Result<String> {
    let mut buf = vec![0u8; width];
    reader.read_exact(&mut buf)?;
    Ok(decode_text(&buf))
}

/// Decodes a raw field slice. Leading spaces are format-significant and kept.
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches(' ').to_string()
}

/// Reads a numeric field of `width` bytes.
///
/// `name` identifies the field in the error message.
pub fn read_number<R: Read, T: FromStr>(reader: &mut R, width: usize, name: &str) -> Result<T> {
    let text = read_text(reader, width)?;
    parse_number(&text, name)
}

pub fn parse_number<T: FromStr>(text: &str, name: &str) -> Result<T> {
    let trimmed = text.trim();
    trimmed
        .parse()
        .map_err(|_| EdfError::MalformedHeader(format!("{} is not a number: {:?}", name, trimmed)))
}

/// Writes `value` into exactly `width` bytes.
///
/// Longer values are truncated, shorter ones are padded with spaces. Every
/// character must be printable ASCII (32..=126).
pub fn write_text<W: Write>(writer: &mut W, value: &str, width: usize, field: &'static str) -> Result<()> {
    writer.write_all(&encode_text(value, width, field)?)?;
    Ok(())
}

pub fn encode_text(value: &str, width: usize, field: &'static str) -> Result<Vec<u8>> {
    if let Some(character) = value.chars().find(|c| !(' '..='~').contains(c)) {
        return Err(EdfError::InvalidCharacter { field, character });
    }

    // 已验证为 ASCII，按字节截断即按字符截断
    let mut bytes = value.as_bytes()[..value.len().min(width)].to_vec();
    bytes.resize(width, b' ');
    Ok(bytes)
}

/// Writes a number using the shortest text that fits `width`.
pub fn write_number<W: Write>(writer: &mut W, value: f64, width: usize, field: &'static str) -> Result<()> {
    let text = format_number(value, width).ok_or_else(|| {
        EdfError::MalformedHeader(format!("{} value {} does not fit in {} characters", field, value, width))
    })?;
    write_text(writer, &text, width, field)
}

/// Formats `value` in at most `width` characters, dropping fractional digits
/// as needed. Returns `None` when even the integer part is too wide.
pub fn format_number(value: f64, width: usize) -> Option<String> {
    if !value.is_finite() {
        return None;
    }

    let shortest = value.to_string();
    if shortest.len() <= width {
        return Some(shortest);
    }

    (0..width)
        .rev()
        .map(|precision| trim_fraction(&format!("{:.*}", precision, value)))
        .find(|text| text.len() <= width)
}

fn trim_fraction(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}
