//! Stream primitives for the persisted model format.
//!
//! Every object is written as a sequence of whitespace-terminated tokens and
//! fields. In binary mode, scalars are packed as a one-byte size marker followed
//! by the little-endian value; in text mode they are written as decimal words.
//! Floats in text mode use the shortest representation that parses back to the
//! same value, so text streams round-trip exactly as well.

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{BufRead, Write};

/// Upper bound on elements reserved ahead of reading; counts come from the
/// stream and may be corrupt.
pub(crate) const MAX_PREALLOCATED: usize = 4096;

/// A stream that ends early is malformed, not an I/O failure.
fn stream_error(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::format("unexpected end of stream")
    } else {
        Error::Io(err)
    }
}

fn peek_byte<R: BufRead + ?Sized>(reader: &mut R) -> Result<Option<u8>> {
    let buf = reader.fill_buf()?;
    Ok(buf.first().copied())
}

fn skip_whitespace<R: BufRead + ?Sized>(reader: &mut R) -> Result<()> {
    while let Some(byte) = peek_byte(reader)? {
        if !byte.is_ascii_whitespace() {
            break;
        }
        reader.consume(1);
    }
    Ok(())
}

/// Reads bytes up to (and consuming) the next whitespace byte.
fn read_word<R: BufRead + ?Sized>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    while let Some(byte) = peek_byte(reader)? {
        reader.consume(1);
        if byte.is_ascii_whitespace() {
            break;
        }
        bytes.push(byte);
    }
    if bytes.is_empty() {
        return Err(Error::format("unexpected end of stream"));
    }
    String::from_utf8(bytes).map_err(|_| Error::format("token is not valid UTF-8"))
}

fn read_text_word<R: BufRead + ?Sized>(reader: &mut R) -> Result<String> {
    skip_whitespace(reader)?;
    read_word(reader)
}

fn parse_word<T: std::str::FromStr>(word: &str, what: &str) -> Result<T> {
    word.parse::<T>()
        .map_err(|_| Error::format(format!("expected {}, got '{}'", what, word)))
}

fn read_size_marker<R: BufRead + ?Sized>(reader: &mut R, expected: u8, what: &str) -> Result<()> {
    let size = reader.read_u8().map_err(stream_error)?;
    if size != expected {
        return Err(Error::format(format!(
            "expected {} ({} bytes), got size marker {}",
            what, expected, size
        )));
    }
    Ok(())
}

/// Writes a token followed by a single space.
pub fn write_token<W: Write + ?Sized>(writer: &mut W, _binary: bool, token: &str) -> Result<()> {
    if token.is_empty() || token.bytes().any(|b| b.is_ascii_whitespace()) {
        return Err(Error::format(format!("invalid token '{}'", token)));
    }
    writer.write_all(token.as_bytes())?;
    writer.write_all(b" ")?;
    Ok(())
}

/// Reads the next token. Text mode skips leading whitespace first.
pub fn read_token<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<String> {
    if binary {
        read_word(reader)
    } else {
        read_text_word(reader)
    }
}

/// Reads a token and fails unless it equals `expected`.
pub fn expect_token<R: BufRead + ?Sized>(reader: &mut R, binary: bool, expected: &str) -> Result<()> {
    let token = read_token(reader, binary)?;
    if token != expected {
        return Err(Error::format(format!(
            "expected token '{}', got '{}'",
            expected, token
        )));
    }
    Ok(())
}

/// Accepts either `first second` or just `second`, for readers whose leading
/// type token may already have been consumed by a dispatcher.
pub fn expect_one_or_two_tokens<R: BufRead + ?Sized>(
    reader: &mut R,
    binary: bool,
    first: &str,
    second: &str,
) -> Result<()> {
    let token = read_token(reader, binary)?;
    if token == first {
        expect_token(reader, binary, second)
    } else if token == second {
        Ok(())
    } else {
        Err(Error::format(format!(
            "expected token '{}' or '{}', got '{}'",
            first, second, token
        )))
    }
}

pub fn write_i32<W: Write + ?Sized>(writer: &mut W, binary: bool, value: i32) -> Result<()> {
    if binary {
        writer.write_u8(4)?;
        writer.write_i32::<LittleEndian>(value)?;
    } else {
        write!(writer, "{} ", value)?;
    }
    Ok(())
}

pub fn read_i32<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<i32> {
    if binary {
        read_size_marker(reader, 4, "int32")?;
        reader.read_i32::<LittleEndian>().map_err(stream_error)
    } else {
        parse_word(&read_text_word(reader)?, "int32")
    }
}

/// Writes a dimension or count; stored as int32 in the stream.
pub fn write_usize<W: Write + ?Sized>(writer: &mut W, binary: bool, value: usize) -> Result<()> {
    let value = i32::try_from(value)
        .map_err(|_| Error::format(format!("value {} does not fit the stream format", value)))?;
    write_i32(writer, binary, value)
}

pub fn read_usize<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<usize> {
    let value = read_i32(reader, binary)?;
    usize::try_from(value).map_err(|_| Error::format(format!("negative size {}", value)))
}

pub fn write_f32<W: Write + ?Sized>(writer: &mut W, binary: bool, value: f32) -> Result<()> {
    if binary {
        writer.write_u8(4)?;
        writer.write_f32::<LittleEndian>(value)?;
    } else {
        write!(writer, "{} ", value)?;
    }
    Ok(())
}

pub fn read_f32<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<f32> {
    if binary {
        read_size_marker(reader, 4, "float")?;
        reader.read_f32::<LittleEndian>().map_err(stream_error)
    } else {
        parse_word(&read_text_word(reader)?, "float")
    }
}

pub fn write_f64<W: Write + ?Sized>(writer: &mut W, binary: bool, value: f64) -> Result<()> {
    if binary {
        writer.write_u8(8)?;
        writer.write_f64::<LittleEndian>(value)?;
    } else {
        write!(writer, "{} ", value)?;
    }
    Ok(())
}

pub fn read_f64<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<f64> {
    if binary {
        read_size_marker(reader, 8, "double")?;
        reader.read_f64::<LittleEndian>().map_err(stream_error)
    } else {
        parse_word(&read_text_word(reader)?, "double")
    }
}

/// Booleans are written as the tokens `T` / `F` in both modes.
pub fn write_bool<W: Write + ?Sized>(writer: &mut W, binary: bool, value: bool) -> Result<()> {
    write_token(writer, binary, if value { "T" } else { "F" })
}

pub fn read_bool<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<bool> {
    match read_token(reader, binary)?.as_str() {
        "T" => Ok(true),
        "F" => Ok(false),
        other => Err(Error::format(format!("expected T or F, got '{}'", other))),
    }
}

fn read_text_list<R: BufRead + ?Sized, T: std::str::FromStr>(
    reader: &mut R,
    what: &str,
) -> Result<Vec<T>> {
    expect_token(reader, false, "[")?;
    let mut values = Vec::new();
    loop {
        let word = read_text_word(reader)?;
        if word == "]" {
            return Ok(values);
        }
        values.push(parse_word(&word, what)?);
    }
}

pub fn write_f32_vector<W: Write + ?Sized>(writer: &mut W, binary: bool, values: &[f32]) -> Result<()> {
    if binary {
        write_token(writer, binary, "FV")?;
        write_usize(writer, binary, values.len())?;
        for &v in values {
            writer.write_f32::<LittleEndian>(v)?;
        }
    } else {
        writer.write_all(b"[ ")?;
        for v in values {
            write!(writer, "{} ", v)?;
        }
        writer.write_all(b"]\n")?;
    }
    Ok(())
}

pub fn read_f32_vector<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<Vec<f32>> {
    if binary {
        expect_token(reader, binary, "FV")?;
        let len = read_usize(reader, binary)?;
        let mut values = Vec::with_capacity(len.min(MAX_PREALLOCATED));
        for _ in 0..len {
            values.push(reader.read_f32::<LittleEndian>().map_err(stream_error)?);
        }
        Ok(values)
    } else {
        read_text_list(reader, "float")
    }
}

pub fn write_f64_vector<W: Write + ?Sized>(writer: &mut W, binary: bool, values: &[f64]) -> Result<()> {
    if binary {
        write_token(writer, binary, "DV")?;
        write_usize(writer, binary, values.len())?;
        for &v in values {
            writer.write_f64::<LittleEndian>(v)?;
        }
    } else {
        writer.write_all(b"[ ")?;
        for v in values {
            write!(writer, "{} ", v)?;
        }
        writer.write_all(b"]\n")?;
    }
    Ok(())
}

pub fn read_f64_vector<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<Vec<f64>> {
    if binary {
        expect_token(reader, binary, "DV")?;
        let len = read_usize(reader, binary)?;
        let mut values = Vec::with_capacity(len.min(MAX_PREALLOCATED));
        for _ in 0..len {
            values.push(reader.read_f64::<LittleEndian>().map_err(stream_error)?);
        }
        Ok(values)
    } else {
        read_text_list(reader, "double")
    }
}

/// Matrices carry their shape in both modes: `FM rows cols` then the row-major data.
pub fn write_matrix<W: Write + ?Sized>(writer: &mut W, binary: bool, matrix: &Matrix) -> Result<()> {
    write_token(writer, binary, "FM")?;
    write_usize(writer, binary, matrix.rows())?;
    write_usize(writer, binary, matrix.cols())?;
    if binary {
        for &v in matrix.data() {
            writer.write_f32::<LittleEndian>(v)?;
        }
    } else {
        writer.write_all(b"[\n")?;
        for r in 0..matrix.rows() {
            for v in matrix.row(r) {
                write!(writer, "{} ", v)?;
            }
            writer.write_all(b"\n")?;
        }
        writer.write_all(b"]\n")?;
    }
    Ok(())
}

pub fn read_matrix<R: BufRead + ?Sized>(reader: &mut R, binary: bool) -> Result<Matrix> {
    expect_token(reader, binary, "FM")?;
    let rows = read_usize(reader, binary)?;
    let cols = read_usize(reader, binary)?;
    let len = rows
        .checked_mul(cols)
        .ok_or_else(|| Error::format(format!("matrix shape {}x{} is too large", rows, cols)))?;
    let data = if binary {
        let mut data = Vec::with_capacity(len.min(MAX_PREALLOCATED));
        for _ in 0..len {
            data.push(reader.read_f32::<LittleEndian>().map_err(stream_error)?);
        }
        data
    } else {
        read_text_list(reader, "float")?
    };
    Matrix::from_vec(rows, cols, data).map_err(|_| {
        Error::format(format!("matrix data does not match its {}x{} shape", rows, cols))
    })
}
