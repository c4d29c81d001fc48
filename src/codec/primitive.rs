// src/codec/primitive.rs

//! Fixed-width integers and length-prefixed strings.
//!
//! All integers are big-endian. Strings are a `u32` byte length followed by
//! that many UTF-8 bytes, with no terminator. Readers take the cursor by
//! `&mut` so consecutive fields advance a single offset.

use std::io::{Cursor, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::FormatError;

/// Read-side cursor over a complete track buffer.
pub type ByteCursor<'a> = Cursor<&'a [u8]>;

/// Bytes left between the cursor and the end of the buffer.
pub fn remaining(cursor: &ByteCursor<'_>) -> u64 {
    let len = cursor.get_ref().len() as u64;
    len.saturating_sub(cursor.position())
}

/// Whether the cursor has consumed the whole buffer.
pub fn is_exhausted(cursor: &ByteCursor<'_>) -> bool {
    remaining(cursor) == 0
}

fn ensure(cursor: &ByteCursor<'_>, needed: u64) -> Result<(), FormatError> {
    let available = remaining(cursor);
    if available < needed {
        return Err(FormatError::OutOfBounds {
            offset: cursor.position(),
            needed,
            available,
        });
    }
    Ok(())
}

pub fn read_u8(cursor: &mut ByteCursor<'_>) -> Result<u8, FormatError> {
    ensure(cursor, 1)?;
    Ok(cursor.read_u8()?)
}

pub fn read_u16(cursor: &mut ByteCursor<'_>) -> Result<u16, FormatError> {
    ensure(cursor, 2)?;
    Ok(cursor.read_u16::<BigEndian>()?)
}

pub fn read_u32(cursor: &mut ByteCursor<'_>) -> Result<u32, FormatError> {
    ensure(cursor, 4)?;
    Ok(cursor.read_u32::<BigEndian>()?)
}

/// Read a length-prefixed UTF-8 string.
///
/// The declared length is checked against the remaining bytes before
/// anything is allocated.
pub fn read_string(cursor: &mut ByteCursor<'_>) -> Result<String, FormatError> {
    let len = read_u32(cursor)? as u64;
    ensure(cursor, len)?;

    let start = cursor.position();
    let end = start + len;
    let bytes = &cursor.get_ref()[start as usize..end as usize];
    let text = std::str::from_utf8(bytes)
        .map_err(|_| FormatError::InvalidUtf8 { offset: start })?
        .to_owned();

    cursor.set_position(end);
    Ok(text)
}

pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> Result<(), FormatError> {
    writer.write_u8(value)?;
    Ok(())
}

pub fn write_u16<W: Write>(writer: &mut W, value: u16) -> Result<(), FormatError> {
    writer.write_u16::<BigEndian>(value)?;
    Ok(())
}

pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<(), FormatError> {
    writer.write_u32::<BigEndian>(value)?;
    Ok(())
}

/// Write a `u16` element count, rejecting lists that do not fit.
pub fn write_count<W: Write>(
    writer: &mut W,
    context: &'static str,
    len: usize,
) -> Result<(), FormatError> {
    let count = u16::try_from(len).map_err(|_| FormatError::TooLong {
        context,
        len,
        max: u16::MAX as usize,
    })?;
    write_u16(writer, count)
}

/// Write a length-prefixed UTF-8 string.
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), FormatError> {
    let len = u32::try_from(value.len()).map_err(|_| FormatError::TooLong {
        context: "string",
        len: value.len(),
        max: u32::MAX as usize,
    })?;
    write_u32(writer, len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}
