//! Decoding of the IDX files MNIST is distributed in.
//!
//! Every file is a big endian header, a magic number followed by one `u32` per dimension,
//! and then the unsigned bytes of the data in row-major order.

use std::io::{self, Read};

use ndarray::{Array1, Array3};

/// Magic number of an IDX file of `u8` with three dimensions.
pub const IMAGES_MAGIC: u32 = 0x0000_0803;

/// Magic number of an IDX file of `u8` with a single dimension.
pub const LABELS_MAGIC: u32 = 0x0000_0801;

/// Reads an images file into a `[count, rows, cols]` array.
///
/// # Returns
/// An `InvalidData` error if the header is wrong or the body doesn't match it, or
/// `UnexpectedEof` if the file is truncated.
pub fn read_images<R: Read>(reader: &mut R) -> io::Result<Array3<u8>> {
    expect_magic(reader, IMAGES_MAGIC)?;
    let count = read_u32(reader)? as usize;
    let rows = read_u32(reader)? as usize;
    let cols = read_u32(reader)? as usize;

    if rows == 0 || cols == 0 {
        return Err(invalid(format!("images of {rows}x{cols} pixels")));
    }

    let len = rows
        .checked_mul(cols)
        .and_then(|pixels| pixels.checked_mul(count))
        .ok_or_else(|| invalid(format!("{count} images of {rows}x{cols} don't fit in memory")))?;

    let data = read_body(reader, len)?;
    Array3::from_shape_vec((count, rows, cols), data).map_err(|e| invalid(e.to_string()))
}

/// Reads a labels file into a `[count]` array.
pub fn read_labels<R: Read>(reader: &mut R) -> io::Result<Array1<u8>> {
    expect_magic(reader, LABELS_MAGIC)?;
    let count = read_u32(reader)? as usize;
    let data = read_body(reader, count)?;
    Ok(Array1::from(data))
}

fn expect_magic<R: Read>(reader: &mut R, expected: u32) -> io::Result<()> {
    let magic = read_u32(reader)?;
    if magic != expected {
        return Err(invalid(format!(
            "bad magic number {magic:#010x}, expected {expected:#010x}"
        )));
    }

    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_body<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    // The header can claim more than the file holds.
    let mut data = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes of data, found {}", data.len()),
        ));
    }

    if reader.read(&mut [0])? != 0 {
        return Err(invalid(format!("trailing bytes after {len} bytes of data")));
    }

    Ok(data)
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn to_u32(dim: usize) -> io::Result<u32> {
    u32::try_from(dim).map_err(|e| invalid(format!("dimension {dim} doesn't fit the header: {e}")))
}

/// Encodes an images file, the inverse of `read_images`.
pub fn write_images<W: io::Write>(writer: &mut W, images: &Array3<u8>) -> io::Result<()> {
    let (count, rows, cols) = images.dim();
    for v in [IMAGES_MAGIC, to_u32(count)?, to_u32(rows)?, to_u32(cols)?] {
        writer.write_all(&v.to_be_bytes())?;
    }
    let bytes: Vec<u8> = images.iter().copied().collect();
    writer.write_all(&bytes)
}

/// Encodes a labels file, the inverse of `read_labels`.
pub fn write_labels<W: io::Write>(writer: &mut W, labels: &Array1<u8>) -> io::Result<()> {
    for v in [LABELS_MAGIC, to_u32(labels.len())?] {
        writer.write_all(&v.to_be_bytes())?;
    }
    let bytes: Vec<u8> = labels.iter().copied().collect();
    writer.write_all(&bytes)
}
