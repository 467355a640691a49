//! Reader for MATLAB Level 5 MAT files.
//!
//! Only what the augmented label sets need is decoded: numeric arrays and
//! struct arrays (first element), with or without zlib compression, in either
//! byte order. Cell, sparse, char and object arrays are kept as
//! [`MatValue::Unsupported`] so that sibling fields remain reachable.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use seg_core::{Error, Result};
use tracing::debug;

const HEADER_LEN: usize = 128;
const VERSION_5: u16 = 0x0100;

// Data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

// Array classes
const MX_STRUCT: u8 = 2;
const MX_DOUBLE: u8 = 6;
const MX_UINT64: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

/// A numeric array, stored row-major (last dimension varies fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct MatArray {
    /// Dimensions as MATLAB reports them (rows, cols, ...)
    pub dims: Vec<usize>,
    /// Real part, converted to `f64`
    pub data: Vec<f64>,
}

impl MatArray {
    /// Height and width of a 2-D array; trailing singleton dimensions are ignored.
    pub fn plane_dims(&self) -> Result<(usize, usize)> {
        match self.dims.as_slice() {
            [rows, cols, rest @ ..] if rest.iter().all(|&d| d == 1) => Ok((*rows, *cols)),
            _ => Err(Error::Mat(format!(
                "expected a 2-D array, got dimensions {:?}",
                self.dims
            ))),
        }
    }

    /// Value at (row, col) of a 2-D array
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let (rows, cols) = self.plane_dims().ok()?;
        if row >= rows || col >= cols {
            return None;
        }
        self.data.get(row * cols + col).copied()
    }
}

/// A decoded MAT variable or struct field.
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    Numeric(MatArray),
    /// Fields of the first struct element, in declaration order
    Struct(Vec<(String, MatValue)>),
    /// Array class this reader does not decode
    Unsupported { class: u8 },
}

impl MatValue {
    /// Looks up a field of a struct value
    pub fn field(&self, name: &str) -> Option<&MatValue> {
        match self {
            MatValue::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// All top-level variables of a MAT file
#[derive(Debug, Clone, Default)]
pub struct MatFile {
    variables: Vec<(String, MatValue)>,
}

impl MatFile {
    /// Reads and decodes a MAT file from disk
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            Error::NotFound(format!("Failed to read MAT file {}: {e}", path.display()))
        })?;
        Self::parse(&bytes).map_err(|e| match e {
            Error::Mat(msg) => Error::Mat(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Decodes a MAT file held in memory
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Mat("file shorter than the 128-byte header".to_string()));
        }

        let endian = match &bytes[126..128] {
            b"IM" => Endian::Little,
            b"MI" => Endian::Big,
            _ => {
                return Err(Error::Mat(
                    "missing endian indicator, not a Level 5 MAT file".to_string(),
                ))
            }
        };
        let version_bytes = [bytes[124], bytes[125]];
        let version = match endian {
            Endian::Little => u16::from_le_bytes(version_bytes),
            Endian::Big => u16::from_be_bytes(version_bytes),
        };
        if version != VERSION_5 {
            return Err(Error::Mat(format!(
                "unsupported MAT version 0x{version:04x} (v7.3 HDF5 files are not supported)"
            )));
        }

        let mut cursor = Cursor::new(&bytes[HEADER_LEN..], endian);
        let mut variables = Vec::new();

        while cursor.remaining() >= 8 {
            let element = cursor.read_element()?;
            match element.data_type {
                MI_COMPRESSED => {
                    let mut inflated = Vec::new();
                    ZlibDecoder::new(element.data)
                        .read_to_end(&mut inflated)
                        .map_err(|e| Error::Mat(format!("failed to inflate element: {e}")))?;
                    let mut inner = Cursor::new(&inflated, endian);
                    let matrix = inner.read_element()?;
                    if matrix.data_type == MI_MATRIX {
                        variables.push(parse_matrix(matrix.data, endian)?);
                    }
                }
                MI_MATRIX => variables.push(parse_matrix(element.data, endian)?),
                other => debug!("Skipping top-level MAT element of type {}", other),
            }
        }

        Ok(Self { variables })
    }

    /// Names of the top-level variables
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|(name, _)| name.as_str())
    }

    /// Looks up a variable or a nested struct field by dotted path, e.g. `GTcls.Segmentation`
    pub fn get(&self, path: &str) -> Option<&MatValue> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut value = self
            .variables
            .iter()
            .find(|(name, _)| name == first)
            .map(|(_, v)| v)?;
        for part in parts {
            value = value.field(part)?;
        }
        Some(value)
    }

    /// Like [`MatFile::get`] but requires a numeric array
    pub fn numeric(&self, path: &str) -> Result<&MatArray> {
        match self.get(path) {
            Some(MatValue::Numeric(array)) => Ok(array),
            Some(_) => Err(Error::Mat(format!("'{path}' is not a numeric array"))),
            None => Err(Error::NotFound(format!("MAT variable '{path}'"))),
        }
    }
}

struct Element<'a> {
    data_type: u32,
    data: &'a [u8],
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Mat(format!(
                "truncated element: wanted {n} bytes, {} left",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Reads one tagged data element, consuming its padding
    fn read_element(&mut self) -> Result<Element<'a>> {
        let first = self.u32()?;
        let small_len = (first >> 16) as usize;

        if small_len != 0 {
            // Small data element: tag and up to 4 bytes of data share 8 bytes
            let data_type = first & 0xffff;
            if small_len > 4 {
                return Err(Error::Mat(format!("small element claims {small_len} bytes")));
            }
            let data = &self.take(4)?[..small_len];
            return Ok(Element { data_type, data });
        }

        let data_type = first;
        let len = self.u32()? as usize;
        let data = self.take(len)?;
        if data_type != MI_COMPRESSED {
            let padding = (8 - len % 8) % 8;
            self.pos += padding.min(self.remaining());
        }
        Ok(Element { data_type, data })
    }
}

fn parse_matrix(bytes: &[u8], endian: Endian) -> Result<(String, MatValue)> {
    if bytes.is_empty() {
        return Ok((String::new(), MatValue::Unsupported { class: 0 }));
    }

    let mut cursor = Cursor::new(bytes, endian);

    let flags = cursor.read_element()?;
    if flags.data_type != MI_UINT32 || flags.data.len() < 8 {
        return Err(Error::Mat("malformed array flags".to_string()));
    }
    // Low byte of the first flags word is the array class
    let class = decode_numeric(MI_UINT32, &flags.data[..4], endian)?[0] as u32 as u8;

    let dims_element = cursor.read_element()?;
    let dims: Vec<usize> = decode_numeric(dims_element.data_type, dims_element.data, endian)?
        .into_iter()
        .map(|d| d.max(0.0) as usize)
        .collect();

    let name_element = cursor.read_element()?;
    let name = String::from_utf8_lossy(name_element.data)
        .trim_end_matches('\0')
        .to_string();

    let value = match class {
        MX_DOUBLE..=MX_UINT64 => {
            let real = cursor.read_element()?;
            let column_major = decode_numeric(real.data_type, real.data, endian)?;
            let expected: usize = dims.iter().product();
            if column_major.len() != expected {
                return Err(Error::Mat(format!(
                    "array '{name}' holds {} values but dimensions {:?} need {expected}",
                    column_major.len(),
                    dims
                )));
            }
            MatValue::Numeric(MatArray {
                data: to_row_major(column_major, &dims),
                dims,
            })
        }
        MX_STRUCT => MatValue::Struct(parse_struct_fields(&mut cursor, &dims, endian)?),
        other => {
            debug!("Skipping MAT array '{}' of class {}", name, other);
            MatValue::Unsupported { class: other }
        }
    };

    Ok((name, value))
}

fn parse_struct_fields(
    cursor: &mut Cursor<'_>,
    dims: &[usize],
    endian: Endian,
) -> Result<Vec<(String, MatValue)>> {
    let name_len_element = cursor.read_element()?;
    let name_len = decode_numeric(name_len_element.data_type, name_len_element.data, endian)?
        .first()
        .copied()
        .unwrap_or(0.0) as usize;
    if name_len == 0 {
        return Err(Error::Mat("struct field name length is zero".to_string()));
    }

    let names_element = cursor.read_element()?;
    let field_names: Vec<String> = names_element
        .data
        .chunks(name_len)
        .map(|chunk| {
            let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
            String::from_utf8_lossy(&chunk[..end]).to_string()
        })
        .collect();

    let num_elements: usize = dims.iter().product();
    let mut fields = Vec::with_capacity(field_names.len());

    for element_idx in 0..num_elements {
        for field_name in &field_names {
            let sub = cursor.read_element()?;
            if sub.data_type != MI_MATRIX {
                return Err(Error::Mat(format!(
                    "field '{field_name}' is not a matrix element (type {})",
                    sub.data_type
                )));
            }
            // Later elements only need to be consumed
            if element_idx == 0 {
                let (_, value) = parse_matrix(sub.data, endian)?;
                fields.push((field_name.clone(), value));
            }
        }
    }

    Ok(fields)
}

macro_rules! decode_as {
    ($ty:ty, $bytes:expr, $endian:expr) => {{
        const WIDTH: usize = std::mem::size_of::<$ty>();
        $bytes
            .chunks_exact(WIDTH)
            .map(|chunk| {
                let mut raw = [0u8; WIDTH];
                raw.copy_from_slice(chunk);
                let value = match $endian {
                    Endian::Little => <$ty>::from_le_bytes(raw),
                    Endian::Big => <$ty>::from_be_bytes(raw),
                };
                value as f64
            })
            .collect::<Vec<f64>>()
    }};
}

fn decode_numeric(data_type: u32, bytes: &[u8], endian: Endian) -> Result<Vec<f64>> {
    let values = match data_type {
        MI_INT8 => decode_as!(i8, bytes, endian),
        MI_UINT8 => decode_as!(u8, bytes, endian),
        MI_INT16 => decode_as!(i16, bytes, endian),
        MI_UINT16 => decode_as!(u16, bytes, endian),
        MI_INT32 => decode_as!(i32, bytes, endian),
        MI_UINT32 => decode_as!(u32, bytes, endian),
        MI_SINGLE => decode_as!(f32, bytes, endian),
        MI_DOUBLE => decode_as!(f64, bytes, endian),
        MI_INT64 => decode_as!(i64, bytes, endian),
        MI_UINT64 => decode_as!(u64, bytes, endian),
        other => {
            return Err(Error::Mat(format!("unsupported numeric data type {other}")));
        }
    };
    Ok(values)
}

/// MATLAB stores the first dimension fastest; callers index the last one fastest.
fn to_row_major(column_major: Vec<f64>, dims: &[usize]) -> Vec<f64> {
    if dims.len() < 2 || column_major.len() <= 1 {
        return column_major;
    }

    let mut out = vec![0.0; column_major.len()];
    let mut index = vec![0usize; dims.len()];

    for (row_pos, slot) in out.iter_mut().enumerate() {
        let mut rem = row_pos;
        for d in (0..dims.len()).rev() {
            index[d] = rem % dims[d];
            rem /= dims[d];
        }

        let mut offset = 0;
        let mut stride = 1;
        for d in 0..dims.len() {
            offset += index[d] * stride;
            stride *= dims[d];
        }
        *slot = column_major[offset];
    }

    out
}
