use serde::Serialize;
use thiserror::Error;

/// Byte order of a multi-byte integer field.
///
/// `Native` is kept symbolic so that generated code can use the platform
/// byte order; [`Endian::resolve`] maps it to a concrete order when bytes
/// are actually read or written on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Endian {
    #[default]
    Native,
    Little,
    Big,
}

impl Endian {
    /// Map `Native` to the byte order of the running host.
    pub fn resolve(self) -> Endian {
        match self {
            Endian::Native if cfg!(target_endian = "big") => Endian::Big,
            Endian::Native => Endian::Little,
            other => other,
        }
    }

    /// The type suffix used in definitions, e.g. `le` in `u32le`.
    pub fn suffix(self) -> &'static str {
        match self {
            Endian::Native => "",
            Endian::Little => "le",
            Endian::Big => "be",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemError {
    #[error("requested 0x{n:x} bytes at offset 0x{offset:x} from a buffer of 0x{bufsz:x} bytes")]
    OutOfBounds { bufsz: usize, offset: usize, n: usize },

    #[error("integer width of {0} bytes is not supported")]
    InvalidWidth(usize),
}

/// Check that `n` bytes can be read at `offset` from a buffer of `bufsz`
/// bytes. Overflow of `offset + n` is treated as out of bounds.
pub fn check_read(bufsz: usize, offset: usize, n: usize) -> Result<(), MemError> {
    match offset.checked_add(n) {
        Some(end) if end <= bufsz => Ok(()),
        _ => Err(MemError::OutOfBounds { bufsz, offset, n }),
    }
}

/// A borrowed, read-only view over structure bytes.
///
/// Example usage:
///
/// ```
/// use structgen_runtime::{ByteBuffer, Endian};
/// let bb = ByteBuffer::new(&[0x34, 0x12, 0x00, 0x18]);
/// assert_eq!(bb.read_uint(0, 2, Endian::Little), Ok(0x1234));
/// assert_eq!(bb.read_uint(2, 2, Endian::Big), Ok(0x18));
/// ```
///
#[derive(Debug, Clone, Copy)]
pub struct ByteBuffer<'a> {
    data: &'a [u8],
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Try to borrow `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], MemError> {
        check_read(self.data.len(), offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// Try to read an unsigned integer of `width` bytes (1 to 8) at `offset`.
    pub fn read_uint(&self, offset: usize, width: usize, endian: Endian) -> Result<u64, MemError> {
        if width == 0 || width > 8 {
            return Err(MemError::InvalidWidth(width));
        }
        let bytes = self.read_bytes(offset, width)?;
        let value = match endian.resolve() {
            Endian::Big => bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64),
            _ => bytes.iter().rev().fold(0u64, |acc, b| (acc << 8) | *b as u64),
        };
        Ok(value)
    }

    /// Try to read a string of at most `maxsz` bytes at `offset`.
    ///
    /// Reading stops at the first NUL. Non-printable bytes are replaced by
    /// `.` and `None` is returned when nothing printable was found.
    pub fn read_string(&self, offset: usize, maxsz: usize) -> Result<Option<String>, MemError> {
        let bytes = self.read_bytes(offset, maxsz)?;
        let mut text = String::new();
        let mut valid = false;
        for b in bytes.iter().take_while(|b| **b != 0) {
            if b.is_ascii_graphic() || *b == b' ' {
                text.push(*b as char);
                valid = true;
            } else {
                text.push('.');
            }
        }
        Ok(if valid { Some(text) } else { None })
    }
}

/// An owned, fixed-size structure buffer meant for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Create a zero-filled buffer of exactly `size` bytes.
    pub fn with_size(size: usize) -> ByteBufferMut {
        ByteBufferMut { data: vec![0; size] }
    }

    pub fn from_slice(data: &[u8]) -> ByteBufferMut {
        ByteBufferMut { data: data.to_vec() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_view(&self) -> ByteBuffer<'_> {
        ByteBuffer::new(&self.data)
    }

    /// Write the low `width` bytes of `value` at `offset`.
    pub fn write_uint(
        &mut self,
        offset: usize,
        width: usize,
        value: u64,
        endian: Endian,
    ) -> Result<(), MemError> {
        if width == 0 || width > 8 {
            return Err(MemError::InvalidWidth(width));
        }
        check_read(self.data.len(), offset, width)?;
        let dst = &mut self.data[offset..offset + width];
        for (i, byte) in dst.iter_mut().enumerate() {
            let shift = match endian.resolve() {
                Endian::Big => (width - 1 - i) * 8,
                _ => i * 8,
            };
            *byte = (value >> shift) as u8;
        }
        Ok(())
    }

    /// Copy `src` into the buffer at `offset`.
    pub fn write_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), MemError> {
        check_read(self.data.len(), offset, src.len())?;
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Set `len` bytes at `offset` to `value`.
    pub fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<(), MemError> {
        check_read(self.data.len(), offset, len)?;
        self.data[offset..offset + len].fill(value);
        Ok(())
    }
}

#[test]
fn check_read_bounds() {
    assert_eq!(check_read(4, 0, 4), Ok(()));
    assert_eq!(check_read(4, 4, 0), Ok(()));
    assert_eq!(check_read(4, 1, 4), Err(MemError::OutOfBounds { bufsz: 4, offset: 1, n: 4 }));
    assert!(check_read(4, usize::MAX, 2).is_err());
}

#[test]
fn read_uint() {
    let bb = ByteBuffer::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    assert_eq!(bb.read_uint(0, 1, Endian::Big), Ok(0x01));
    assert_eq!(bb.read_uint(0, 2, Endian::Little), Ok(0x0201));
    assert_eq!(bb.read_uint(0, 2, Endian::Big), Ok(0x0102));
    assert_eq!(bb.read_uint(1, 3, Endian::Little), Ok(0x040302));
    assert_eq!(bb.read_uint(1, 3, Endian::Big), Ok(0x020304));
    assert_eq!(bb.read_uint(0, 8, Endian::Little), Ok(0x0807060504030201));
    assert_eq!(bb.read_uint(0, 0, Endian::Little), Err(MemError::InvalidWidth(0)));
    assert!(bb.read_uint(6, 4, Endian::Little).is_err());
}

#[test]
fn read_string() {
    let bb = ByteBuffer::new(b"DfuSe\0\0\0\x01\x02");
    assert_eq!(bb.read_string(0, 8), Ok(Some("DfuSe".to_string())));
    assert_eq!(bb.read_string(0, 3), Ok(Some("Dfu".to_string())));
    assert_eq!(bb.read_string(5, 3), Ok(None));
    assert_eq!(bb.read_string(8, 2), Ok(None));
    assert!(bb.read_string(8, 3).is_err());
}

#[test]
fn write_uint() {
    let mut bb = ByteBufferMut::with_size(4);
    bb.write_uint(0, 2, 0x1234, Endian::Little).unwrap();
    assert_eq!(bb.data(), &[0x34, 0x12, 0x00, 0x00]);
    bb.write_uint(1, 3, 0xAABBCC, Endian::Big).unwrap();
    assert_eq!(bb.data(), &[0x34, 0xAA, 0xBB, 0xCC]);
    assert!(bb.write_uint(2, 4, 0, Endian::Big).is_err());
}

#[test]
fn write_native_matches_host() {
    let mut bb = ByteBufferMut::with_size(4);
    bb.write_uint(0, 4, 0xDEADBEEF, Endian::Native).unwrap();
    assert_eq!(bb.data(), &0xDEADBEEFu32.to_ne_bytes());
    assert_eq!(bb.as_view().read_uint(0, 4, Endian::Native), Ok(0xDEADBEEF));
}

#[test]
fn write_bytes_and_fill() {
    let mut bb = ByteBufferMut::with_size(6);
    bb.fill(0, 6, 0xFF).unwrap();
    bb.write_bytes(2, &[1, 2]).unwrap();
    assert_eq!(bb.data(), &[0xFF, 0xFF, 1, 2, 0xFF, 0xFF]);
    assert!(bb.write_bytes(5, &[1, 2]).is_err());
    assert!(bb.fill(4, 3, 0).is_err());
}
