use std::{error, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    BufferOverflow,
    MissingTerminator,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BufferOverflow => "buffer overflow",
            Self::MissingTerminator => "missing NUL terminator",
        })
    }
}

impl error::Error for Error {}

/// Forward little-endian reader over a byte slice.
///
/// Every read is bounds-checked and fallible; the cursor does not advance
/// on failure.
#[derive(Clone)]
pub struct Cursor<'input> {
    buffer: &'input [u8],
    offset: usize,
}

impl<'input> Cursor<'input> {
    #[must_use]
    pub fn new(buffer: &'input [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'input [u8], Error> {
        let end = self.offset.checked_add(len).ok_or(Error::BufferOverflow)?;
        let bytes = self
            .buffer
            .get(self.offset..end)
            .ok_or(Error::BufferOverflow)?;
        self.offset = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let bytes = self.read_bytes(N)?;
        // read_bytes returned exactly N bytes
        Ok(bytes.try_into().unwrap())
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// 24-bit little-endian unsigned, widened to `u32`.
    pub fn read_u24(&mut self) -> Result<u32, Error> {
        let b = self.read_array::<3>()?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Bytes up to (not including) the next NUL, consuming the NUL.
    pub fn read_cstring(&mut self) -> Result<&'input [u8], Error> {
        let rest = self
            .buffer
            .get(self.offset..)
            .ok_or(Error::BufferOverflow)?;
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::MissingTerminator)?;
        let bytes = &rest[..nul];
        self.offset += nul + 1;
        Ok(bytes)
    }
}

impl fmt::Debug for Cursor<'_> {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("offset", &self.offset)
            .field("len", &self.buffer.len())
            .finish()
    }
}

/// Reader that walks a byte slice from its end towards its start.
///
/// Record trailers (variable-length metadata, null bitmap) are addressed
/// from the record's end; this keeps the on-disk orientation without
/// reversing the buffer. Multi-byte reads still decode little-endian in
/// the buffer's natural order.
#[derive(Clone)]
pub struct BackCursor<'input> {
    buffer: &'input [u8],
    end: usize,
}

impl<'input> BackCursor<'input> {
    #[must_use]
    pub fn new(buffer: &'input [u8]) -> Self {
        Self {
            buffer,
            end: buffer.len(),
        }
    }

    /// How many bytes remain in front of the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end
    }

    /// Bytes consumed from the end so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.buffer.len() - self.end
    }

    /// Move the end marker `len` bytes towards the start.
    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.end = self.end.checked_sub(len).ok_or(Error::BufferOverflow)?;
        Ok(())
    }

    /// Byte at `back` positions before the current end, without consuming.
    #[must_use]
    pub fn peek_back(&self, back: usize) -> Option<u8> {
        let idx = self.end.checked_sub(back + 1)?;
        self.buffer.get(idx).copied()
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let idx = self.end.checked_sub(1).ok_or(Error::BufferOverflow)?;
        let b = *self.buffer.get(idx).ok_or(Error::BufferOverflow)?;
        self.end = idx;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        let idx = self.end.checked_sub(2).ok_or(Error::BufferOverflow)?;
        let bytes = self.buffer.get(idx..idx + 2).ok_or(Error::BufferOverflow)?;
        self.end = idx;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

impl fmt::Debug for BackCursor<'_> {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackCursor")
            .field("end", &self.end)
            .field("len", &self.buffer.len())
            .finish()
    }
}

#[test]
fn test_cursor_reads() {
    let mut c = Cursor::new(&[1, 0, 2, 0, 0, 0, 3, 4, 5, 0xff]);
    assert_eq!(1, c.read_u16().unwrap());
    assert_eq!(2, c.read_u32().unwrap());
    assert_eq!(3, c.read_u8().unwrap());
    assert_eq!([4, 5], c.read_array::<2>().unwrap());
    assert_eq!(1, c.remaining());
    assert!(c.read_u16().is_err());
    assert_eq!(9, c.pos());
    assert_eq!(0xff, c.read_u8().unwrap());
    assert!(c.is_at_end());
    assert!(c.read_u8().is_err());
}

#[test]
fn test_cursor_u24_and_cstring() {
    let mut c = Cursor::new(&[0x01, 0x02, 0x03, b'h', b'i', 0, 0xaa]);
    assert_eq!(0x030201, c.read_u24().unwrap());
    assert_eq!(b"hi", c.read_cstring().unwrap());
    assert_eq!(0xaa, c.read_u8().unwrap());

    let mut c = Cursor::new(b"no-nul");
    assert_eq!(Err(Error::MissingTerminator), c.read_cstring());
}

#[test]
fn test_back_cursor() {
    // Forward layout: [payload 0xAA 0xBB] [u16 = 0x0102 LE] [u8 = 7]
    let buf = [0xaa, 0xbb, 0x02, 0x01, 7];
    let mut c = BackCursor::new(&buf);
    assert_eq!(7, c.read_u8().unwrap());
    assert_eq!(0x0102, c.read_u16().unwrap());
    assert_eq!(2, c.remaining());
    assert_eq!(3, c.consumed());
    assert_eq!(Some(0xbb), c.peek_back(0));
    assert_eq!(Some(0xaa), c.peek_back(1));
    assert_eq!(None, c.peek_back(2));
    assert_eq!(0xbb, c.read_u8().unwrap());
    assert_eq!(0xaa, c.read_u8().unwrap());
    assert!(c.read_u8().is_err());
}

#[test]
fn test_back_cursor_skip() {
    let buf = [1, 2, 3, 4];
    let mut c = BackCursor::new(&buf);
    c.skip(2).unwrap();
    assert_eq!(2, c.read_u8().unwrap());
    assert!(c.skip(2).is_err());
}
