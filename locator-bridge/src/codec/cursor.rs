//! Speculative reads over buffered channel bytes
//!
//! The locator streams records back to back without any outer framing, so a
//! record boundary is only known once the record has been decoded. Every
//! decode attempt therefore runs against a [`ByteCursor`] borrowed from the
//! channel's [`DatagramBuffer`]; bytes are only removed from the buffer after
//! a complete record was read.
//!
//! ```text
//! socket ──read──▶ DatagramBuffer ──try_decode──▶ ByteCursor ──▶ record
//!                       ▲                              │
//!                       └────── Incomplete: keep ──────┘
//! ```

/// Upper bound for a single variable-length section (arrays, strings)
///
/// A count larger than this is treated as stream corruption rather than a
/// record that still needs more bytes.
pub const MAX_SECTION_BYTES: usize = 64 * 1024 * 1024;

/// Datagram decode failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not enough bytes buffered to finish the record
    #[error("incomplete datagram: {needed} more bytes required")]
    Incomplete {
        /// Bytes missing for the read that failed
        needed: usize,
    },

    /// Bytes do not form a valid record
    #[error("malformed datagram: {0}")]
    Malformed(String),
}

impl DecodeError {
    /// True if the attempt should be retried once more bytes arrive
    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeError::Incomplete { .. })
    }
}

/// Result type for decode operations
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Saved cursor position, see [`ByteCursor::checkpoint`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Little-endian reader over a borrowed byte slice
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Remember the current position
    #[inline]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.pos)
    }

    /// Return to a previously saved position
    #[inline]
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.0.min(self.data.len());
    }

    /// Run `decode`, restoring the position if it fails
    pub fn try_decode<T>(
        &mut self,
        decode: impl FnOnce(&mut Self) -> DecodeResult<T>,
    ) -> DecodeResult<T> {
        let checkpoint = self.checkpoint();
        let result = decode(self);
        if result.is_err() {
            self.rewind(checkpoint);
        }
        result
    }

    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::Incomplete {
                needed: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.take_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        self.take_array().map(f64::from_le_bytes)
    }

    /// Read a fixed number of f64 values
    pub fn read_f64_array<const N: usize>(&mut self) -> DecodeResult<[f64; N]> {
        let mut values = [0.0; N];
        for value in &mut values {
            *value = self.read_f64()?;
        }
        Ok(values)
    }

    /// Read a `u32` element count and check it against [`MAX_SECTION_BYTES`]
    pub fn read_count(&mut self, element_size: usize) -> DecodeResult<usize> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(element_size.max(1)) > MAX_SECTION_BYTES {
            return Err(DecodeError::Malformed(format!(
                "section of {} elements x {} bytes exceeds limit",
                count, element_size
            )));
        }
        Ok(count)
    }

    /// Read a `u32` length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let len = self.read_count(1)?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DecodeError::Malformed(format!("invalid UTF-8 string: {}", e)))
    }

    /// Read a `u32` count-prefixed array, decoding each element with `read`
    pub fn read_array<T>(
        &mut self,
        element_size: usize,
        mut read: impl FnMut(&mut Self) -> DecodeResult<T>,
    ) -> DecodeResult<Vec<T>> {
        let count = self.read_count(element_size)?;
        // Bail out early so a huge count doesn't allocate before data is there
        let needed = count * element_size;
        if self.remaining() < needed {
            return Err(DecodeError::Incomplete {
                needed: needed - self.remaining(),
            });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }
}

/// Growable byte buffer fed by one channel's socket
#[derive(Debug, Default)]
pub struct DatagramBuffer {
    bytes: Vec<u8>,
}

/// Initial capacity for a channel buffer (one typical visualization record)
const INITIAL_BUFFER_CAPACITY: usize = 16 * 1024;

impl DatagramBuffer {
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append freshly received bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Attempt to decode one record from the front of the buffer
    ///
    /// On success the record's bytes are removed. On any error the buffer is
    /// left untouched, so an `Incomplete` attempt can simply be repeated after
    /// more bytes were appended.
    pub fn try_decode<T>(
        &mut self,
        decode: impl FnOnce(&mut ByteCursor<'_>) -> DecodeResult<T>,
    ) -> DecodeResult<T> {
        let mut cursor = ByteCursor::new(&self.bytes);
        let record = decode(&mut cursor)?;
        let consumed = cursor.position();
        self.bytes.drain(..consumed);
        Ok(record)
    }
}
