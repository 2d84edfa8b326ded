//! Little-endian datagram writer, the counterpart of [`super::ByteCursor`]

use super::cursor::MAX_SECTION_BYTES;

/// Datagram encode failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A string or array would not be accepted by the locator's reader
    #[error("section size {size} exceeds the {limit} byte limit", limit = MAX_SECTION_BYTES)]
    SectionTooLarge { size: usize },
}

/// Builds one outbound datagram
///
/// Oversized sections are still written, but the first one is remembered and
/// [`DatagramWriter::finish`] fails with it.
#[derive(Debug, Default)]
pub struct DatagramWriter {
    buffer: Vec<u8>,
    error: Option<EncodeError>,
}

impl DatagramWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            error: None,
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f64_slice(&mut self, values: &[f64]) -> &mut Self {
        for &value in values {
            self.write_f64(value);
        }
        self
    }

    /// `u32` byte length followed by the UTF-8 bytes
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_count(value.len(), value.len());
        self.buffer.extend_from_slice(value.as_bytes());
        self
    }

    /// `u32` element count followed by the elements
    pub fn write_array<T>(
        &mut self,
        items: &[T],
        mut write: impl FnMut(&mut Self, &T),
    ) -> &mut Self {
        let count_at = self.buffer.len();
        self.write_u32(0);
        let start = self.buffer.len();
        for item in items {
            write(self, item);
        }
        let count = self.checked_count(items.len(), self.buffer.len() - start);
        self.buffer[count_at..start].copy_from_slice(&count.to_le_bytes());
        self
    }

    /// Write a `u32` count for a section of `bytes` bytes
    fn write_count(&mut self, count: usize, bytes: usize) {
        let count = self.checked_count(count, bytes);
        self.write_u32(count);
    }

    /// Count as written on the wire; records an error past the section limit
    fn checked_count(&mut self, count: usize, bytes: usize) -> u32 {
        let size = count.max(bytes);
        let fits = size <= MAX_SECTION_BYTES;
        match u32::try_from(count) {
            Ok(count) if fits => count,
            _ => {
                self.error
                    .get_or_insert(EncodeError::SectionTooLarge { size });
                u32::try_from(count).unwrap_or(u32::MAX)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The encoded datagram, or the first oversized section
    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_are_prefixed() {
        let mut w = DatagramWriter::default();
        w.write_string("ab").write_array(&[7u16, 8], |w, v| {
            w.write_u16(*v);
        });
        assert_eq!(
            w.finish().unwrap(),
            vec![2, 0, 0, 0, b'a', b'b', 2, 0, 0, 0, 7, 0, 8, 0]
        );
    }

    #[test]
    fn test_oversized_count_fails_encode() {
        // Zero-sized elements: the count alone exceeds the limit
        let items = vec![(); MAX_SECTION_BYTES + 1];
        let mut w = DatagramWriter::default();
        w.write_f64(1.0).write_array(&items, |_, _| {});
        assert_eq!(
            w.finish(),
            Err(EncodeError::SectionTooLarge {
                size: MAX_SECTION_BYTES + 1
            })
        );
    }
}
