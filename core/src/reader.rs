//! Cursor-based reader over APDU octets, with BER-style length support.

/// A decoded length field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Length {
    /// The length value itself.
    pub value: usize,

    /// Number of octets the length field occupied, including the leading one.
    pub size: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LengthError {
    /// No octet was left to read the length from.
    Missing,

    /// The leading octet announced more length octets than are available.
    Truncated { expected: usize, available: usize },

    /// The length does not fit into `usize`.
    Overflow { octets: usize },
}

/// Stateful, bounds-checked reader over a slice of octets.
pub struct Reader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from the buffer.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    /// Number of octets consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Number of octets left to read.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads data of specified size without seeking the cursor.
    pub fn peek(&self, length: usize) -> Option<&'a [u8]> {
        self.buffer.get(self.cursor..self.cursor.checked_add(length)?)
    }

    /// Reads a next octet and seeks the cursor.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<u8> {
        let byte = *self.buffer.get(self.cursor)?;
        self.cursor += 1;
        Some(byte)
    }

    /// Reads data of specified size and seeks the cursor.
    /// Leaves the cursor untouched if not enough octets are left.
    pub fn read(&mut self, length: usize) -> Option<&'a [u8]> {
        let bytes = self.peek(length)?;
        self.cursor += length;
        Some(bytes)
    }

    /// Reads everything left, seeking the cursor to the end.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = &self.buffer[self.cursor..];
        self.cursor = self.buffer.len();
        bytes
    }

    /// Reads a length field at the current position, seeking the cursor.
    ///
    /// A leading octet with the top bit clear is the length itself. Otherwise its low
    /// seven bits count the big-endian octets that follow and form the length.
    pub fn read_length(&mut self) -> Result<Length, LengthError> {
        let head = self.next().ok_or(LengthError::Missing)?;
        if head & 0x80 == 0 {
            return Ok(Length {
                value: head as usize,
                size: 1,
            });
        }

        let octets = (head & 0x7f) as usize;
        let bytes = self.read(octets).ok_or(LengthError::Truncated {
            expected: octets,
            available: self.remaining(),
        })?;

        let mut value = 0usize;
        for &byte in bytes {
            value = value
                .checked_mul(0x100)
                .ok_or(LengthError::Overflow { octets })?
                | byte as usize;
        }

        Ok(Length {
            value,
            size: 1 + octets,
        })
    }
}
