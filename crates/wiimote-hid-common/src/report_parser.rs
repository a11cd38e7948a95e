//! HID report parsing utilities

use crate::{TransportError, TransportResult};

/// Bounds-checked cursor over a received report.
pub struct ReportReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ReportReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buffer: data,
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn read_u8(&mut self) -> TransportResult<u8> {
        let value = self.peek_u8()?;
        self.position = self.position.saturating_add(1);
        Ok(value)
    }

    pub fn read_u16_be(&mut self) -> TransportResult<u16> {
        let hi = u16::from(self.read_u8()?);
        let lo = u16::from(self.read_u8()?);
        Ok(lo | (hi << 8))
    }

    pub fn read_u32_be(&mut self) -> TransportResult<u32> {
        let b0 = u32::from(self.read_u8()?);
        let b1 = u32::from(self.read_u8()?);
        let b2 = u32::from(self.read_u8()?);
        let b3 = u32::from(self.read_u8()?);
        Ok((b0 << 24) | (b1 << 16) | (b2 << 8) | b3)
    }

    pub fn read_bytes(&mut self, count: usize) -> TransportResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .ok_or_else(|| TransportError::InvalidReport("Length overflow".to_string()))?;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or_else(|| TransportError::InvalidReport("Unexpected end of data".to_string()))?;
        self.position = end;
        Ok(bytes)
    }

    pub fn peek_u8(&self) -> TransportResult<u8> {
        self.buffer
            .get(self.position)
            .copied()
            .ok_or_else(|| TransportError::InvalidReport("Unexpected end of data".to_string()))
    }

    pub fn skip(&mut self, count: usize) {
        self.position = self.position.saturating_add(count).min(self.buffer.len());
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        self.buffer.get(self.position..).unwrap_or_default()
    }
}

/// Builder for output reports.
pub struct ReportBuilder {
    buffer: Vec<u8>,
}

impl ReportBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u16_be(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Writes the low 24 bits of `value`, most significant first.
    pub fn write_u24_be(&mut self, value: u32) -> &mut Self {
        let [_, b1, b2, b3] = value.to_be_bytes();
        self.buffer.extend_from_slice(&[b1, b2, b3]);
        self
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    /// Zero-pads the report up to `len` bytes.
    pub fn pad_to(&mut self, len: usize) -> &mut Self {
        if self.buffer.len() < len {
            self.buffer.resize(len, 0);
        }
        self
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::with_capacity(crate::MAX_REPORT_LEN)
    }
}
