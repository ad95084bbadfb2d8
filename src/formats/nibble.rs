//! Bit-packed array of 4-bit values, two per byte, low nibble first.

use anyhow::{Result, bail};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NibbleArray {
    data: Vec<u8>,
}

impl NibbleArray {
    /// Values held by one section's array (16×16×16 blocks).
    pub const SECTION_VALUES: usize = 4096;
    /// Bytes backing [`Self::SECTION_VALUES`] values.
    pub const SECTION_BYTES: usize = Self::SECTION_VALUES / 2;

    /// Zeroed array sized for one section.
    pub fn new() -> Self {
        Self {
            data: vec![0; Self::SECTION_BYTES],
        }
    }

    /// Wrap existing section bytes. Fails unless exactly [`Self::SECTION_BYTES`] long.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() != Self::SECTION_BYTES {
            bail!(
                "nibble array must be {} bytes, got {}",
                Self::SECTION_BYTES,
                data.len()
            );
        }
        Ok(Self { data })
    }

    pub fn get(&self, index: usize) -> u8 {
        let byte = self.data[index >> 1];
        if index & 1 == 0 { byte & 0x0F } else { byte >> 4 }
    }

    /// Store the low 4 bits of `value` at `index`.
    pub fn set(&mut self, index: usize, value: u8) {
        let byte = &mut self.data[index >> 1];
        let value = value & 0x0F;
        if index & 1 == 0 {
            *byte = (*byte & 0xF0) | value;
        } else {
            *byte = (*byte & 0x0F) | (value << 4);
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() * 2
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Default for NibbleArray {
    fn default() -> Self {
        Self::new()
    }
}
