//! Configuration bitstream packing
//!
//! Layout, from bit 0 (LSB of byte 0) upward:
//!
//! | bits | field |
//! |---|---|
//! | 3 | `clock_select` |
//! | 1 | `symmetric` |
//! | `word_bits` each | coefficients, in order, two's complement |
//!
//! The last byte is zero-padded at its high end.

use crate::constants::CLOCK_SELECT_BITS;
use crate::error::{HarnessError, Result};
use crate::filter::configuration::{ClockSelect, FilterConfiguration};
use crate::fixed::{Fixed, QFormat};

/// Packs and unpacks [`FilterConfiguration`]s of a fixed shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationEncoder {
    format: QFormat,
    n_coeffs: usize,
}

impl ConfigurationEncoder {
    pub fn new(format: QFormat, n_coeffs: usize) -> Self {
        Self { format, n_coeffs }
    }

    /// Encoder matching the shape of `configuration`.
    pub fn for_configuration(configuration: &FilterConfiguration) -> Self {
        Self::new(configuration.coefficient_format(), configuration.n_coeffs())
    }

    pub fn total_bits(&self) -> usize {
        CLOCK_SELECT_BITS as usize + 1 + self.n_coeffs * self.format.word_bits() as usize
    }

    pub fn byte_len(&self) -> usize {
        self.total_bits().div_ceil(8)
    }

    pub fn encode(&self, configuration: &FilterConfiguration) -> Result<Vec<u8>> {
        if configuration.n_coeffs() != self.n_coeffs {
            return Err(HarnessError::Config(format!(
                "encoder expects {} coefficients, configuration has {}",
                self.n_coeffs,
                configuration.n_coeffs()
            )));
        }

        let mut writer = BitWriter::new(self.byte_len());
        writer.push(
            u64::from(configuration.clock_select().value()),
            CLOCK_SELECT_BITS,
        );
        writer.push(u64::from(configuration.symmetric()), 1);

        let bits = self.format.word_bits();
        for (index, coefficient) in configuration.coefficients().iter().enumerate() {
            let rejected = || HarnessError::ConfigurationEncoding {
                field: format!("coefficient[{}]", index),
                value: coefficient.to_string(),
                bits,
            };
            let field = coefficient.resize(self.format).map_err(|_| rejected())?;
            if field != *coefficient {
                return Err(rejected());
            }
            writer.push(field.to_bits(), bits);
        }

        Ok(writer.into_bytes())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<FilterConfiguration> {
        if bytes.len() != self.byte_len() {
            return Err(HarnessError::BitstreamLength {
                expected: self.byte_len(),
                actual: bytes.len(),
            });
        }

        let mut reader = BitReader::new(bytes);
        let clock_select = ClockSelect::new(reader.read(CLOCK_SELECT_BITS) as u8)?;
        let symmetric = reader.read(1) == 1;
        let coefficients: Vec<Fixed> = (0..self.n_coeffs)
            .map(|_| Fixed::from_bits(reader.read(self.format.word_bits()), self.format))
            .collect();

        FilterConfiguration::new(clock_select, symmetric, &coefficients, self.format)
    }
}

/// LSB-first bit packer over a zeroed buffer.
struct BitWriter {
    bytes: Vec<u8>,
    position: usize,
}

impl BitWriter {
    fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
            position: 0,
        }
    }

    fn push(&mut self, value: u64, bits: u32) {
        for i in 0..bits {
            if (value >> i) & 1 == 1 {
                self.bytes[self.position / 8] |= 1 << (self.position % 8);
            }
            self.position += 1;
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn read(&mut self, bits: u32) -> u64 {
        let mut value = 0u64;
        for i in 0..bits {
            let bit = (self.bytes[self.position / 8] >> (self.position % 8)) & 1;
            value |= u64::from(bit) << i;
            self.position += 1;
        }
        value
    }
}
