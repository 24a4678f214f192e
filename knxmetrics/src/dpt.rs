//! Datapoint type decoding.
//!
//! A mapping's `metric_type` is a numeric datapoint code. The code is looked up
//! in [`DECODERS`], an ordered table of code ranges, and the matching
//! [`DatapointType`] turns the raw APDU bytes into an `f64`.
//!
//! Payload framing follows the KNX APDU layout: values of six bits or fewer
//! live in the first byte, longer values follow one leading byte.

use std::ops::RangeInclusive;

use thiserror::Error;

/// Payload decoding errors. Every variant means "no value".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unknown datapoint type {0}")]
    UnknownKind(u32),

    #[error("{datapoint} expects {expected} bytes, got {actual}")]
    InvalidLength {
        datapoint: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{datapoint} value {value} out of range")]
    OutOfRange { datapoint: &'static str, value: f64 },
}

/// Datapoint types the exporter can turn into gauge values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatapointType {
    /// DPT 1.xxx, 1 bit.
    Boolean,
    /// DPT 5.001, 0..100 %.
    Percentage,
    /// DPT 9.001, °C.
    Temperature,
    /// DPT 9.004, lux.
    Illuminance,
    /// DPT 9.005, m/s.
    WindSpeed,
}

/// One row of the decoder table.
#[derive(Debug, Clone)]
pub struct DecoderRule {
    pub kinds: RangeInclusive<u32>,
    pub datapoint: DatapointType,
}

/// Recognized datapoint codes, first matching row wins.
pub const DECODERS: &[DecoderRule] = &[
    DecoderRule {
        kinds: 1000..=1999,
        datapoint: DatapointType::Boolean,
    },
    DecoderRule {
        kinds: 5001..=5001,
        datapoint: DatapointType::Percentage,
    },
    DecoderRule {
        kinds: 9001..=9001,
        datapoint: DatapointType::Temperature,
    },
    DecoderRule {
        kinds: 9004..=9004,
        datapoint: DatapointType::Illuminance,
    },
    DecoderRule {
        kinds: 9005..=9005,
        datapoint: DatapointType::WindSpeed,
    },
];

/// Upper bound of every 2-byte float datapoint.
const F16_MAX: f64 = 670_760.0;

impl DatapointType {
    /// Resolve a datapoint code through [`DECODERS`].
    pub fn from_kind(kind: u32) -> Option<Self> {
        DECODERS
            .iter()
            .find(|rule| rule.kinds.contains(&kind))
            .map(|rule| rule.datapoint)
    }

    /// Dotted KNX name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            DatapointType::Boolean => "DPT 1.xxx",
            DatapointType::Percentage => "DPT 5.001",
            DatapointType::Temperature => "DPT 9.001",
            DatapointType::Illuminance => "DPT 9.004",
            DatapointType::WindSpeed => "DPT 9.005",
        }
    }

    /// Decode an APDU payload.
    pub fn decode(&self, payload: &[u8]) -> Result<f64, DecodeError> {
        match self {
            DatapointType::Boolean => {
                let [b] = self.fixed::<1>(payload)?;
                Ok(if b & 0x01 == 0x01 { 1.0 } else { 0.0 })
            }
            DatapointType::Percentage => {
                let [_, raw] = self.fixed::<2>(payload)?;
                Ok(f64::from(raw) * 100.0 / 255.0)
            }
            DatapointType::Temperature => self.float16(payload, -273.0),
            DatapointType::Illuminance | DatapointType::WindSpeed => self.float16(payload, 0.0),
        }
    }

    fn fixed<const N: usize>(&self, payload: &[u8]) -> Result<[u8; N], DecodeError> {
        payload.try_into().map_err(|_| DecodeError::InvalidLength {
            datapoint: self.name(),
            expected: N,
            actual: payload.len(),
        })
    }

    fn float16(&self, payload: &[u8], min: f64) -> Result<f64, DecodeError> {
        let [_, hi, lo] = self.fixed::<3>(payload)?;
        let value = unpack_float16(hi, lo);
        if !(min..=F16_MAX).contains(&value) {
            return Err(DecodeError::OutOfRange {
                datapoint: self.name(),
                value,
            });
        }
        Ok(value)
    }
}

impl std::fmt::Display for DatapointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// KNX 2-byte float: `0.01 * M * 2^E`.
///
/// Bit 15 is the sign of the 12-bit two's-complement mantissa `M`,
/// bits 14..11 hold the exponent `E`, bits 10..0 the rest of `M`.
fn unpack_float16(hi: u8, lo: u8) -> f64 {
    let mut mantissa = (i32::from(hi & 0x07) << 8) | i32::from(lo);
    if hi & 0x80 != 0 {
        mantissa -= 2048;
    }
    let exponent = (hi >> 3) & 0x0F;

    // Integer product first so exactly representable values stay exact.
    f64::from(mantissa * (1 << exponent)) / 100.0
}

/// Decode `payload` according to the datapoint code `kind`.
pub fn decode(kind: u32, payload: &[u8]) -> Result<f64, DecodeError> {
    DatapointType::from_kind(kind)
        .ok_or(DecodeError::UnknownKind(kind))?
        .decode(payload)
}
