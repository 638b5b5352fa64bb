//! Signal decoding engine
//!
//! Turns one (frame, signal encoding) pair into a physical value. Decoding is
//! a pure function of its inputs:
//!
//! 1. normalize byte order (little-endian payloads are read last byte first)
//! 2. interpret the payload as one unsigned integer, most significant byte first
//! 3. extract `bit_length` bits starting `bit_start` bits above the LSB
//! 4. sign-extend signed fields
//! 5. apply `raw * scale + offset` in `f64`

use crate::catalog::{ByteOrder, SignalEncoding, ValueType, MAX_SIGNAL_BITS};
use crate::types::{DecodeError, DecodedSample, FrameRecord};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use std::ops::Range;

/// Bytes of the normalized payload integer a signal can address
pub const FIELD_WINDOW_BYTES: usize = 8;

/// Signal codec - extracts and packs signal fields
pub struct SignalCodec;

impl SignalCodec {
    /// Decode one signal from a frame
    ///
    /// The returned sample has sequence number and frame index 0; the decode
    /// run assigns both.
    pub fn decode(frame: &FrameRecord, encoding: &SignalEncoding) -> Result<DecodedSample, DecodeError> {
        let raw_value = Self::extract_raw(&frame.payload, encoding)?;
        let physical_value = raw_value as f64 * encoding.scale + encoding.offset;

        Ok(DecodedSample {
            signal_id: encoding.signal_id.clone(),
            result_time: frame.timestamp,
            physical_value,
            raw_value,
            sequence: 0,
            frame_index: 0,
            unit: encoding.unit.clone(),
            source: frame.source.clone(),
        })
    }

    /// Extract the sign-extended raw field value from a payload
    pub fn extract_raw(payload: &[u8], encoding: &SignalEncoding) -> Result<i128, DecodeError> {
        Self::check_layout(payload, encoding)?;

        let value = Self::payload_integer(payload, encoding.byte_order);
        let raw = (value >> encoding.bit_start) & Self::field_mask(encoding.bit_length);

        Ok(match encoding.value_type {
            ValueType::Unsigned => raw as i128,
            ValueType::Signed => Self::sign_extend(raw, encoding.bit_length),
        })
    }

    /// Reject values outside the encoding's physical range
    ///
    /// Bounds that are absent are not checked.
    pub fn check_range(sample: &DecodedSample, encoding: &SignalEncoding) -> Result<(), DecodeError> {
        let value = sample.physical_value;
        let below = encoding.min_inclusive.is_some_and(|min| value < min);
        let above = encoding.max_inclusive.is_some_and(|max| value > max);

        if below || above {
            return Err(DecodeError::OutOfRange {
                signal_id: encoding.signal_id.clone(),
                value,
                min: encoding.min_inclusive,
                max: encoding.max_inclusive,
            });
        }
        Ok(())
    }

    /// Pack a raw field value into a payload, leaving other bits untouched
    ///
    /// Negative values are written in two's complement truncated to
    /// `bit_length` bits. This is the exact inverse of [`extract_raw`](Self::extract_raw).
    pub fn encode(payload: &mut [u8], encoding: &SignalEncoding, raw: i128) -> Result<(), DecodeError> {
        Self::check_layout(payload, encoding)?;

        let mask = Self::field_mask(encoding.bit_length);
        let field = (raw as u128 as u64) & mask;

        let value = Self::payload_integer(payload, encoding.byte_order);
        let value = (value & !(mask << encoding.bit_start)) | (field << encoding.bit_start);

        let window = Self::field_window(payload.len(), encoding.byte_order);
        let width = window.len();
        match encoding.byte_order {
            ByteOrder::LittleEndian => LittleEndian::write_uint(&mut payload[window], value, width),
            ByteOrder::BigEndian => BigEndian::write_uint(&mut payload[window], value, width),
        }
        Ok(())
    }

    /// Validate field width and payload size before any bit arithmetic
    fn check_layout(payload: &[u8], encoding: &SignalEncoding) -> Result<(), DecodeError> {
        if encoding.bit_length == 0 || encoding.bit_length > MAX_SIGNAL_BITS {
            return Err(DecodeError::UnsupportedWidth {
                signal_id: encoding.signal_id.clone(),
                bit_length: encoding.bit_length,
            });
        }

        let required = encoding.required_bytes();
        if required > payload.len() {
            log::warn!(
                "Signal '{}' requires {} bytes but frame only has {} bytes",
                encoding.signal_id,
                required,
                payload.len()
            );
            return Err(DecodeError::MalformedPayload {
                signal_id: encoding.signal_id.clone(),
                required,
                actual: payload.len(),
            });
        }
        Ok(())
    }

    /// Fold the payload into one unsigned integer
    ///
    /// Big-endian payloads are read in stored order. Little-endian payloads
    /// are read with their byte sequence reversed, so `01 02 .. 08` becomes
    /// `0x0807060504030201`. Only the low 64 bits of that integer are kept;
    /// the payload must not be empty.
    fn payload_integer(payload: &[u8], byte_order: ByteOrder) -> u64 {
        let window = Self::field_window(payload.len(), byte_order);
        let width = window.len();
        match byte_order {
            ByteOrder::LittleEndian => LittleEndian::read_uint(&payload[window], width),
            ByteOrder::BigEndian => BigEndian::read_uint(&payload[window], width),
        }
    }

    /// Payload bytes that make up the low 64 bits after normalization
    ///
    /// Reversal puts the first stored bytes of a little-endian payload at
    /// the bottom of the integer; a big-endian payload keeps its last bytes
    /// there.
    fn field_window(len: usize, byte_order: ByteOrder) -> Range<usize> {
        let width = len.min(FIELD_WINDOW_BYTES);
        match byte_order {
            ByteOrder::LittleEndian => 0..width,
            ByteOrder::BigEndian => len - width..len,
        }
    }

    /// All-ones mask of `bit_length` bits
    ///
    /// `1 << 64` overflows `u64`, so the full-width mask is spelled out.
    fn field_mask(bit_length: u16) -> u64 {
        if bit_length >= 64 {
            u64::MAX
        } else {
            (1u64 << bit_length) - 1
        }
    }

    /// Two's-complement interpretation of a `bit_length`-bit field
    ///
    /// If the field's top bit is set the value is `raw - 2^bit_length`.
    fn sign_extend(raw: u64, bit_length: u16) -> i128 {
        let sign_bit = 1u64 << (bit_length - 1);
        if raw & sign_bit != 0 {
            raw as i128 - (1i128 << bit_length)
        } else {
            raw as i128
        }
    }
}
