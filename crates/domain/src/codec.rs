//! Register block decoding.
//!
//! Devices return 16-bit words; each word is laid out little-endian and the
//! words are concatenated in the order received before the typed value is
//! read back out of the byte buffer.

use scheduler_errors::{SchedulerError, SchedulerResult};

use crate::entities::{RegisterFormat, RegisterValue};

/// Decode a register block. An empty block yields `Ok(None)`.
pub fn decode_registers(
    registers: &[u16],
    format: RegisterFormat,
) -> SchedulerResult<Option<RegisterValue>> {
    if registers.is_empty() {
        return Ok(None);
    }

    let needed = format.register_count();
    if registers.len() < needed {
        return Err(SchedulerError::InsufficientRegisters {
            format: format.to_string(),
            expected: needed,
            actual: registers.len(),
        });
    }

    let raw: Vec<u8> = registers[..needed]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect();

    let value = match format {
        RegisterFormat::Int16 => RegisterValue::Integer(i64::from(registers[0])),
        RegisterFormat::Int32 => {
            RegisterValue::Integer(i64::from(i32::from_le_bytes(quad(&raw))))
        }
        RegisterFormat::Float32 => {
            let value = f64::from(f32::from_le_bytes(quad(&raw)));
            RegisterValue::Float(round_to(value, 4))
        }
        RegisterFormat::Float64 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[..8]);
            RegisterValue::Float(f64::from_le_bytes(bytes))
        }
    };

    Ok(Some(value))
}

/// Same as [`decode_registers`] but takes the textual format name used in
/// configuration files (`REAL4`, `float32`, ...).
pub fn decode_registers_named(
    registers: &[u16],
    format: &str,
) -> SchedulerResult<Option<RegisterValue>> {
    decode_registers(registers, format.parse()?)
}

fn quad(raw: &[u8]) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&raw[..4]);
    bytes
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float32_ten() {
        let value = decode_registers(&[0x0000, 0x4120], RegisterFormat::Float32).unwrap();
        assert_eq!(value, Some(RegisterValue::Float(10.0)));
    }

    #[test]
    fn test_float32_is_rounded_to_four_digits() {
        // 0x3F9D70A4 ~= 1.23000002
        let value = decode_registers(&[0x70A4, 0x3F9D], RegisterFormat::Float32).unwrap();
        assert_eq!(value, Some(RegisterValue::Float(1.23)));
    }

    #[test]
    fn test_int16_is_raw_word() {
        let value = decode_registers(&[0xFFFF], RegisterFormat::Int16).unwrap();
        assert_eq!(value, Some(RegisterValue::Integer(65535)));

        // extra words are ignored
        let value = decode_registers(&[42, 7], RegisterFormat::Int16).unwrap();
        assert_eq!(value, Some(RegisterValue::Integer(42)));
    }

    #[test]
    fn test_int32_signed_little_endian() {
        let value = decode_registers(&[0xFFFE, 0xFFFF], RegisterFormat::Int32).unwrap();
        assert_eq!(value, Some(RegisterValue::Integer(-2)));

        let value = decode_registers(&[0x0001, 0x0001], RegisterFormat::Int32).unwrap();
        assert_eq!(value, Some(RegisterValue::Integer(65537)));
    }

    #[test]
    fn test_float64() {
        // 1.5 == 0x3FF8_0000_0000_0000
        let value =
            decode_registers(&[0x0000, 0x0000, 0x0000, 0x3FF8], RegisterFormat::Float64).unwrap();
        assert_eq!(value, Some(RegisterValue::Float(1.5)));
    }

    #[test]
    fn test_empty_block_is_none() {
        for format in [
            RegisterFormat::Int16,
            RegisterFormat::Int32,
            RegisterFormat::Float32,
            RegisterFormat::Float64,
        ] {
            assert_eq!(decode_registers(&[], format).unwrap(), None);
        }
    }

    #[test]
    fn test_short_block_is_an_error() {
        let err = decode_registers(&[0x0000, 0x4120], RegisterFormat::Float64).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::InsufficientRegisters {
                expected: 4,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_named_formats() {
        assert_eq!(
            decode_registers_named(&[0x0000, 0x4120], "REAL4").unwrap(),
            Some(RegisterValue::Float(10.0))
        );
        let err = decode_registers_named(&[1], "BCD").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidFormat(_)));
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let words = [0x70A4, 0x3F9D, 0x0001, 0x0002];
        let first = decode_registers(&words, RegisterFormat::Float32).unwrap();
        let _ = decode_registers(&words, RegisterFormat::Float64).unwrap();
        let second = decode_registers(&words, RegisterFormat::Float32).unwrap();
        assert_eq!(first, second);
    }
}
