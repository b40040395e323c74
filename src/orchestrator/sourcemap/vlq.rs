//! Base64 VLQ codec used by the `mappings` field.

use crate::orchestrator::error::MalformedSourceMap;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const CONTINUATION_BIT: u32 = 1 << 5;
const DIGIT_MASK: u32 = CONTINUATION_BIT - 1;

fn digit_value(c: u8) -> Option<u32> {
    match c {
        b'A'..=b'Z' => Some(u32::from(c - b'A')),
        b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
        b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes every value of one segment (the text between two commas).
pub fn decode_segment(segment: &str) -> Result<Vec<i64>, MalformedSourceMap> {
    let mut values = Vec::with_capacity(5);
    let mut accumulator: i64 = 0;
    let mut shift = 0u32;
    let mut pending = false;

    for &byte in segment.as_bytes() {
        let digit = digit_value(byte).ok_or_else(|| {
            MalformedSourceMap(format!("invalid base64 VLQ character {:?}", byte as char))
        })?;
        if shift > 60 {
            return Err(MalformedSourceMap(format!(
                "VLQ value overflows in segment {:?}",
                segment
            )));
        }

        accumulator |= i64::from(digit & DIGIT_MASK) << shift;
        pending = digit & CONTINUATION_BIT != 0;

        if pending {
            shift += 5;
        } else {
            let negative = accumulator & 1 == 1;
            let magnitude = accumulator >> 1;
            values.push(if negative { -magnitude } else { magnitude });
            accumulator = 0;
            shift = 0;
        }
    }

    if pending {
        return Err(MalformedSourceMap(format!(
            "truncated VLQ value in segment {:?}",
            segment
        )));
    }

    Ok(values)
}

/// Appends the VLQ encoding of `value` to `out`.
pub fn encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };

    loop {
        let mut digit = (vlq as u32) & DIGIT_MASK;
        vlq >>= 5;
        if vlq > 0 {
            digit |= CONTINUATION_BIT;
        }
        out.push(ALPHABET[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_values() {
        assert_eq!(decode_segment("AAAA").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode_segment("ACDE").unwrap(), vec![0, 1, -1, 2]);
        assert_eq!(decode_segment("gB").unwrap(), vec![16]);
        assert_eq!(decode_segment("hB").unwrap(), vec![-16]);
    }

    #[test]
    fn encodes_known_values() {
        let mut out = String::new();
        for value in [0, 1, -1, 2, 16, -16, 1000] {
            encode(value, &mut out);
        }
        assert_eq!(out, "ACDEgBhBw+B");
        assert_eq!(
            decode_segment(&out).unwrap(),
            vec![0, 1, -1, 2, 16, -16, 1000]
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(decode_segment("A*").is_err());
        assert!(decode_segment("g").is_err());
    }
}
