//! Dotted-decimal IPv4 codec.
//!
//! Parsing is strict so that `decode(encode(x)) == x` holds for every
//! accepted input: no whitespace, signs, empty octets, or leading zeros.

use ct_common::{Error, Result};

fn invalid(input: &str, reason: impl Into<String>) -> Error {
    Error::InvalidAddress {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parse a dotted-decimal IPv4 address into its big-endian integer value.
pub fn encode(input: &str) -> Result<u32> {
    let found = input.split('.').count();
    if found != 4 {
        return Err(invalid(
            input,
            format!("expected 4 dot-separated octets, found {found}"),
        ));
    }

    let mut value: u32 = 0;
    for (i, part) in input.split('.').enumerate() {
        let octet_no = i + 1;
        if part.is_empty() {
            return Err(invalid(input, format!("octet {octet_no} is empty")));
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(input, format!("octet {octet_no} '{part}' is not numeric")));
        }
        if part.len() > 1 && part.starts_with('0') {
            return Err(invalid(input, format!("octet {octet_no} '{part}' has a leading zero")));
        }
        let octet: u32 = match part.parse() {
            Ok(n) if n <= 255 => n,
            _ => return Err(invalid(input, format!("octet {octet_no} '{part}' exceeds 255"))),
        };
        value = (value << 8) | octet;
    }
    Ok(value)
}

/// Render an integer address as dotted-decimal. Never fails.
pub fn decode(value: u32) -> String {
    let [a, b, c, d] = value.to_be_bytes();
    format!("{a}.{b}.{c}.{d}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reason(input: &str) -> String {
        match encode(input) {
            Err(Error::InvalidAddress { reason, .. }) => reason,
            other => panic!("expected InvalidAddress for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn encodes_known_addresses() {
        assert_eq!(encode("0.0.0.0").unwrap(), 0);
        assert_eq!(encode("192.168.1.1").unwrap(), 3_232_235_777);
        assert_eq!(encode("10.0.0.1").unwrap(), 167_772_161);
        assert_eq!(encode("255.255.255.255").unwrap(), u32::MAX);
    }

    #[test]
    fn decodes_known_values() {
        assert_eq!(decode(3_232_235_777), "192.168.1.1");
        assert_eq!(decode(0), "0.0.0.0");
        assert_eq!(decode(u32::MAX), "255.255.255.255");
    }

    #[test]
    fn rejects_wrong_octet_count() {
        assert!(reason("not-an-ip").contains("found 1"));
        assert!(reason("1.2.3").contains("found 3"));
        assert!(reason("1.2.3.4.5").contains("found 5"));
        assert!(reason("").contains("found 1"));
        // Count is checked before octet contents.
        assert!(reason("x.y").contains("found 2"));
    }

    #[test]
    fn rejects_out_of_range_octet() {
        assert!(reason("256.1.1.1").contains("exceeds 255"));
        assert!(reason("1.1.1.99999999999").contains("exceeds 255"));
    }

    #[test]
    fn rejects_non_numeric_and_malformed() {
        assert!(reason("a.b.c.d").contains("not numeric"));
        assert!(reason("1..2.3").contains("empty"));
        assert!(reason(" 1.2.3.4").contains("not numeric"));
        assert!(reason("+1.2.3.4").contains("not numeric"));
        assert!(reason("01.2.3.4").contains("leading zero"));
        assert!(reason("1.2.3.").contains("octet 4 is empty"));
    }

    proptest! {
        #[test]
        fn roundtrip_from_octets(a: u8, b: u8, c: u8, d: u8) {
            let text = format!("{a}.{b}.{c}.{d}");
            let value = encode(&text).unwrap();
            prop_assert_eq!(value, u32::from_be_bytes([a, b, c, d]));
            prop_assert_eq!(decode(value), text);
        }

        #[test]
        fn roundtrip_from_integer(value: u32) {
            prop_assert_eq!(encode(&decode(value)).unwrap(), value);
        }

        #[test]
        fn arbitrary_strings_never_panic(input in ".{0,24}") {
            if let Ok(value) = encode(&input) {
                prop_assert_eq!(decode(value), input);
            }
        }
    }
}
