//! Fuzz target for the dotted-decimal IPv4 codec.
//!
//! Arbitrary strings must never panic the parser, and every accepted
//! address must round-trip exactly.

#![no_main]

use arbitrary::Arbitrary;
use ct_core::encode::ip;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Input<'a> {
    Text(&'a str),
    Octets([u8; 4]),
}

fuzz_target!(|input: Input<'_>| {
    match input {
        Input::Text(text) => {
            if let Ok(value) = ip::encode(text) {
                assert_eq!(ip::decode(value), text);
            }
        }
        Input::Octets(o) => {
            let text = format!("{}.{}.{}.{}", o[0], o[1], o[2], o[3]);
            let value = ip::encode(&text).expect("canonical address parses");
            assert_eq!(value, u32::from_be_bytes(o));
            assert_eq!(ip::decode(value), text);
        }
    }
});
