//! Hex dumps of link chunks.

use crate::error::{ClientError, ClientResult};

/// Lowercase hex without separators.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    bytes
        .as_ref()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Parses hex, ignoring whitespace and `:` separators.
pub fn decode(text: &str) -> ClientResult<Vec<u8>> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(ClientError::invalid_input(format!(
            "odd number of hex digits in {:?}",
            text
        )));
    }

    digits
        .chunks(2)
        .map(|pair| Ok((nibble(pair[0], text)? << 4) | nibble(pair[1], text)?))
        .collect()
}

fn nibble(digit: u8, text: &str) -> ClientResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(ClientError::invalid_input(format!(
            "invalid hex digit {:?} in {:?}",
            char::from(digit),
            text
        ))),
    }
}
