//! Bounded codec for the size channel.
//!
//! The length travels as decimal ASCII followed by a NUL byte. `"0"` is the
//! "nothing pending" sentinel.

use crate::errors::BridgeError;

pub const SENTINEL: usize = 0;

/// Write `value` as decimal text plus NUL into `buf`.
///
/// Fails with `LengthOverflow` if the text does not fit; `buf` is left
/// untouched in that case.
pub fn encode(value: usize, buf: &mut [u8]) -> Result<(), BridgeError> {
    let text = value.to_string();
    let needed = text.len() + 1;
    if needed > buf.len() {
        return Err(BridgeError::LengthOverflow {
            value,
            capacity: buf.len(),
        });
    }
    buf[..text.len()].copy_from_slice(text.as_bytes());
    buf[text.len()] = 0;
    Ok(())
}

/// Parse the text up to the first NUL.
///
/// An empty field decodes to the sentinel: a freshly created segment is all
/// zero bytes.
pub fn decode(buf: &[u8]) -> Result<usize, BridgeError> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let field = &buf[..end];
    let text = std::str::from_utf8(field)
        .map_err(|_| BridgeError::InvalidLength(String::from_utf8_lossy(field).into_owned()))?
        .trim();

    if text.is_empty() {
        return Ok(SENTINEL);
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BridgeError::InvalidLength(text.to_string()));
    }
    text.parse()
        .map_err(|_| BridgeError::InvalidLength(text.to_string()))
}

/// Like [`decode`], but rejects lengths above `capacity`.
pub fn decode_bounded(buf: &[u8], capacity: usize) -> Result<usize, BridgeError> {
    let len = decode(buf)?;
    if len > capacity {
        return Err(BridgeError::PayloadTooLarge { len, capacity });
    }
    Ok(len)
}

/// Put the sentinel back.
pub fn reset(buf: &mut [u8]) -> Result<(), BridgeError> {
    encode(SENTINEL, buf)
}
