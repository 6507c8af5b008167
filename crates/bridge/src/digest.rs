use md5::{Digest, Md5};

/// Hash capability used for the acknowledgement reply.
pub trait PayloadDigest {
    /// Lowercase hex digest of `bytes`.
    fn hex_digest(&self, bytes: &[u8]) -> String;
}

/// MD5, which is what the paired producer compares against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Digest;

impl Md5Digest {
    /// Length of the hex text written back into the content channel.
    pub const HEX_LEN: usize = 32;
}

impl PayloadDigest for Md5Digest {
    fn hex_digest(&self, bytes: &[u8]) -> String {
        hex::encode(Md5::digest(bytes))
    }
}

/// Read a NUL-terminated reply out of the content region.
pub fn read_reply(region: &[u8], max_len: usize) -> String {
    let field = &region[..max_len.min(region.len())];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Whether `text` has the shape of an MD5 hex digest.
pub fn looks_like_digest(text: &str) -> bool {
    text.len() == Md5Digest::HEX_LEN
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
