//! Byte-to-text decoding for uploaded documents.
//!
//! Windows tools (WhatsApp desktop among them) export UTF-16LE with a byte
//! order mark; everything else is treated as UTF-8. Decoding never fails:
//! invalid sequences become U+FFFD.

const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Encoding picked for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
}

impl Encoding {
    /// Sniff the encoding from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(&UTF16LE_BOM) {
            Encoding::Utf16Le
        } else {
            Encoding::Utf8
        }
    }
}

/// Decode an upload to text.
pub fn decode(bytes: &[u8]) -> String {
    match Encoding::sniff(bytes) {
        Encoding::Utf16Le => decode_utf16le(&bytes[UTF16LE_BOM.len()..]),
        Encoding::Utf8 => {
            let body = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
            String::from_utf8_lossy(body).into_owned()
        }
    }
}

/// Decode UTF-16LE code units; a dangling odd byte is dropped.
fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
