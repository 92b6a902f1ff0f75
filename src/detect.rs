use crate::error::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes probed when sniffing a file's encoding.
pub const ENCODING_PROBE_BYTES: usize = 200_000;
/// Decoded characters sampled when sniffing the delimiter.
pub const DELIMITER_PROBE_CHARS: usize = 50_000;

/// Encodings seen across regulator files. Detection cannot fail: latin-1
/// decodes every byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8Bom,
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8Bom => "utf-8-bom",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
        }
    }
}

/// Sniffs the encoding of a byte sample: utf-8 with BOM, then plain utf-8,
/// then latin-1 as the guaranteed fallback.
pub fn detect_encoding(sample: &[u8]) -> TextEncoding {
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) && std::str::from_utf8(&sample[3..]).is_ok() {
        return TextEncoding::Utf8Bom;
    }
    if std::str::from_utf8(sample).is_ok() {
        return TextEncoding::Utf8;
    }
    TextEncoding::Latin1
}

pub fn detect_file_encoding(path: &Path) -> Result<TextEncoding> {
    let mut probe = vec![0u8; ENCODING_PROBE_BYTES];
    let mut file = File::open(path)?;
    let mut read = 0;
    while read < probe.len() {
        let n = file.read(&mut probe[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    probe.truncate(read);
    Ok(detect_encoding(&probe))
}

pub fn decode(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        // encoding_rs strips the BOM when present.
        TextEncoding::Utf8Bom | TextEncoding::Utf8 => {
            let (text, _, _) = encoding_rs::UTF_8.decode(bytes);
            text.into_owned()
        }
        TextEncoding::Latin1 => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// Reads and decodes a whole file, returning the detected encoding alongside.
pub fn read_decoded(path: &Path) -> Result<(String, TextEncoding)> {
    let bytes = std::fs::read(path)?;
    let probe = &bytes[..bytes.len().min(ENCODING_PROBE_BYTES)];
    let encoding = detect_encoding(probe);
    Ok((decode(&bytes, encoding), encoding))
}

/// Picks `;` vs `,` by counting occurrences in the sample head; `;` wins ties.
pub fn detect_delimiter(decoded: &str) -> u8 {
    let sample: String = decoded.chars().take(DELIMITER_PROBE_CHARS).collect();
    let semicolons = sample.matches(';').count();
    let commas = sample.matches(',').count();
    if semicolons >= commas {
        b';'
    } else {
        b','
    }
}
