use serde_json::{json, Map};

use super::ParsedDocument;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Decoded text, the encoding it was read as, and whether a BOM was present.
pub fn decode(bytes: &[u8]) -> (String, &'static str, bool) {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return (String::from_utf8_lossy(rest).into_owned(), "utf-8", true);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return (decode_utf16(rest, u16::from_le_bytes), "utf-16le", true);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return (decode_utf16(rest, u16::from_be_bytes), "utf-16be", true);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), "utf-8", false),
        // every byte is a valid latin-1 code point
        Err(_) => (bytes.iter().map(|&b| b as char).collect(), "latin-1", false),
    }
}

fn decode_utf16(bytes: &[u8], word: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| word([pair[0], pair[1]])).collect();
    String::from_utf16_lossy(&units)
}

pub fn parse(bytes: &[u8]) -> ParsedDocument {
    let (text, encoding, has_bom) = decode(bytes);

    let lines: Vec<_> = text
        .lines()
        .enumerate()
        .map(|(i, line)| json!({"line_number": i + 1, "text": line}))
        .collect();

    let mut structure = Map::new();
    structure.insert("line_count".into(), json!(lines.len()));
    structure.insert("lines".into(), json!(lines));

    let mut metadata = Map::new();
    metadata.insert("encoding".into(), json!(encoding));
    metadata.insert("has_bom".into(), json!(has_bom));

    ParsedDocument {
        document_type: "text",
        full_text: text,
        structure,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_utf8() {
        let (text, encoding, bom) = decode("Café report".as_bytes());
        assert_eq!(text, "Café report");
        assert_eq!(encoding, "utf-8");
        assert!(!bom);
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"Summary");
        let (text, _, bom) = decode(&bytes);
        assert_eq!(text, "Summary");
        assert!(bom);
    }

    #[test]
    fn test_utf16_both_orders() {
        let mut le = UTF16_LE_BOM.to_vec();
        let mut be = UTF16_BE_BOM.to_vec();
        for unit in "Hi é".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
            be.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode(&le), ("Hi é".to_string(), "utf-16le", true));
        assert_eq!(decode(&be), ("Hi é".to_string(), "utf-16be", true));
    }

    #[test]
    fn test_latin1_fallback() {
        let (text, encoding, _) = decode(&[b'C', b'a', b'f', 0xE9]);
        assert_eq!(text, "Café");
        assert_eq!(encoding, "latin-1");
    }

    #[test]
    fn test_parse_numbers_lines() {
        let parsed = parse(b"first\nsecond\n");
        assert_eq!(parsed.structure["line_count"], 2);
        assert_eq!(parsed.structure["lines"][1]["line_number"], 2);
        assert_eq!(parsed.metadata["encoding"], "utf-8");
    }
}
