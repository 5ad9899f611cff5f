use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// How far into a document a `<meta charset>` declaration is looked for.
const META_SNIFF_BYTES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}")]
    Malformed { encoding: String },
}

/// Decodes an HTML body to UTF-8, picking the encoding from, in order:
/// BOM, Content-Type charset, `<meta charset>` in the head, chardetng guess.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedHtml, DecodeError> {
    let encoding = pick_encoding(bytes, content_type);
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::Malformed {
            encoding: actual.name().to_string(),
        });
    }
    Ok(DecodedHtml {
        html: text.into_owned(),
        encoding_label: actual.name().to_string(),
    })
}

/// Like `decode_html`, but replaces malformed sequences instead of failing.
/// Scraping only needs the ASCII parts of a page.
pub fn decode_html_lossy(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = pick_encoding(bytes, content_type);
    encoding.decode(bytes).0.into_owned()
}

fn pick_encoding(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    let declared = content_type
        .and_then(charset_param)
        .or_else(|| meta_charset(bytes));
    if let Some(enc) = declared.and_then(|label| Encoding::for_label(label.as_bytes())) {
        return enc;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_SNIFF_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();
    (!label.is_empty()).then_some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_charset_is_read_from_head() {
        let html = b"<html><head><meta charset=\"windows-1254\"></head><body>\xFE</body></html>";
        let decoded = decode_html(html, Some("text/html")).unwrap();
        assert_eq!(decoded.encoding_label, "windows-1254");
        assert!(decoded.html.contains('ş'));
    }

    #[test]
    fn header_charset_wins_over_meta() {
        let html = b"<meta charset=\"windows-1254\">caf\xe9";
        let decoded = decode_html(html, Some("text/html; Charset=\"ISO-8859-1\"")).unwrap();
        assert_eq!(decoded.html, "<meta charset=\"windows-1254\">café");
    }

    #[test]
    fn lossy_decode_never_fails() {
        let text = decode_html_lossy(b"ok \xFF\xFE\xFD", Some("text/html; charset=utf-8"));
        assert!(text.starts_with("ok "));
    }
}
