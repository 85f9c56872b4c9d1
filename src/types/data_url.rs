use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::InlineData;

/// A `data:<mime>;base64,<payload>` URL.
///
/// Generated images are kept inline in the session blob in this form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// MIME type of the payload, e.g. `image/png`.
    pub mime_type: String,

    /// Base64 payload.
    pub data: String,
}

impl DataUrl {
    /// Creates a data URL from its parts.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parses a base64 data URL, returning `None` for anything else.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        Some(Self::new(mime_type, data))
    }

    /// Decodes the payload.
    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD.decode(&self.data).map_err(|e| {
            Error::encoding(format!("invalid base64 payload: {e}"), Some(Box::new(e)))
        })
    }

    /// Size of the decoded payload in bytes, computed from the encoded length.
    pub fn decoded_len(&self) -> usize {
        let data = self.data.trim_end();
        let padding = data.chars().rev().take_while(|c| *c == '=').count();
        (data.len() / 4 * 3).saturating_sub(padding)
    }
}

impl From<&InlineData> for DataUrl {
    fn from(inline: &InlineData) -> Self {
        Self::new(inline.mime_type.clone(), inline.data.clone())
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format() {
        let url = DataUrl::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(url.mime_type, "image/png");
        assert_eq!(url.data, "aGVsbG8=");
        assert_eq!(url.to_string(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn rejects_non_base64_urls() {
        assert!(DataUrl::parse("https://example.com/a.png").is_none());
        assert!(DataUrl::parse("data:text/plain,hello").is_none());
    }

    #[test]
    fn decoded_len_matches_decode() {
        let url = DataUrl::new("image/png", "aGVsbG8=");
        assert_eq!(url.decoded_len(), 5);
        assert_eq!(url.decode().unwrap(), b"hello");
        let url = DataUrl::new("image/png", "aGVsbG8h");
        assert_eq!(url.decoded_len(), 6);
    }

    #[test]
    fn decode_reports_bad_payload() {
        let url = DataUrl::new("image/png", "***");
        assert!(matches!(url.decode(), Err(Error::Encoding { .. })));
    }
}
