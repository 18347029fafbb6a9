//! Content and part types shared by requests and responses

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// A single turn of content made of one or more parts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// Producer of the content (`user` or `model`); omitted on single-turn requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a content block from parts with no explicit role
    #[must_use]
    pub const fn from_parts(parts: Vec<Part>) -> Self {
        Self { role: None, parts }
    }

    /// Concatenates the text parts, skipping anything that is not text
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let mut out = String::new();
        let mut found = false;
        for part in &self.parts {
            if let Part::Text { text } = part {
                out.push_str(text);
                found = true;
            }
        }
        found.then_some(out)
    }
}

/// A part of a content block
///
/// Requests use text and inline data; responses may carry other part kinds
/// (function calls, executable code) which are preserved as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    /// Plain text
    Text {
        /// The text content
        text: String,
    },
    /// Inline binary data (base64)
    InlineData {
        /// The blob payload
        #[serde(rename = "inline_data", alias = "inlineData")]
        inline_data: Blob,
    },
    /// Any other part kind
    Other(serde_json::Value),
}

impl Part {
    /// Creates a text part
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an inline data part, base64-encoding `bytes`
    #[must_use]
    pub fn inline(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::InlineData {
            inline_data: Blob::from_bytes(mime_type, bytes),
        }
    }
}

/// Inline binary payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Blob {
    /// IANA media type (e.g. `image/png`)
    #[serde(alias = "mimeType")]
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

impl Blob {
    /// Encodes raw bytes into a blob
    #[must_use]
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Decodes the base64 payload
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inline_part_serializes_snake_case() {
        let part = Part::inline("image/png", &[1, 2, 3]);
        let v = serde_json::to_value(&part).unwrap();
        assert_eq!(
            v,
            json!({"inline_data": {"mime_type": "image/png", "data": "AQID"}})
        );
    }

    #[test]
    fn inline_part_accepts_camel_case() {
        let part: Part = serde_json::from_value(json!({
            "inlineData": {"mimeType": "image/jpeg", "data": "AQID"}
        }))
        .unwrap();
        match part {
            Part::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/jpeg");
                assert_eq!(inline_data.decode().unwrap(), vec![1, 2, 3]);
            }
            other => panic!("Expected inline data, got {other:?}"),
        }
    }

    #[test]
    fn unknown_parts_are_preserved() {
        let part: Part =
            serde_json::from_value(json!({"functionCall": {"name": "f", "args": {}}})).unwrap();
        assert!(matches!(part, Part::Other(_)));
    }

    #[test]
    fn content_text_joins_text_parts_only() {
        let content = Content::from_parts(vec![
            Part::text("{\"a\":"),
            Part::inline("image/png", &[0]),
            Part::text("1}"),
        ]);
        assert_eq!(content.text().as_deref(), Some("{\"a\":1}"));
        assert_eq!(Content::default().text(), None);
    }
}
