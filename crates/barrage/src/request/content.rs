//! Body encodings.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Default content type when none is configured
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

const JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// How the payload is encoded into the request body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentKind {
    /// `application/json`; auth token goes in a bearer header
    Json,
    /// `application/x-www-form-urlencoded`; auth token goes in a `token` field
    FormUrlEncoded,
    /// `multipart/form-data` and other form types; auth token goes in a `token` field
    #[default]
    Multipart,
    /// Anything else, sent verbatim with the configured content type
    Raw(String),
}

impl ContentKind {
    /// Classify a configured content type
    #[must_use]
    pub fn parse(content_type: &str) -> Self {
        let trimmed = content_type.trim();
        if trimmed.eq_ignore_ascii_case(JSON) {
            Self::Json
        } else if trimmed.eq_ignore_ascii_case(FORM_URLENCODED) {
            Self::FormUrlEncoded
        } else if trimmed.to_ascii_lowercase().contains("form") {
            Self::Multipart
        } else {
            Self::Raw(trimmed.to_string())
        }
    }

    /// The configured content type, as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Json => JSON,
            Self::FormUrlEncoded => FORM_URLENCODED,
            Self::Multipart => MULTIPART_FORM_DATA,
            Self::Raw(ct) => ct,
        }
    }

    /// Form encodings carry the payload as a flat field map
    #[must_use]
    pub const fn is_form(&self) -> bool {
        matches!(self, Self::FormUrlEncoded | Self::Multipart)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ContentKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ContentKind> for String {
    fn from(kind: ContentKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Boundary derived from the field contents, so the same fields always
/// produce the same body.
pub(crate) fn multipart_boundary(fields: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in fields {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(12).map(|b| format!("{b:02x}")).collect();
    format!("barrage-{hex}")
}

/// Encode fields as a `multipart/form-data` document
pub(crate) fn encode_multipart(fields: &BTreeMap<String, String>, boundary: &str) -> Vec<u8> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{value}\r\n",
            name.replace('"', "%22")
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    body.into_bytes()
}
