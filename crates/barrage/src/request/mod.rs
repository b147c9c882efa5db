//! Request templates and the builder that turns them into concrete requests.
//!
//! - **Template**: the immutable request shape taken from the test config
//! - **Content**: the closed set of body encodings ([`ContentKind`])
//! - **Builder**: template + optional token -> [`ConcreteRequest`]

mod builder;
mod content;

pub use builder::RequestBuilder;
pub use content::{ContentKind, MULTIPART_FORM_DATA};

use crate::result::BarrageError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP methods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET method
    #[default]
    Get,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP DELETE method
    Delete,
    /// HTTP PATCH method
    Patch,
    /// HTTP HEAD method
    Head,
    /// HTTP OPTIONS method
    Options,
}

impl HttpMethod {
    /// Uppercase method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = BarrageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(BarrageError::config(format!(
                "unsupported HTTP method '{other}'"
            ))),
        }
    }
}

/// The request every virtual user sends, before auth injection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// HTTP method
    pub method: HttpMethod,
    /// Scheme and host, e.g. `https://api.example.com`
    pub base_url: String,
    /// Path appended to the base URL
    pub endpoint: String,
    /// Headers applied before derived headers
    pub headers: BTreeMap<String, String>,
    /// Query parameters, emitted in key order
    pub query: BTreeMap<String, String>,
    /// Request payload
    pub payload: Value,
    /// Body encoding
    pub content: ContentKind,
}

impl RequestTemplate {
    /// Full target URL including the encoded query string
    #[must_use]
    pub fn url(&self) -> String {
        let mut url = format!("{}{}", self.base_url, self.endpoint);
        if !self.query.is_empty() {
            let params: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }
}

/// A fully-formed request, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Header name/value pairs; names are unique ignoring case
    pub headers: Vec<(String, String)>,
    /// Encoded body
    pub body: Vec<u8>,
}

impl ConcreteRequest {
    /// Look up a header ignoring case
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Render a JSON value as a flat string field: strings verbatim, everything
/// else in its JSON encoding.
#[must_use]
pub fn field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a JSON object into string fields. Non-objects yield no fields.
#[must_use]
pub fn flatten_fields(value: &Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), field_value(v)))
                .collect()
        })
        .unwrap_or_default()
}
