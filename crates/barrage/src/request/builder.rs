//! Template -> concrete request.
//!
//! Auth injection depends on the content kind: JSON requests get an
//! `Authorization: Bearer` header, form requests get a `token` field, raw
//! bodies get neither.

use super::content::{encode_multipart, multipart_boundary};
use super::{flatten_fields, ConcreteRequest, ContentKind, RequestTemplate};
use serde_json::Value;
use std::collections::BTreeMap;

const CONTENT_TYPE: &str = "Content-Type";
const AUTHORIZATION: &str = "Authorization";

/// Builds concrete requests from a template.
///
/// Stateless: the same template and token always yield an identical
/// request, so every iteration can rebuild from scratch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBuilder;

/// Headers and body produced by one content kind
struct Encoded {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RequestBuilder {
    /// Build the request for one iteration.
    #[must_use]
    pub fn build(template: &RequestTemplate, token: Option<&str>) -> ConcreteRequest {
        let token = token.filter(|t| !t.is_empty());
        let encoded = match &template.content {
            ContentKind::Json => build_json(&template.payload, token),
            ContentKind::FormUrlEncoded => build_form_urlencoded(&template.payload, token),
            ContentKind::Multipart => build_multipart(&template.payload, token),
            ContentKind::Raw(content_type) => build_raw(&template.payload, content_type),
        };

        let mut headers: Vec<(String, String)> = template
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in encoded.headers {
            set_header(&mut headers, name, value);
        }

        ConcreteRequest {
            method: template.method,
            url: template.url(),
            headers,
            body: encoded.body,
        }
    }
}

/// Insert a header, replacing any existing header with the same name
/// regardless of case.
fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
    headers.push((name, value));
}

fn json_body(payload: &Value) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap_or_else(|_| b"{}".to_vec())
}

fn form_fields(payload: &Value, token: Option<&str>) -> BTreeMap<String, String> {
    let mut fields = flatten_fields(payload);
    if let Some(token) = token {
        fields.insert("token".to_string(), token.to_string());
    }
    fields
}

fn build_json(payload: &Value, token: Option<&str>) -> Encoded {
    let mut headers = vec![(CONTENT_TYPE.to_string(), ContentKind::Json.to_string())];
    if let Some(token) = token {
        headers.push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
    }
    Encoded {
        headers,
        body: json_body(payload),
    }
}

fn build_form_urlencoded(payload: &Value, token: Option<&str>) -> Encoded {
    let fields = form_fields(payload, token);
    let body = serde_urlencoded::to_string(&fields).unwrap_or_default();
    Encoded {
        headers: vec![(
            CONTENT_TYPE.to_string(),
            ContentKind::FormUrlEncoded.to_string(),
        )],
        body: body.into_bytes(),
    }
}

fn build_multipart(payload: &Value, token: Option<&str>) -> Encoded {
    let fields = form_fields(payload, token);
    let boundary = multipart_boundary(&fields);
    Encoded {
        headers: vec![(
            CONTENT_TYPE.to_string(),
            format!("{}; boundary={boundary}", ContentKind::Multipart),
        )],
        body: encode_multipart(&fields, &boundary),
    }
}

fn build_raw(payload: &Value, content_type: &str) -> Encoded {
    Encoded {
        headers: vec![(CONTENT_TYPE.to_string(), content_type.to_string())],
        body: json_body(payload),
    }
}
