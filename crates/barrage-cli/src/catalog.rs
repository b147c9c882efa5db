//! Request catalog.
//!
//! A catalog is a JSON or YAML file holding the requests a team load tests:
//!
//! ```json
//! {"requests": [{"name": "List crocodiles", "endpoint": "/public/crocodiles/", "method": "GET"}]}
//! ```

use crate::error::{CliError, CliResult};
use barrage::request::{field_value, MULTIPART_FORM_DATA};
use barrage::{HttpMethod, TestConfig, TestType, DEFAULT_EXPECTED_STATUS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Threshold expressions for one metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSpec {
    /// A single expression
    One(String),
    /// Several expressions
    Many(Vec<String>),
}

impl ThresholdSpec {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(expr) => vec![expr],
            Self::Many(exprs) => exprs,
        }
    }
}

fn default_content_type() -> String {
    MULTIPART_FORM_DATA.to_string()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRequest {
    /// Display name
    pub name: String,
    /// Request path
    pub endpoint: String,
    /// HTTP method, any case
    pub method: String,
    /// Request payload
    #[serde(default = "empty_object")]
    pub payload: Value,
    /// Body content type
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Extra headers; non-string values are sent in their JSON form
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    /// Query parameters; non-string values are sent in their JSON form
    #[serde(default)]
    pub query_params: BTreeMap<String, Value>,
    /// Status that counts as a passed check
    #[serde(default)]
    pub expected_status: Option<u16>,
    /// Metric name to threshold expressions
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdSpec>,
}

/// Settings shared by every request of an invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget<'a> {
    /// Scheme and host
    pub base_url: &'a str,
    /// Bearer token, if any
    pub auth_token: Option<&'a str>,
    /// Peak concurrency
    pub peak: u32,
}

impl CatalogRequest {
    /// Build the config for one test type
    pub fn to_config(&self, test_type: TestType, target: &RunTarget<'_>) -> CliResult<TestConfig> {
        let method: HttpMethod = self.method.parse()?;
        let thresholds = self
            .thresholds
            .iter()
            .map(|(metric, spec)| (metric.clone(), spec.clone().into_vec()))
            .collect();

        let mut builder = TestConfig::builder(test_type, target.base_url, self.endpoint.as_str())
            .request_name(self.name.as_str())
            .method(method)
            .payload(self.payload.clone())
            .content_type(&self.content_type)
            .expected_status(self.expected_status.unwrap_or(DEFAULT_EXPECTED_STATUS))
            .peak_concurrency(target.peak)
            .headers(string_fields(&self.headers))
            .query_params(string_fields(&self.query_params))
            .thresholds(thresholds);
        if let Some(token) = target.auth_token {
            builder = builder.auth_token(token);
        }
        Ok(builder.build()?)
    }
}

fn string_fields(values: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), field_value(v)))
        .collect()
}

/// A loaded request catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Requests in file order
    pub requests: Vec<CatalogRequest>,
}

impl Catalog {
    /// Load a catalog; `.yaml` and `.yml` files are read as YAML, anything else as JSON
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("failed to read catalog {}: {e}", path.display()))
        })?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"));
        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Parse a JSON catalog
    pub fn from_json(content: &str) -> CliResult<Self> {
        let catalog: Self = serde_json::from_str(content)
            .map_err(|e| CliError::config(format!("invalid catalog: {e}")))?;
        catalog.ensure_not_empty()
    }

    /// Parse a YAML catalog
    pub fn from_yaml(content: &str) -> CliResult<Self> {
        let catalog: Self = serde_yaml_ng::from_str(content)
            .map_err(|e| CliError::config(format!("invalid catalog: {e}")))?;
        catalog.ensure_not_empty()
    }

    fn ensure_not_empty(self) -> CliResult<Self> {
        if self.requests.is_empty() {
            return Err(CliError::config("catalog has no requests"));
        }
        Ok(self)
    }

    /// Pick a request by exact name or 1-based index.
    ///
    /// With no selector the catalog must hold exactly one request.
    pub fn select(&self, selector: Option<&str>) -> CliResult<&CatalogRequest> {
        let Some(selector) = selector.map(str::trim) else {
            return match self.requests.as_slice() {
                [only] => Ok(only),
                _ => Err(CliError::config(format!(
                    "catalog has {} requests; choose one with --request",
                    self.requests.len()
                ))),
            };
        };

        if let Some(request) = self.requests.iter().find(|r| r.name == selector) {
            return Ok(request);
        }
        selector
            .parse::<usize>()
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| self.requests.get(index))
            .ok_or_else(|| {
                CliError::config(format!(
                    "no request '{selector}' (expected a name or a number from 1 to {})",
                    self.requests.len()
                ))
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use barrage::ContentKind;
    use std::io::Write;

    const JSON: &str = r#"{
        "requests": [
            {
                "name": "List crocodiles",
                "endpoint": "/public/crocodiles/",
                "method": "GET"
            },
            {
                "name": "Create user",
                "endpoint": "/users",
                "method": "post",
                "payload": {"name": "Ada", "age": 36},
                "contentType": "application/json",
                "headers": {"X-Trace": "1"},
                "queryParams": {"dryRun": "true"},
                "expectedStatus": 201,
                "thresholds": {
                    "http_req_duration": "p(95)<500",
                    "checks": ["rate>0.99"]
                }
            }
        ]
    }"#;

    fn target() -> RunTarget<'static> {
        RunTarget {
            base_url: "https://api.example.com",
            auth_token: Some("secret"),
            peak: 20,
        }
    }

    #[test]
    fn test_defaults() {
        let catalog = Catalog::from_json(JSON).unwrap();
        let first = &catalog.requests[0];
        assert_eq!(first.content_type, "multipart/form-data");
        assert_eq!(first.payload, serde_json::json!({}));
        assert!(first.headers.is_empty());
        assert_eq!(first.expected_status, None);
    }

    #[test]
    fn test_select_by_name_and_index() {
        let catalog = Catalog::from_json(JSON).unwrap();
        assert_eq!(catalog.select(Some("Create user")).unwrap().endpoint, "/users");
        assert_eq!(catalog.select(Some("1")).unwrap().name, "List crocodiles");
        assert_eq!(catalog.select(Some(" 2 ")).unwrap().name, "Create user");
        assert!(catalog.select(Some("0")).is_err());
        assert!(catalog.select(Some("3")).is_err());
        assert!(catalog.select(Some("Delete user")).is_err());
        assert!(catalog.select(None).is_err());
    }

    #[test]
    fn test_single_request_needs_no_selector() {
        let catalog = Catalog::from_json(
            r#"{"requests": [{"name": "Health", "endpoint": "/health", "method": "GET"}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.select(None).unwrap().name, "Health");
    }

    #[test]
    fn test_empty_catalog_is_config_error() {
        let err = Catalog::from_json(r#"{"requests": []}"#).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
        assert!(Catalog::from_json("{}").is_err());
        assert!(Catalog::from_json("not json").is_err());
    }

    #[test]
    fn test_to_config() {
        let catalog = Catalog::from_json(JSON).unwrap();
        let config = catalog
            .select(Some("Create user"))
            .unwrap()
            .to_config(TestType::Load, &target())
            .unwrap();
        assert_eq!(config.test_type, TestType::Load);
        assert_eq!(config.method, HttpMethod::Post);
        assert_eq!(config.request_name, "Create user");
        assert_eq!(config.content, ContentKind::Json);
        assert_eq!(config.expected_status, 201);
        assert_eq!(config.peak_concurrency, 20);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.extra_headers["X-Trace"], "1");
        assert_eq!(config.query_params["dryRun"], "true");
        assert_eq!(config.custom_thresholds["http_req_duration"], vec!["p(95)<500"]);
        assert_eq!(config.custom_thresholds["checks"], vec!["rate>0.99"]);
    }

    #[test]
    fn test_numeric_headers_and_query_params() {
        let catalog = Catalog::from_json(
            r#"{"requests": [{
                "name": "Page",
                "endpoint": "/items",
                "method": "GET",
                "queryParams": {"page": 2, "all": true, "q": "rust"},
                "headers": {"X-Version": 3}
            }]}"#,
        )
        .unwrap();
        let config = catalog.requests[0]
            .to_config(TestType::Smoke, &target())
            .unwrap();
        assert_eq!(config.query_params["page"], "2");
        assert_eq!(config.query_params["all"], "true");
        assert_eq!(config.query_params["q"], "rust");
        assert_eq!(config.extra_headers["X-Version"], "3");
    }

    #[test]
    fn test_bad_method_is_rejected() {
        let catalog = Catalog::from_json(
            r#"{"requests": [{"name": "x", "endpoint": "/", "method": "FETCH"}]}"#,
        )
        .unwrap();
        assert!(catalog.requests[0].to_config(TestType::Smoke, &target()).is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "requests:\n  - name: Health\n    endpoint: /health\n    method: GET\n    expectedStatus: 204"
        )
        .unwrap();
        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.requests[0].expected_status, Some(204));
    }

    #[test]
    fn test_missing_file() {
        let err = Catalog::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read catalog"));
    }
}
