//! Test configuration.
//!
//! A [`TestConfig`] is parsed once, validated, and then shared immutably by
//! every component of a run. Nothing below this module reads the process
//! environment; [`TestConfig::from_env`] takes the variables as an explicit
//! map.

use crate::metrics::ThresholdSet;
use crate::profile::{derive_plan, ExecutorSpec, TestType};
use crate::request::{field_value, ContentKind, HttpMethod, RequestTemplate, MULTIPART_FORM_DATA};
use crate::result::{BarrageError, BarrageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Default expected status when none is configured
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Environment variable names understood by [`TestConfig::from_env`]
pub mod env {
    /// Profile name
    pub const TEST_TYPE: &str = "TEST_TYPE";
    /// Scheme and host
    pub const BASE_URL: &str = "BASE_URL";
    /// Request path
    pub const ENDPOINT: &str = "ENDPOINT";
    /// HTTP method
    pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
    /// Display name used in reports
    pub const REQUEST_NAME: &str = "REQUEST_NAME";
    /// Optional auth token
    pub const AUTH_TOKEN: &str = "AUTH_TOKEN";
    /// JSON payload
    pub const REQUEST_PAYLOAD: &str = "REQUEST_PAYLOAD";
    /// Content type
    pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
    /// Expected response status
    pub const EXPECTED_STATUS: &str = "EXPECTED_STATUS";
    /// Peak virtual users
    pub const PEAK_VUS: &str = "PEAK_VUS";
    /// JSON object of extra headers
    pub const REQUEST_HEADERS: &str = "REQUEST_HEADERS";
    /// JSON object of query parameters
    pub const QUERY_PARAMS: &str = "QUERY_PARAMS";
    /// JSON object of metric name -> threshold expressions
    pub const THRESHOLDS: &str = "THRESHOLDS";
}

/// Everything a single load test run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Load profile
    pub test_type: TestType,
    /// Scheme and host
    pub base_url: String,
    /// Request path
    pub endpoint: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Display name used in reports and artifact names
    pub request_name: String,
    /// Optional auth token
    pub auth_token: Option<String>,
    /// Request payload
    pub payload: Value,
    /// Body encoding
    pub content: ContentKind,
    /// Status that counts as a passed check
    pub expected_status: u16,
    /// Peak concurrency the profile scales from
    pub peak_concurrency: u32,
    /// Caller thresholds, merged with the global safety threshold at run time
    pub custom_thresholds: BTreeMap<String, Vec<String>>,
    /// Headers applied before derived headers
    pub extra_headers: BTreeMap<String, String>,
    /// Query parameters
    pub query_params: BTreeMap<String, String>,
}

impl TestConfig {
    /// Start building a config from its required fields
    #[must_use]
    pub fn builder(
        test_type: TestType,
        base_url: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> TestConfigBuilder {
        TestConfigBuilder::new(test_type, base_url, endpoint)
    }

    /// Build a config from environment-style variables.
    ///
    /// Required: `TEST_TYPE`, `BASE_URL`, `ENDPOINT`, `REQUEST_METHOD`,
    /// `PEAK_VUS`. JSON-valued variables must parse, and an empty
    /// `AUTH_TOKEN` means no token.
    pub fn from_env(vars: &HashMap<String, String>) -> BarrageResult<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| BarrageError::config(format!("missing required variable {key}")))
        };

        let test_type: TestType = require(env::TEST_TYPE)?.parse()?;
        let method: HttpMethod = require(env::REQUEST_METHOD)?.parse()?;
        let peak = parse_number::<u32>(env::PEAK_VUS, require(env::PEAK_VUS)?)?;
        let expected_status = get(env::EXPECTED_STATUS)
            .map(|v| parse_number::<u16>(env::EXPECTED_STATUS, v))
            .transpose()?
            .unwrap_or(DEFAULT_EXPECTED_STATUS);

        let mut builder = TestConfig::builder(
            test_type,
            require(env::BASE_URL)?,
            require(env::ENDPOINT)?,
        )
        .method(method)
        .peak_concurrency(peak)
        .expected_status(expected_status)
        .content_type(get(env::CONTENT_TYPE).unwrap_or(MULTIPART_FORM_DATA));

        if let Some(name) = get(env::REQUEST_NAME) {
            builder = builder.request_name(name);
        }
        if let Some(token) = get(env::AUTH_TOKEN) {
            builder = builder.auth_token(token);
        }
        if let Some(payload) = get(env::REQUEST_PAYLOAD) {
            builder = builder.payload(parse_json(env::REQUEST_PAYLOAD, payload)?);
        }
        if let Some(headers) = get(env::REQUEST_HEADERS) {
            builder = builder.headers(parse_string_map(env::REQUEST_HEADERS, headers)?);
        }
        if let Some(query) = get(env::QUERY_PARAMS) {
            builder = builder.query_params(parse_string_map(env::QUERY_PARAMS, query)?);
        }
        if let Some(thresholds) = get(env::THRESHOLDS) {
            builder = builder.thresholds(parse_thresholds(thresholds)?);
        }

        builder.build()
    }

    /// Check the invariants every run relies on
    pub fn validate(&self) -> BarrageResult<()> {
        if self.base_url.is_empty() {
            return Err(BarrageError::config("base URL must not be empty"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(BarrageError::config(format!(
                "base URL '{}' must start with http:// or https://",
                self.base_url
            )));
        }
        if self.peak_concurrency == 0 {
            return Err(BarrageError::config("peak concurrency must be positive"));
        }
        if !(100..=599).contains(&self.expected_status) {
            return Err(BarrageError::config(format!(
                "expected status {} is not an HTTP status code",
                self.expected_status
            )));
        }
        if self.content.is_form() && !(self.payload.is_object() || self.payload.is_null()) {
            return Err(BarrageError::config(format!(
                "{} payload must be a JSON object of fields",
                self.content
            )));
        }
        self.thresholds()?;
        Ok(())
    }

    /// Request template shared by every virtual user
    #[must_use]
    pub fn template(&self) -> RequestTemplate {
        RequestTemplate {
            method: self.method,
            base_url: self.base_url.clone(),
            endpoint: self.endpoint.clone(),
            headers: self.extra_headers.clone(),
            query: self.query_params.clone(),
            payload: self.payload.clone(),
            content: self.content.clone(),
        }
    }

    /// The stage plan this config runs
    #[must_use]
    pub fn plan(&self) -> ExecutorSpec {
        derive_plan(self.test_type, self.peak_concurrency)
    }

    /// Caller thresholds merged with the global safety threshold
    pub fn thresholds(&self) -> BarrageResult<ThresholdSet> {
        ThresholdSet::with_defaults(&self.custom_thresholds)
    }
}

/// Builder for [`TestConfig`]
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: TestConfig,
}

impl TestConfigBuilder {
    fn new(test_type: TestType, base_url: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            config: TestConfig {
                test_type,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                endpoint: endpoint.into(),
                method: HttpMethod::Get,
                request_name: String::new(),
                auth_token: None,
                payload: Value::Object(serde_json::Map::new()),
                content: ContentKind::default(),
                expected_status: DEFAULT_EXPECTED_STATUS,
                peak_concurrency: 1,
                custom_thresholds: BTreeMap::new(),
                extra_headers: BTreeMap::new(),
                query_params: BTreeMap::new(),
            },
        }
    }

    /// Set the HTTP method
    #[must_use]
    pub const fn method(mut self, method: HttpMethod) -> Self {
        self.config.method = method;
        self
    }

    /// Set the request display name
    #[must_use]
    pub fn request_name(mut self, name: impl Into<String>) -> Self {
        self.config.request_name = name.into();
        self
    }

    /// Set the auth token
    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.config.auth_token = (!token.is_empty()).then_some(token);
        self
    }

    /// Set the payload
    #[must_use]
    pub fn payload(mut self, payload: Value) -> Self {
        self.config.payload = payload;
        self
    }

    /// Set the content type
    #[must_use]
    pub fn content_type(mut self, content_type: &str) -> Self {
        self.config.content = ContentKind::parse(content_type);
        self
    }

    /// Set the expected status
    #[must_use]
    pub const fn expected_status(mut self, status: u16) -> Self {
        self.config.expected_status = status;
        self
    }

    /// Set the peak concurrency
    #[must_use]
    pub const fn peak_concurrency(mut self, peak: u32) -> Self {
        self.config.peak_concurrency = peak;
        self
    }

    /// Add a caller threshold expression for a metric
    #[must_use]
    pub fn threshold(mut self, metric: impl Into<String>, expression: impl Into<String>) -> Self {
        self.config
            .custom_thresholds
            .entry(metric.into())
            .or_default()
            .push(expression.into());
        self
    }

    /// Replace the caller thresholds
    #[must_use]
    pub fn thresholds(mut self, thresholds: BTreeMap<String, Vec<String>>) -> Self {
        self.config.custom_thresholds = thresholds;
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Replace the headers
    #[must_use]
    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.config.extra_headers = headers;
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.query_params.insert(name.into(), value.into());
        self
    }

    /// Replace the query parameters
    #[must_use]
    pub fn query_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.config.query_params = params;
        self
    }

    /// Validate and finish
    pub fn build(mut self) -> BarrageResult<TestConfig> {
        if self.config.request_name.is_empty() {
            self.config.request_name = self.config.endpoint.clone();
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> BarrageResult<T> {
    raw.parse()
        .map_err(|_| BarrageError::config(format!("{key} must be a non-negative integer, got '{raw}'")))
}

fn parse_json(key: &str, raw: &str) -> BarrageResult<Value> {
    serde_json::from_str(raw).map_err(|e| BarrageError::config(format!("{key} is not valid JSON: {e}")))
}

/// Parse a JSON object whose values become strings
pub fn parse_string_map(key: &str, raw: &str) -> BarrageResult<BTreeMap<String, String>> {
    match parse_json(key, raw)? {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), field_value(v))).collect()),
        Value::Null => Ok(BTreeMap::new()),
        _ => Err(BarrageError::config(format!("{key} must be a JSON object"))),
    }
}

/// Parse `{"metric": ["expr", ...]}`; a bare string is accepted as a
/// one-element list.
pub fn parse_thresholds(raw: &str) -> BarrageResult<BTreeMap<String, Vec<String>>> {
    let value = parse_json(env::THRESHOLDS, raw)?;
    let Value::Object(map) = value else {
        return Err(BarrageError::config("THRESHOLDS must be a JSON object"));
    };
    map.into_iter()
        .map(|(metric, exprs)| {
            let list = match exprs {
                Value::String(s) => vec![s],
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s),
                        other => Err(BarrageError::config(format!(
                            "threshold for {metric} must be a string, got {other}"
                        ))),
                    })
                    .collect::<BarrageResult<Vec<_>>>()?,
                other => {
                    return Err(BarrageError::config(format!(
                        "thresholds for {metric} must be a list, got {other}"
                    )))
                }
            };
            Ok((metric, list))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env_vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn minimal_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (env::TEST_TYPE, "smoke"),
            (env::BASE_URL, "https://test-api.k6.io"),
            (env::ENDPOINT, "/public/crocodiles/"),
            (env::REQUEST_METHOD, "get"),
            (env::PEAK_VUS, "5"),
        ]
    }

    #[test]
    fn test_from_env_minimal() {
        let config = TestConfig::from_env(&env_vars(&minimal_env())).unwrap();
        assert_eq!(config.test_type, TestType::Smoke);
        assert_eq!(config.method, HttpMethod::Get);
        assert_eq!(config.peak_concurrency, 5);
        assert_eq!(config.expected_status, 200);
        assert_eq!(config.content, ContentKind::Multipart);
        assert_eq!(config.request_name, "/public/crocodiles/");
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_from_env_full() {
        let mut vars = minimal_env();
        vars.extend([
            (env::REQUEST_NAME, "List crocodiles"),
            (env::AUTH_TOKEN, "secret"),
            (env::REQUEST_PAYLOAD, r#"{"a": 1}"#),
            (env::CONTENT_TYPE, "application/json"),
            (env::EXPECTED_STATUS, "201"),
            (env::REQUEST_HEADERS, r#"{"X-Env": "staging"}"#),
            (env::QUERY_PARAMS, r#"{"limit": 10}"#),
            (env::THRESHOLDS, r#"{"http_req_duration": ["p(95)<500"]}"#),
        ]);
        let config = TestConfig::from_env(&env_vars(&vars)).unwrap();
        assert_eq!(config.request_name, "List crocodiles");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.payload, json!({"a": 1}));
        assert_eq!(config.content, ContentKind::Json);
        assert_eq!(config.expected_status, 201);
        assert_eq!(config.extra_headers["X-Env"], "staging");
        assert_eq!(config.query_params["limit"], "10");
        assert_eq!(config.custom_thresholds["http_req_duration"], vec!["p(95)<500"]);
    }

    #[test]
    fn test_from_env_unknown_test_type() {
        let mut vars = minimal_env();
        vars[0] = (env::TEST_TYPE, "chaos");
        let err = TestConfig::from_env(&env_vars(&vars)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_env_missing_required() {
        let vars: Vec<_> = minimal_env()
            .into_iter()
            .filter(|(k, _)| *k != env::BASE_URL)
            .collect();
        let err = TestConfig::from_env(&env_vars(&vars)).unwrap_err();
        assert!(err.to_string().contains("BASE_URL"));
    }

    #[test]
    fn test_from_env_malformed_json() {
        for key in [env::REQUEST_PAYLOAD, env::REQUEST_HEADERS, env::QUERY_PARAMS, env::THRESHOLDS] {
            let mut vars = minimal_env();
            vars.push((key, "{not json"));
            let err = TestConfig::from_env(&env_vars(&vars)).unwrap_err();
            assert!(err.is_config(), "{key} should be a config error");
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_from_env_empty_token_is_none() {
        let mut vars = minimal_env();
        vars.push((env::AUTH_TOKEN, ""));
        let config = TestConfig::from_env(&env_vars(&vars)).unwrap();
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_bad_peak() {
        let mut vars = minimal_env();
        vars[4] = (env::PEAK_VUS, "lots");
        assert!(TestConfig::from_env(&env_vars(&vars)).unwrap_err().is_config());
        vars[4] = (env::PEAK_VUS, "0");
        assert!(TestConfig::from_env(&env_vars(&vars)).unwrap_err().is_config());
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let config = TestConfig::builder(TestType::Load, "http://localhost:3000/", "/health")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.template().url(), "http://localhost:3000/health");
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let err = TestConfig::builder(TestType::Smoke, "ftp://x", "/")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_validate_rejects_form_array_payload() {
        let err = TestConfig::builder(TestType::Smoke, "http://x", "/")
            .content_type("application/x-www-form-urlencoded")
            .payload(json!([1, 2]))
            .build()
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let err = TestConfig::builder(TestType::Smoke, "http://x", "/")
            .threshold("http_req_duration", "fast please")
            .build()
            .unwrap_err();
        assert!(err.is_config());

        let err = TestConfig::builder(TestType::Smoke, "http://x", "/")
            .threshold("checks", "p(95)<100")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("has no stat 'p(95)'"), "{err}");
    }

    #[test]
    fn test_plan_follows_test_type() {
        let config = TestConfig::builder(TestType::Load, "http://x", "/")
            .peak_concurrency(10)
            .build()
            .unwrap();
        assert_eq!(config.plan().max_target(), 10);
    }

    #[test]
    fn test_parse_thresholds_accepts_single_string() {
        let parsed = parse_thresholds(r#"{"checks": "rate>0.99"}"#).unwrap();
        assert_eq!(parsed["checks"], vec!["rate>0.99"]);
        assert!(parse_thresholds(r#"{"checks": [1]}"#).is_err());
        assert!(parse_thresholds("[]").is_err());
    }
}
