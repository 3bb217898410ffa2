//! Generic HTTP adapter
//!
//! Response shape: `{status, headers, links, body}` where `links` holds the
//! parsed `Link` header (`rel` → url) and `body` is JSON when it parses,
//! text otherwise. Non-2xx statuses become failures through the adapter's
//! error detector, so they are retried like transport errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use super::{Adapter, AdapterCall, AdapterFailure};
use crate::schema::{ErrorDetector, Indicator, NextPage, ParamDescriptor, Pagination, Params, Schema};
use crate::util::constants::{HTTP_TIMEOUT, REDIRECT_LIMIT};

#[derive(Clone)]
pub struct HttpAdapter {
    /// Shared HTTP client (connection pooling)
    client: reqwest::Client,
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpAdapter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// `http.request`: one request per `url` value, result is the body
    pub fn request_schema() -> Schema {
        Schema::new("http.request", "http")
            .required("url", ParamDescriptor::new())
            .optional("query", ParamDescriptor::new().never_array())
            .optional("headers", ParamDescriptor::new().never_array())
            .optional("body", ParamDescriptor::new().never_array())
            .result_path("body")
    }

    /// `http.paged`: like `http.request`, following `Link: rel="next"`
    pub fn paged_schema() -> Schema {
        let mut schema = Self::request_schema().paginate(Pagination::new(
            Indicator::Path("links.next".into()),
            |params: &Params, response: &Value| {
                let next = response
                    .pointer("/links/next")
                    .cloned()
                    .ok_or_else(|| "response has no next link".to_string())?;
                let mut next_params = params.clone();
                next_params.insert("url".into(), next);
                // The next link already carries the query string
                next_params.remove("query");
                Ok(NextPage::Single(next_params))
            },
        ));
        schema.name = "http.paged".into();
        schema
    }
}

/// Resolve the request URL: `url` param, then apiConfig.url, then
/// apiConfig protocol/host/path. The `query` object is appended.
fn build_url(call: &AdapterCall<'_>) -> Result<Url, AdapterFailure> {
    let raw = match (call.params.get("url"), &call.config.url, &call.config.host) {
        (Some(Value::String(url)), _, _) => url.clone(),
        (_, Some(url), _) => url.clone(),
        (_, None, Some(host)) => format!(
            "{}://{}{}",
            call.config.protocol.as_deref().unwrap_or("https"),
            host,
            call.config.path.as_deref().unwrap_or("/")
        ),
        _ => return Err(AdapterFailure::new("http call has no url")),
    };

    let mut url = Url::parse(&raw).map_err(|e| AdapterFailure::new(format!("invalid url '{}': {}", raw, e)))?;

    if let Some(Value::Object(query)) = call.params.get("query") {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            match value {
                Value::Null => {}
                Value::String(s) => {
                    pairs.append_pair(key, s);
                }
                other => {
                    pairs.append_pair(key, &other.to_string());
                }
            }
        }
    }
    Ok(url)
}

/// Parse an RFC 8288 `Link` header into `rel` → url
fn parse_link_header(header: &str) -> Map<String, Value> {
    let mut links = Map::new();
    for part in header.split(',') {
        let mut sections = part.split(';');
        let Some(target) = sections.next() else { continue };
        let target = target.trim();
        let Some(url) = target.strip_prefix('<').and_then(|t| t.strip_suffix('>')) else {
            continue;
        };
        for attr in sections {
            let attr = attr.trim();
            if let Some(rel) = attr.strip_prefix("rel=") {
                for name in rel.trim_matches('"').split_whitespace() {
                    links.insert(name.to_string(), Value::String(url.to_string()));
                }
            }
        }
    }
    links
}

fn status_detector() -> ErrorDetector {
    Arc::new(
        |error: Option<&AdapterFailure>, response: Option<&Value>, _params: &Params| {
            if let Some(error) = error {
                return Some(error.clone());
            }
            let status = response
                .and_then(|r| r.get("status"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if (200..300).contains(&status) {
                None
            } else {
                Some(
                    AdapterFailure::new(format!("HTTP status {}", status))
                        .with_code(status.to_string()),
                )
            }
        },
    )
}

#[async_trait]
impl Adapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, call: &AdapterCall<'_>) -> Result<Value, AdapterFailure> {
        let url = build_url(call)?;
        let method = call.method().unwrap_or("GET").to_ascii_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| AdapterFailure::new(format!("invalid http method '{}'", method)))?;

        debug!(%method, %url, "http request");
        let mut request = self.client.request(method, url);

        for (key, value) in &call.config.headers {
            request = request.header(key, value);
        }
        if let Some(Value::Object(headers)) = call.params.get("headers") {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key, value);
                }
            }
        }
        if let Some(token) = &call.config.token {
            request = request.bearer_auth(token);
        } else if let Some(user) = &call.config.user {
            request = request.basic_auth(user, call.config.pass.as_deref());
        }
        if let Some(body) = call.params.get("body").filter(|b| !b.is_null()) {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdapterFailure::new(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let mut headers = Map::new();
        let mut links = Map::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else { continue };
            if *name == reqwest::header::LINK {
                links.extend(parse_link_header(value));
            }
            headers.insert(name.as_str().to_string(), Value::String(value.to_string()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AdapterFailure::new(format!("Failed to read response: {}", e)))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(serde_json::json!({
            "status": status,
            "headers": headers,
            "links": links,
            "body": body,
        }))
    }

    fn detect_errors(&self) -> Option<ErrorDetector> {
        Some(status_detector())
    }
}
