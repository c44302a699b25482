//! HTTP request effect.
//!
//! Sends one request with `reqwest` and posts exactly one message: the
//! success action with the extracted body, or the error action with the
//! failure. A non-2xx status counts as a failure and carries the captured
//! response.
//!
//! # Example
//!
//! ```ignore
//! use webfx::{Action, HttpOptions, HttpProps, ResponseKind, http};
//!
//! let load = http(
//!     HttpProps::new("https://api.example.com/todos", Action::new(Msg::TodosLoaded))
//!         .options(HttpOptions::new().with_header("accept", "application/json"))
//!         .response(ResponseKind::Json)
//!         .error(Action::new(Msg::TodosFailed)),
//! );
//! runtime.run(load);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dispatch::{Action, Dispatch};
use crate::error::{Error, Result};

use super::Effect;

// ============================================================================
// Types
// ============================================================================

/// Payload of both HTTP actions.
pub type HttpResult = Result<ResponseBody>;

// ============================================================================
// ResponseKind
// ============================================================================

/// How the response body is extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Parse as JSON.
    #[default]
    Json,
    /// Decode as text.
    Text,
    /// Raw bytes.
    #[serde(alias = "arrayBuffer", alias = "blob")]
    Bytes,
}

impl ResponseKind {
    /// Method name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Bytes => "bytes",
        }
    }

    /// Reads the body of `response`.
    async fn extract(self, response: Response) -> Result<ResponseBody> {
        match self {
            Self::Json => response
                .json::<Value>()
                .await
                .map(ResponseBody::Json)
                .map_err(|e| Error::body_extraction(self, e.to_string())),
            Self::Text => response
                .text()
                .await
                .map(ResponseBody::Text)
                .map_err(|e| Error::body_extraction(self, e.to_string())),
            Self::Bytes => response
                .bytes()
                .await
                .map(|bytes| ResponseBody::Bytes(bytes.to_vec()))
                .map_err(|e| Error::body_extraction(self, e.to_string())),
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "bytes" | "arrayBuffer" | "blob" => Ok(Self::Bytes),
            other => Err(Error::invalid_argument(format!(
                "Unknown response method: {other}"
            ))),
        }
    }
}

// ============================================================================
// ResponseBody
// ============================================================================

/// Extracted response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Parsed JSON.
    Json(Value),
    /// Text body.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl ResponseBody {
    /// Returns the JSON value, if extracted as JSON.
    #[inline]
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if extracted as text.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the body does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        Ok(match self {
            Self::Json(value) => serde_json::from_value(value)?,
            Self::Text(text) => serde_json::from_str(&text)?,
            Self::Bytes(data) => serde_json::from_slice(&data)?,
        })
    }
}

// ============================================================================
// FailedResponse
// ============================================================================

/// A response with a non-2xx status.
#[derive(Debug, Clone)]
pub struct FailedResponse {
    /// Status code.
    pub status: StatusCode,
    /// Final URL after redirects.
    pub url: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body text, empty if it could not be read.
    pub body: String,
}

impl FailedResponse {
    /// Captures status, URL, headers and body.
    async fn capture(response: Response) -> Self {
        let status = response.status();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();

        Self {
            status,
            url,
            headers,
            body,
        }
    }
}

// ============================================================================
// RequestBody
// ============================================================================

/// Request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RequestBody {
    /// Text body, sent as-is.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// JSON body; sets `content-type: application/json`.
    Json(Value),
}

// ============================================================================
// HttpOptions
// ============================================================================

/// Request options passed through to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    /// HTTP method name.
    pub method: String,

    /// Headers in insertion order.
    pub headers: Vec<(String, String)>,

    /// Optional body.
    pub body: Option<RequestBody>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

impl HttpOptions {
    /// Creates options for a plain GET.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the method.
    #[inline]
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Adds a header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds several headers.
    #[inline]
    #[must_use]
    pub fn with_headers(
        mut self,
        headers: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.headers
            .extend(headers.into_iter().map(|(n, v)| (n.into(), v.into())));
        self
    }

    /// Sets the body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a JSON body.
    #[inline]
    #[must_use]
    pub fn with_json(self, value: Value) -> Self {
        self.with_body(RequestBody::Json(value))
    }

    /// Parses the method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid method token.
    pub fn method(&self) -> Result<Method> {
        Method::from_bytes(self.method.as_bytes())
            .map_err(|_| Error::invalid_argument(format!("Invalid HTTP method: {}", self.method)))
    }

    /// Validates method and headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on the first invalid entry.
    pub fn validate(&self) -> Result<()> {
        self.method()?;

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::invalid_argument(format!("Invalid header name: {name}")))?;
            HeaderValue::from_str(value).map_err(|_| {
                Error::invalid_argument(format!("Invalid value for header {name}"))
            })?;
        }

        Ok(())
    }

    /// Applies headers and body to a request.
    fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match &self.body {
            Some(RequestBody::Text(text)) => request.body(text.clone()),
            Some(RequestBody::Bytes(data)) => request.body(data.clone()),
            Some(RequestBody::Json(value)) => request.json(value),
            None => request,
        }
    }
}

// ============================================================================
// HttpProps
// ============================================================================

/// Configuration of one HTTP effect.
pub struct HttpProps<M> {
    /// Target URL.
    pub url: String,
    /// Request options.
    pub options: HttpOptions,
    /// Body extraction method.
    pub response: ResponseKind,
    /// Action for a successful response.
    pub action: Action<M, HttpResult>,
    /// Action for any failure; `action` when unset.
    pub error: Option<Action<M, HttpResult>>,
}

impl<M> HttpProps<M> {
    /// Creates a GET request for `url` reporting to `action`.
    #[must_use]
    pub fn new(url: impl Into<String>, action: impl Into<Action<M, HttpResult>>) -> Self {
        Self {
            url: url.into(),
            options: HttpOptions::default(),
            response: ResponseKind::default(),
            action: action.into(),
            error: None,
        }
    }

    /// Sets the request options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: HttpOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the body extraction method.
    #[inline]
    #[must_use]
    pub fn response(mut self, kind: ResponseKind) -> Self {
        self.response = kind;
        self
    }

    /// Sets a separate failure action.
    #[inline]
    #[must_use]
    pub fn error(mut self, action: impl Into<Action<M, HttpResult>>) -> Self {
        self.error = Some(action.into());
        self
    }

    /// The action failures are reported to.
    #[inline]
    #[must_use]
    pub fn error_action(&self) -> &Action<M, HttpResult> {
        self.error.as_ref().unwrap_or(&self.action)
    }
}

impl<M> Clone for HttpProps<M> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            options: self.options.clone(),
            response: self.response,
            action: self.action.clone(),
            error: self.error.clone(),
        }
    }
}

impl<M> fmt::Debug for HttpProps<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProps")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("response", &self.response)
            .field("error", &self.error.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Constructor
// ============================================================================

/// Describes an HTTP effect.
#[inline]
#[must_use]
pub fn http<M>(props: HttpProps<M>) -> Effect<M> {
    Effect::Http(props)
}

// ============================================================================
// Execution
// ============================================================================

/// Runs the request and dispatches exactly one message.
pub(crate) async fn perform<M>(client: Client, props: HttpProps<M>, dispatch: Dispatch<M>) {
    debug!(url = %props.url, method = %props.options.method, "HTTP request");

    match fetch(&client, &props.url, &props.options, props.response).await {
        Ok(body) => {
            debug!(url = %props.url, "HTTP request succeeded");
            dispatch.action(&props.action, Ok(body));
        }
        Err(e) => {
            debug!(url = %props.url, error = %e, "HTTP request failed");
            dispatch.action(props.error_action(), Err(e));
        }
    }
}

/// Sends the request and extracts the body.
async fn fetch(
    client: &Client,
    url: &str,
    options: &HttpOptions,
    kind: ResponseKind,
) -> Result<ResponseBody> {
    let method = options.method()?;
    let response = options.apply(client.request(method, url)).send().await?;

    if !response.status().is_success() {
        return Err(Error::http_status(FailedResponse::capture(response).await));
    }

    kind.extract(response).await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug)]
    enum Msg {
        Loaded(HttpResult),
        Failed(HttpResult),
    }

    async fn run(props: HttpProps<Msg>) -> Msg {
        let (dispatch, mut rx) = Dispatch::channel();
        perform(Client::new(), props, dispatch).await;
        let message = rx.recv().await.expect("one message");
        assert!(rx.try_recv().is_err(), "exactly one message");
        message
    }

    #[test]
    fn test_response_kind_parsing() {
        assert_eq!(assert_ok!("json".parse::<ResponseKind>()), ResponseKind::Json);
        assert_eq!(assert_ok!("text".parse::<ResponseKind>()), ResponseKind::Text);
        assert_eq!(assert_ok!("arrayBuffer".parse::<ResponseKind>()), ResponseKind::Bytes);
        assert_err!("formData".parse::<ResponseKind>());
    }

    #[test]
    fn test_response_kind_serde_aliases() {
        let kind: ResponseKind = serde_json::from_value(json!("blob")).expect("alias");
        assert_eq!(kind, ResponseKind::Bytes);
        assert_eq!(serde_json::to_value(ResponseKind::Text).expect("ser"), json!("text"));
    }

    #[test]
    fn test_options_defaults_and_builder() {
        let options = HttpOptions::new()
            .with_method("POST")
            .with_header("x-one", "1")
            .with_headers([("x-two", "2")])
            .with_json(json!({ "title": "milk" }));

        assert_eq!(HttpOptions::new().method, "GET");
        assert_eq!(options.headers.len(), 2);
        assert_eq!(options.method().expect("method"), Method::POST);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validate_rejects_bad_input() {
        assert!(HttpOptions::new().with_method("GE T").validate().is_err());
        assert!(HttpOptions::new().with_header("bad name", "v").validate().is_err());
        assert!(HttpOptions::new().with_header("x", "line\nbreak").validate().is_err());
    }

    #[test]
    fn test_options_from_json() {
        let options: HttpOptions = serde_json::from_value(json!({
            "method": "PUT",
            "body": { "type": "text", "data": "hi" }
        }))
        .expect("options");

        assert_eq!(options.method, "PUT");
        assert!(options.headers.is_empty());
        assert_eq!(options.body, Some(RequestBody::Text("hi".into())));
    }

    #[test]
    fn test_error_action_defaults_to_action() {
        let props: HttpProps<Msg> = HttpProps::new("http://example.test", Action::new(Msg::Loaded));
        assert!(matches!(props.error_action().apply(Ok(ResponseBody::Text(String::new()))), Msg::Loaded(_)));

        let props = props.error(Action::new(Msg::Failed));
        assert!(matches!(props.error_action().apply(Ok(ResponseBody::Text(String::new()))), Msg::Failed(_)));
    }

    #[test]
    fn test_response_body_into_json() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Todo {
            id: u32,
        }

        let body = ResponseBody::Text(r#"{"id": 3}"#.into());
        assert_eq!(body.into_json::<Todo>().expect("todo"), Todo { id: 3 });
        assert_eq!(
            ResponseBody::Json(json!([1])).as_json(),
            Some(&json!([1]))
        );
    }

    #[tokio::test]
    async fn test_success_dispatches_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/todos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .mount(&server)
            .await;

        let props = HttpProps::new(format!("{}/todos", server.uri()), Action::new(Msg::Loaded))
            .error(Action::new(Msg::Failed));

        match run(props).await {
            Msg::Loaded(Ok(ResponseBody::Json(value))) => assert_eq!(value, json!([{ "id": 1 }])),
            other => panic!("Expected loaded JSON, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_text_extraction_and_request_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("x-token", "abc"))
            .and(body_json(json!({ "n": 1 })))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let props = HttpProps::new(format!("{}/echo", server.uri()), Action::new(Msg::Loaded))
            .options(
                HttpOptions::new()
                    .with_method("POST")
                    .with_header("x-token", "abc")
                    .with_json(json!({ "n": 1 })),
            )
            .response(ResponseKind::Text);

        match run(props).await {
            Msg::Loaded(Ok(ResponseBody::Text(text))) => assert_eq!(text, "created"),
            other => panic!("Expected loaded text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_ok_status_goes_to_error_action() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let props = HttpProps::new(server.uri(), Action::new(Msg::Loaded))
            .error(Action::new(Msg::Failed));

        match run(props).await {
            Msg::Failed(Err(e)) => {
                let response = e.failed_response().expect("captured response");
                assert_eq!(response.status, StatusCode::NOT_FOUND);
                assert_eq!(response.body, "missing");
            }
            other => panic!("Expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extraction_failure_goes_to_error_action() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let props = HttpProps::new(server.uri(), Action::new(Msg::Loaded))
            .error(Action::new(Msg::Failed));

        match run(props).await {
            Msg::Failed(Err(Error::BodyExtraction { kind, .. })) => {
                assert_eq!(kind, ResponseKind::Json);
            }
            other => panic!("Expected extraction failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_failure_without_error_action_uses_action() {
        // Bind and drop a listener so the port is very likely closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let props = HttpProps::new(format!("http://127.0.0.1:{port}/"), Action::new(Msg::Loaded));

        match run(props).await {
            Msg::Loaded(Err(e)) => assert!(matches!(e, Error::Http(_))),
            other => panic!("Expected transport failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_method_goes_to_error_action() {
        let props = HttpProps::new("http://127.0.0.1:9/", Action::new(Msg::Loaded))
            .options(HttpOptions::new().with_method("NOT VALID"))
            .error(Action::new(Msg::Failed));

        match run(props).await {
            Msg::Failed(Err(Error::InvalidArgument { .. })) => {}
            other => panic!("Expected invalid argument, got {other:?}"),
        }
    }
}
