//! HTTP client abstraction for making requests to the EFarmerConnect API

use std::collections::HashMap;
use std::sync::Arc;

use efarmer_auth::{Environment, HttpTokenRefresher, SessionManager};
use log::debug;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::interceptor::{self, RequestScope, SESSION_EXPIRED};

/// Shared HTTP client: cookie jar, default headers and the session it
/// authenticates with. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: Client,
    cookie_jar: Arc<Jar>,
    base_url: Url,
    options: ClientOptions,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Create a client whose session refreshes against `{api_url}/token/refresh/`
    pub fn new(options: ClientOptions, env: Environment) -> Result<Self> {
        let refresh_client = Client::builder()
            .timeout(options.request_timeout)
            .build()?;
        let refresher = Arc::new(HttpTokenRefresher::new(&options.api_url, refresh_client));
        let session = Arc::new(SessionManager::new(
            env,
            refresher,
            options.session_options(),
        ));
        Self::with_session(options, session)
    }

    /// Create a client around an existing session
    pub fn with_session(options: ClientOptions, session: Arc<SessionManager>) -> Result<Self> {
        let base_url = Url::parse(options.api_url.trim_end_matches('/'))?;
        let cookie_jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let http_client = Client::builder()
            .timeout(options.request_timeout)
            .cookie_provider(cookie_jar.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                cookie_jar,
                base_url,
                options,
                session,
            }),
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.inner.session
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Cookies received from (or seeded for) the API, including the CSRF cookie
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.inner.cookie_jar
    }

    /// Create a request with the given method
    pub fn request(&self, method: Method, path: &str) -> FetchBuilder<'_> {
        FetchBuilder::new(self, path, method)
    }

    /// Create a GET request
    pub fn get(&self, path: &str) -> FetchBuilder<'_> {
        self.request(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(&self, path: &str) -> FetchBuilder<'_> {
        self.request(Method::POST, path)
    }

    /// Create a PUT request
    pub fn put(&self, path: &str) -> FetchBuilder<'_> {
        self.request(Method::PUT, path)
    }

    /// Create a PATCH request
    pub fn patch(&self, path: &str) -> FetchBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    /// Create a DELETE request
    pub fn delete(&self, path: &str) -> FetchBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    /// Absolute URLs are used as-is; anything else is appended to the API base.
    fn resolve(&self, path: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path.trim_start_matches('/')))?)
    }

    /// Path of `url` below the API base, or `None` if it lies elsewhere.
    fn relative_path(&self, url: &Url) -> Option<String> {
        let base = &self.inner.base_url;
        if url.origin() != base.origin() {
            return None;
        }

        let base_path = base.path().trim_end_matches('/');
        let rest = url.path().strip_prefix(base_path)?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(if rest.is_empty() { "/".to_string() } else { rest.to_string() })
        } else {
            None
        }
    }

    fn scope(&self, method: &Method, url: &Url) -> RequestScope {
        match self.relative_path(url) {
            None => RequestScope::Foreign,
            Some(path) if interceptor::is_public_endpoint(method, &path) => RequestScope::Public,
            Some(_) => RequestScope::Authenticated,
        }
    }

    fn csrf_token(&self, url: &Url) -> Option<String> {
        let cookies = self.inner.cookie_jar.cookies(url)?;
        let cookies = cookies.to_str().ok()?;
        let prefix = format!("{}=", self.inner.options.csrf_cookie_name);
        cookies
            .split("; ")
            .find_map(|pair| pair.strip_prefix(prefix.as_str()))
            .map(str::to_string)
    }
}

/// A single part of a multipart upload
#[derive(Debug, Clone)]
enum FormPart {
    Text(String),
    File {
        bytes: Vec<u8>,
        file_name: String,
        mime: Option<String>,
    },
}

/// Multipart body kept as plain data so a retried request can rebuild it
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<(String, FormPart)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push((name.to_string(), FormPart::Text(value.into())));
        self
    }

    /// Add a file field
    pub fn file(mut self, name: &str, file_name: &str, bytes: Vec<u8>, mime: Option<&str>) -> Self {
        self.parts.push((
            name.to_string(),
            FormPart::File {
                bytes,
                file_name: file_name.to_string(),
                mime: mime.map(str::to_string),
            },
        ));
        self
    }

    fn to_form(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, part) in &self.parts {
            form = match part {
                FormPart::Text(value) => form.text(name.clone(), value.clone()),
                FormPart::File {
                    bytes,
                    file_name,
                    mime,
                } => {
                    let mut part = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone());
                    if let Some(mime) = mime {
                        part = part.mime_str(mime)?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
enum RequestBody {
    Empty,
    Json(Vec<u8>),
    Multipart(MultipartForm),
}

/// A received response whose body has already been read
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON; an empty body reads as `null`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Helper for building and executing HTTP requests
pub struct FetchBuilder<'a> {
    client: &'a ApiClient,
    path: String,
    method: Method,
    headers: HeaderMap,
    query_params: Option<HashMap<String, String>>,
    body: RequestBody,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a ApiClient, path: &str, method: Method) -> Self {
        Self {
            client,
            path: path.to_string(),
            method,
            headers: HeaderMap::new(),
            query_params: None,
            body: RequestBody::Empty,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add query parameters to the request
    pub fn query(mut self, params: HashMap<String, String>) -> Self {
        self.query_params = Some(params);
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Send a multipart body instead of JSON
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Build one attempt of the request
    fn build(&self, url: &Url, scope: RequestScope, bearer: Option<&str>) -> Result<RequestBuilder> {
        let mut req = self
            .client
            .inner
            .http_client
            .request(self.method.clone(), url.clone())
            .headers(self.headers.clone());

        if let Some(params) = &self.query_params {
            req = req.query(params);
        }

        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        if scope.is_own_api() {
            if let Some(csrf) = self.client.csrf_token(url) {
                req = req.header(self.client.options().csrf_header_name.as_str(), csrf);
            }
        }

        req = match &self.body {
            RequestBody::Empty => req,
            RequestBody::Json(bytes) => req
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(bytes.clone()),
            RequestBody::Multipart(form) => req.multipart(form.to_form()?),
        };

        Ok(req)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T> {
        self.send().await?.json()
    }

    /// Execute the request through the interceptors.
    ///
    /// A 401 from the API triggers one token refresh and one retry.
    pub async fn send(&self) -> Result<ApiResponse> {
        let session = self.client.session();
        let url = self.client.resolve(&self.path)?;
        let scope = self.client.scope(&self.method, &url);

        let mut retried = false;
        let mut refreshed: Option<String> = None;

        loop {
            let bearer = interceptor::prepare_request(session, scope, refreshed.take()).await?;
            let request = self.build(&url, scope, bearer.as_deref())?;

            debug!("{} {}", self.method, url);
            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => return Err(interceptor::on_network_failure(session, err)),
            };

            let status = response.status();
            let headers = response.headers().clone();
            let final_url = response.url().clone();
            let body = match response.bytes().await {
                Ok(body) => body.to_vec(),
                Err(err) => return Err(interceptor::on_network_failure(session, err)),
            };

            if status.is_success() {
                interceptor::on_success(session, scope, url.as_str(), status, &body)?;
                return Ok(ApiResponse {
                    status,
                    headers,
                    url: final_url,
                    body,
                });
            }

            let body = parse_error_body(&body);

            if status == StatusCode::UNAUTHORIZED && scope.is_own_api() {
                if retried || session.refresh_token().is_none() {
                    session.teardown(SESSION_EXPIRED);
                    return Err(Error::Api {
                        status: status.as_u16(),
                        body,
                    });
                }

                retried = true;
                debug!("401 from {}, refreshing token and retrying once", url);
                refreshed = Some(session.refresh_access_token().await?);
                continue;
            }

            return Err(interceptor::on_error_status(session, status, body));
        }
    }
}

fn parse_error_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
