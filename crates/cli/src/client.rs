//! A thin `reqwest` wrapper for talking to the daemon's HTTP surface.

use std::time::Duration;

use reqwest::{IntoUrl, Method, RequestBuilder};
use url::Url;

const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(120);
static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A client bound to one daemon instance's base URL.
#[derive(Clone)]
pub struct NetMapApiClient {
    base_uri: Url,
}

impl NetMapApiClient {
    pub fn new(base_uri: impl IntoUrl) -> Self {
        NetMapApiClient {
            base_uri: base_uri.into_url().unwrap(),
        }
    }

    pub fn base_uri(&self) -> &str {
        self.base_uri.as_str()
    }

    pub fn request(&self, method: Method, s: &str) -> RequestBuilder {
        let path = self.base_uri.join(s).unwrap();

        let client = reqwest::ClientBuilder::new()
            .user_agent(APP_USER_AGENT)
            .timeout(HTTP_CLIENT_TIMEOUT)
            .build()
            .unwrap();

        tracing::debug!("sending HTTP {method} request to '{path}'");

        client.request(method, path)
    }

    pub fn get(&self, s: &str) -> RequestBuilder {
        self.request(Method::GET, s)
    }

    pub fn post(&self, s: &str) -> RequestBuilder {
        self.request(Method::POST, s)
    }

    pub fn delete(&self, s: &str) -> RequestBuilder {
        self.request(Method::DELETE, s)
    }
}

pub fn format_http_error(err: reqwest::Error) -> String {
    if err.is_decode() {
        // Keep the debug representation for decoding errors: the display
        // form loses which field of the response actually failed to parse.
        format!("HTTP request failed: {err:?}")
    } else {
        format!("HTTP request failed: {err}")
    }
}

/// Render a non-2xx response's status and body into an error string.
pub async fn format_status_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        format!("HTTP request failed: {status}")
    } else {
        format!("HTTP request failed: {status}: {body}")
    }
}
