//! Blocking HTTP transport
//!
//! Sends requests to an S3X endpoint with `reqwest::blocking`.

use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::path::{normalize_endpoint, S3xUrl};

use super::{HttpRequest, HttpResponse, Method, Transport};

/// Transport to a remote S3X endpoint
pub struct ReqwestTransport {
    client: Client,
    endpoint: Url,
    auth_key: String,
    secret: String,
}

impl ReqwestTransport {
    /// Build from client configuration; the endpoint is normalized first
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = normalize_endpoint(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        tracing::debug!("HTTP transport for {}", endpoint);
        Ok(Self {
            client,
            endpoint,
            auth_key: config.auth_key.clone(),
            secret: config.secret.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL for `request`
    pub fn url_for(&self, request: &HttpRequest) -> S3xUrl {
        let mut url = S3xUrl::new(&self.endpoint, &request.path);
        if !request.query.is_empty() {
            url.add_options(
                request
                    .query
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            );
        }
        url
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = self.url_for(request);
        tracing::trace!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(method(request.method), url.into_url())
            .body(request.body.to_vec());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !self.auth_key.is_empty() {
            builder = builder.basic_auth(&self.auth_key, Some(&self.secret));
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes()?;

        tracing::trace!("{} {} -> {}", request.method, request.path, status);
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
