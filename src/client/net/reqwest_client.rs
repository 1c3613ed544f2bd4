// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use log::error;
use reqwest::blocking::{Body as ReqwestBody, Client as ReqwestBlockingClient};
use reqwest::header::CONTENT_TYPE;

use super::{Body, Headers, Method, Requester, Response, TransportError};

/// How long [`ReqwestClient::new()`] waits for a connection to be established.
///
/// Once connected, a request may run for as long as the transfer takes: an
/// upload streams its whole body within a single request, so an overall
/// deadline would cap the size of the files that can be sent.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP client that uses the blocking API of [reqwest](https://docs.rs/reqwest).
#[derive(Debug)]
pub struct ReqwestClient {
    inner: ReqwestBlockingClient,
}

impl ReqwestClient {
    /// Build a client with [`DEFAULT_CONNECT_TIMEOUT`] and no overall deadline.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(None)
    }

    /// Build a client where every request, from connecting until the
    /// response headers are in, must finish within `timeout`. This includes
    /// sending the body, so it also bounds the duration of uploads. `None`
    /// waits forever.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let inner = ReqwestBlockingClient::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Backend(e.to_string()))?;
        Ok(ReqwestClient { inner })
    }
}

impl Requester for ReqwestClient {
    fn request(
        &self,
        method: Method,
        url: url::Url,
        headers: Headers,
        body: Body,
    ) -> Result<Response, TransportError> {
        let method = match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::DELETE => reqwest::Method::DELETE,
        };

        let mut request = self.inner.request(method, url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match body {
            Body::Empty => request,
            Body::Form(form) => request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form),
            // Unknown length, so reqwest sends it with chunked transfer encoding.
            Body::Stream(reader) => request.body(ReqwestBody::new(reader)),
        };

        match request.send() {
            Err(e) => {
                error!(
                    "ReqwestClient - unable to submit request. {:?}",
                    e.to_string()
                );
                Err(TransportError::Backend(e.to_string()))
            }
            Ok(response) => {
                let mut headers: Headers = Headers::new();
                for (name, value) in response.headers() {
                    if let Ok(value) = value.to_str() {
                        headers
                            .entry(name.to_string())
                            .or_insert_with(|| value.to_string());
                    }
                }

                Ok(Response {
                    status: response.status().as_u16(),
                    headers,
                    body: Box::new(response),
                })
            }
        }
    }
}
