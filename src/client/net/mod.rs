// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::io::Read;

#[cfg(feature = "reqwest_client")]
use log::error;
use thiserror::Error;

mod dummy_client;
#[cfg(feature = "reqwest_client")]
mod reqwest_client;
#[cfg(test)]
mod test_client;

pub use dummy_client::DummyClient;
#[cfg(feature = "reqwest_client")]
pub use reqwest_client::{ReqwestClient, DEFAULT_CONNECT_TIMEOUT};
#[cfg(test)]
pub(crate) use test_client::{TestHttpClient, TestResponse};

// Re-exported so that consumers don't need depend on Url.
pub use url::Url;

/// A convenience type to represent raw HTTP headers.
pub type Headers = HashMap<String, String>;

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
        }
    }
}

/// The body of an outgoing request.
pub enum Body {
    Empty,
    /// An `application/x-www-form-urlencoded` payload.
    Form(String),
    /// A payload of unknown length, to be sent chunked as it is read.
    Stream(Box<dyn Read + Send>),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Form(form) => f.debug_tuple("Form").field(form).finish(),
            Body::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// A response coming from an HTTP endpoint.
///
/// The body is left unread so that large downloads can be streamed to the
/// caller. Dropping the response releases the underlying connection.
pub struct Response {
    /// The HTTP status code of the response.
    pub status: u16,

    // The headers of the response.
    pub headers: Headers,

    // The body of the response.
    pub body: Box<dyn Read + Send>,
}

impl Response {
    /// Whether or not the response code represents HTTP success.
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Consume the response and read the whole body as text.
    pub fn text(mut self) -> std::io::Result<String> {
        let mut text = String::new();
        self.body.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP backend issue: {0}")]
    Backend(String),
    #[error("no HTTP backend configured")]
    NoBackend,
}

/// A description of a component used to perform an HTTP request.
///
/// Implementations perform exactly one round-trip per call and must not
/// retry. Non-2xx statuses are returned as a [`Response`], never as an error.
pub trait Requester: std::fmt::Debug + Send + Sync {
    /// Perform a request toward the needed resource.
    ///
    /// # Arguments
    ///
    /// * `method` - the HTTP method.
    /// * `url` - the full URL, query string included.
    /// * `headers` - the headers to send.
    /// * `body` - the body content to send.
    fn request(
        &self,
        method: Method,
        url: Url,
        headers: Headers,
        body: Body,
    ) -> Result<Response, TransportError>;
}

/// The transport used when none is configured.
pub(crate) fn default_requester() -> Box<dyn Requester + 'static> {
    #[cfg(feature = "reqwest_client")]
    {
        match ReqwestClient::new() {
            Ok(client) => Box::new(client),
            Err(e) => {
                error!("Unable to set up the HTTP client, requests will fail: {}", e);
                Box::new(DummyClient)
            }
        }
    }
    #[cfg(not(feature = "reqwest_client"))]
    {
        Box::new(DummyClient)
    }
}
