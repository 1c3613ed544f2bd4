// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::Cursor;
use std::sync::Mutex;

use super::{Body, Headers, Method, Requester, Response, TransportError};

#[derive(Debug)]
pub(crate) struct TestResponse {
    pub request_method: Method,
    pub request_url: String,
    pub response_status: u16,
    pub response_body: Vec<u8>,
}

/// A dummy HTTP client to use in tests.
///
/// Requests are recorded, and matched against the canned responses by method
/// and full URL.
#[derive(Debug)]
pub(crate) struct TestHttpClient {
    test_responses: Vec<TestResponse>,
    requests: Mutex<Vec<(Method, String, Headers)>>,
}

impl TestHttpClient {
    pub fn new(test_responses: Vec<TestResponse>) -> TestHttpClient {
        Self {
            test_responses,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Method, URL and headers of every request seen so far.
    pub fn requests(&self) -> Vec<(Method, String, Headers)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Requester for TestHttpClient {
    fn request(
        &self,
        method: Method,
        url: url::Url,
        headers: Headers,
        _body: Body,
    ) -> Result<Response, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((method, url.to_string(), headers));

        for r in &self.test_responses {
            // Only respond to the specific URL if we're told to.
            if r.request_method == method && url.to_string().eq(&r.request_url) {
                return Ok(Response {
                    status: r.response_status,
                    headers: Headers::new(),
                    body: Box::new(Cursor::new(r.response_body.clone())),
                });
            }
        }

        Ok(Response {
            status: 404,
            headers: Headers::new(),
            body: Box::new(Cursor::new(Vec::new())),
        })
    }
}

impl Requester for std::sync::Arc<TestHttpClient> {
    fn request(
        &self,
        method: Method,
        url: url::Url,
        headers: Headers,
        body: Body,
    ) -> Result<Response, TransportError> {
        self.as_ref().request(method, url, headers, body)
    }
}
