// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{Body, Headers, Method, Requester, Response, TransportError};

/// A dummy HTTP client implementation that always errors.
#[derive(Debug)]
pub struct DummyClient;

impl Requester for DummyClient {
    fn request(
        &self,
        _method: Method,
        _url: url::Url,
        _headers: Headers,
        _body: Body,
    ) -> Result<Response, TransportError> {
        Err(TransportError::NoBackend)
    }
}
