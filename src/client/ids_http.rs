// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, error};
use serde::Deserialize;
use thiserror::Error;
use url::{form_urlencoded, Url};

use super::net::{Body, Headers, Method, Requester, Response, TransportError};

/// Longest URL the client will emit, query string included.
pub const MAX_URL_LENGTH: usize = 2048;

/// Request parameters, keyed by name.
pub type Parameters = BTreeMap<String, String>;

/// The kinds of failure an IDS server, or the client itself, can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    DataNotOnline,
    InsufficientPrivileges,
    InsufficientStorage,
    NotFound,
    NotImplemented,
    Internal,
}

impl ErrorKind {
    /// Map the `code` field of a server error envelope onto a kind.
    pub fn from_code(code: &str) -> Option<ErrorKind> {
        match code {
            "BadRequestException" => Some(ErrorKind::BadRequest),
            "DataNotOnlineException" => Some(ErrorKind::DataNotOnline),
            "InsufficientPrivilegesException" => Some(ErrorKind::InsufficientPrivileges),
            "InsufficientStorageException" => Some(ErrorKind::InsufficientStorage),
            "NotFoundException" => Some(ErrorKind::NotFound),
            "NotImplementedException" => Some(ErrorKind::NotImplemented),
            "InternalException" => Some(ErrorKind::Internal),
            _ => None,
        }
    }

    /// The server-side name of this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequestException",
            ErrorKind::DataNotOnline => "DataNotOnlineException",
            ErrorKind::InsufficientPrivileges => "InsufficientPrivilegesException",
            ErrorKind::InsufficientStorage => "InsufficientStorageException",
            ErrorKind::NotFound => "NotFoundException",
            ErrorKind::NotImplemented => "NotImplementedException",
            ErrorKind::Internal => "InternalException",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdsError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("data not online: {0}")]
    DataNotOnline(String),
    #[error("insufficient privileges: {0}")]
    InsufficientPrivileges(String),
    #[error("insufficient storage: {0}")]
    InsufficientStorage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IdsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> IdsError {
        let message = message.into();
        match kind {
            ErrorKind::BadRequest => IdsError::BadRequest(message),
            ErrorKind::DataNotOnline => IdsError::DataNotOnline(message),
            ErrorKind::InsufficientPrivileges => IdsError::InsufficientPrivileges(message),
            ErrorKind::InsufficientStorage => IdsError::InsufficientStorage(message),
            ErrorKind::NotFound => IdsError::NotFound(message),
            ErrorKind::NotImplemented => IdsError::NotImplemented(message),
            ErrorKind::Internal => IdsError::Internal(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IdsError::BadRequest(_) => ErrorKind::BadRequest,
            IdsError::DataNotOnline(_) => ErrorKind::DataNotOnline,
            IdsError::InsufficientPrivileges(_) => ErrorKind::InsufficientPrivileges,
            IdsError::InsufficientStorage(_) => ErrorKind::InsufficientStorage,
            IdsError::NotFound(_) => ErrorKind::NotFound,
            IdsError::NotImplemented(_) => ErrorKind::NotImplemented,
            IdsError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The message text, as reported by the server where there was one.
    pub fn message(&self) -> &str {
        match self {
            IdsError::BadRequest(m)
            | IdsError::DataNotOnline(m)
            | IdsError::InsufficientPrivileges(m)
            | IdsError::InsufficientStorage(m)
            | IdsError::NotFound(m)
            | IdsError::NotImplemented(m)
            | IdsError::Internal(m) => m,
        }
    }

    /// Fold any kind outside `allowed` into `Internal`.
    ///
    /// `Internal` itself always passes through.
    pub(crate) fn restrict(self, allowed: &[ErrorKind]) -> IdsError {
        let kind = self.kind();
        if kind == ErrorKind::Internal || allowed.contains(&kind) {
            self
        } else {
            IdsError::Internal(format!("Unexpected exception {} {}", kind, self.message()))
        }
    }
}

impl From<TransportError> for IdsError {
    fn from(err: TransportError) -> Self {
        IdsError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for IdsError {
    fn from(err: std::io::Error) -> Self {
        IdsError::Internal(format!("IOException {}", err))
    }
}

impl From<serde_json::Error> for IdsError {
    fn from(err: serde_json::Error) -> Self {
        IdsError::Internal(format!("unexpected JSON in response: {}", err))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    code: String,
    message: String,
}

/// Where request parameters are placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ParamPos {
    Query,
    Body,
}

/// Encode parameters as `application/x-www-form-urlencoded`.
pub(crate) fn encode_parameters(parameters: &Parameters) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(parameters.iter())
        .finish()
}

/// Build the URL of `operation` with `parameters` in its query string,
/// refusing anything longer than [`MAX_URL_LENGTH`].
pub(crate) fn query_url(
    root: &Url,
    operation: &str,
    parameters: &Parameters,
) -> Result<Url, IdsError> {
    let mut url = root
        .join(operation)
        .map_err(|e| IdsError::Internal(format!("cannot build URL for {}: {}", operation, e)))?;
    if !parameters.is_empty() {
        url.set_query(Some(&encode_parameters(parameters)));
    }
    if url.as_str().len() > MAX_URL_LENGTH {
        return Err(IdsError::BadRequest(format!(
            "Generated URI is of length {} which exceeds {}",
            url.as_str().len(),
            MAX_URL_LENGTH
        )));
    }
    Ok(url)
}

/// Send a single request to the IDS and map a non-2xx answer onto an
/// [`IdsError`]. On success the response body is left unread.
#[allow(clippy::too_many_arguments)]
pub(crate) fn process(
    requester: &dyn Requester,
    root: &Url,
    operation: &str,
    parameters: &Parameters,
    method: Method,
    position: ParamPos,
    headers: Headers,
    stream: Option<Body>,
) -> Result<Response, IdsError> {
    let (url, body) = match position {
        ParamPos::Query => (
            query_url(root, operation, parameters)?,
            stream.unwrap_or(Body::Empty),
        ),
        ParamPos::Body => {
            let url = root.join(operation).map_err(|e| {
                IdsError::Internal(format!("cannot build URL for {}: {}", operation, e))
            })?;
            let body = if parameters.is_empty() {
                Body::Empty
            } else {
                Body::Form(encode_parameters(parameters))
            };
            (url, body)
        }
    };

    debug!("{} {}", method.as_str(), url);
    let response = requester.request(method, url, headers, body).map_err(|e| {
        error!("{} {} failed: {}", method.as_str(), operation, e);
        IdsError::from(e)
    })?;
    debug!("{} answered with status {}", operation, response.status);

    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let text = response.text()?;
    Err(error_from_body(status, &text))
}

/// Turn the body of a failed response into the error it describes.
pub(crate) fn error_from_body(status: u16, text: &str) -> IdsError {
    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(envelope) => match ErrorKind::from_code(&envelope.code) {
            Some(kind) => IdsError::new(kind, envelope.message),
            None => IdsError::Internal(format!("Unknown error code in response: {}", text)),
        },
        Err(_) => IdsError::Internal(format!(
            "Unexpected response status {} with body: {}",
            status, text
        )),
    }
}

/// Read a successful response as trimmed text.
pub(crate) fn read_text(response: Response) -> Result<String, IdsError> {
    Ok(response.text()?.trim().to_string())
}

/// Expect an empty body from a successful response.
pub(crate) fn expect_empty(response: Response) -> Result<(), IdsError> {
    let text = read_text(response)?;
    if text.is_empty() {
        Ok(())
    } else {
        Err(IdsError::Internal(format!(
            "No http entity expected in response: {}",
            text
        )))
    }
}

pub(crate) fn parse_bool(text: &str) -> Result<bool, IdsError> {
    match text.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(IdsError::Internal(format!(
            "Web service call did not return a valid boolean value: {}",
            text
        ))),
    }
}

pub(crate) fn parse_u64(text: &str) -> Result<u64, IdsError> {
    text.parse().map_err(|_| {
        IdsError::Internal(format!(
            "Web service call did not return a valid Long value: {}",
            text
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::net::{TestHttpClient, TestResponse};

    fn root() -> Url {
        Url::parse("http://ids.example.com/ids/").unwrap()
    }

    fn failing(status: u16, body: &str) -> TestHttpClient {
        TestHttpClient::new(vec![TestResponse {
            request_method: Method::GET,
            request_url: "http://ids.example.com/ids/getStatus?sessionId=abc".to_owned(),
            response_status: status,
            response_body: body.as_bytes().to_vec(),
        }])
    }

    fn get_status(requester: &TestHttpClient) -> Result<Response, IdsError> {
        let mut parameters = Parameters::new();
        parameters.insert("sessionId".into(), "abc".into());
        process(
            requester,
            &root(),
            "getStatus",
            &parameters,
            Method::GET,
            ParamPos::Query,
            Headers::new(),
            None,
        )
    }

    #[test]
    fn test_error_codes_map_to_kinds() {
        for kind in [
            ErrorKind::BadRequest,
            ErrorKind::DataNotOnline,
            ErrorKind::InsufficientPrivileges,
            ErrorKind::InsufficientStorage,
            ErrorKind::NotFound,
            ErrorKind::NotImplemented,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("NotFound"), None);
    }

    #[test]
    fn test_not_found_envelope() {
        let client = failing(404, r#"{"code": "NotFoundException", "message": "x"}"#);

        let err = get_status(&client).unwrap_err();
        assert_eq!(err, IdsError::NotFound("x".to_owned()));
        assert_eq!(err.message(), "x");
    }

    #[test]
    fn test_unparseable_error_body() {
        let client = failing(503, "Service Unavailable");

        let err = get_status(&client).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().contains("503"), "{}", err);
        assert!(err.message().contains("Service Unavailable"), "{}", err);
    }

    #[test]
    fn test_unknown_error_code_is_internal() {
        let client = failing(400, r#"{"code": "TeapotException", "message": "short and stout"}"#);

        let err = get_status(&client).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().contains("TeapotException"), "{}", err);
    }

    #[test]
    fn test_restrict_folds_unexpected_kinds() {
        let err = IdsError::InsufficientStorage("full".to_owned())
            .restrict(&[ErrorKind::BadRequest, ErrorKind::NotFound]);
        assert_eq!(
            err,
            IdsError::Internal("Unexpected exception InsufficientStorageException full".to_owned())
        );

        let err = IdsError::NotFound("gone".to_owned()).restrict(&[ErrorKind::NotFound]);
        assert_eq!(err, IdsError::NotFound("gone".to_owned()));

        let err = IdsError::Internal("boom".to_owned()).restrict(&[]);
        assert_eq!(err, IdsError::Internal("boom".to_owned()));
    }

    #[test]
    fn test_transport_failure_is_internal() {
        let err = process(
            &crate::client::net::DummyClient,
            &root(),
            "ping",
            &Parameters::new(),
            Method::GET,
            ParamPos::Query,
            Headers::new(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_long_url_rejected_before_network() {
        let client = TestHttpClient::new(vec![]);
        let ids: Vec<String> = (0..5000u64).map(|i| i.to_string()).collect();
        let mut parameters = Parameters::new();
        parameters.insert("datafileIds".into(), ids.join(","));

        let err = process(
            &client,
            &root(),
            "getData",
            &parameters,
            Method::GET,
            ParamPos::Query,
            Headers::new(),
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_body_parameters_keep_url_short() {
        let client = TestHttpClient::new(vec![TestResponse {
            request_method: Method::POST,
            request_url: "http://ids.example.com/ids/archive".to_owned(),
            response_status: 204,
            response_body: vec![],
        }]);
        let ids: Vec<String> = (0..5000u64).map(|i| i.to_string()).collect();
        let mut parameters = Parameters::new();
        parameters.insert("datafileIds".into(), ids.join(","));

        let response = process(
            &client,
            &root(),
            "archive",
            &parameters,
            Method::POST,
            ParamPos::Body,
            Headers::new(),
            None,
        )
        .unwrap();
        assert_eq!(response.status, 204);
    }

    #[test]
    fn test_encode_parameters() {
        let mut parameters = Parameters::new();
        parameters.insert("outname".into(), "my favourite name".into());
        parameters.insert("datasetIds".into(), "1,2".into());

        assert_eq!(
            encode_parameters(&parameters),
            "datasetIds=1%2C2&outname=my+favourite+name"
        );
    }

    #[test]
    fn test_parse_helpers() {
        assert!(parse_bool("true").unwrap());
        assert!(!parse_bool("FALSE").unwrap());
        assert_eq!(parse_bool("maybe").unwrap_err().kind(), ErrorKind::Internal);
        assert_eq!(parse_u64("12345").unwrap(), 12345);
        assert_eq!(parse_u64("-1").unwrap_err().kind(), ErrorKind::Internal);
    }
}
