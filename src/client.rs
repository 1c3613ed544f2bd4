/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

mod checksum;
mod data_selection;
mod ids_http;
pub mod net;
mod types;

use std::io::Read;
use std::path::PathBuf;

use derive_builder::{Builder, UninitializedFieldError};
use log::debug;
use serde::Deserialize;
use url::Url;

use checksum::ChecksumReader;
use ids_http::{expect_empty, parse_bool, parse_u64, process, query_url, read_text, ParamPos};
use net::{Body, Headers, Method, Response};

pub use data_selection::DataSelection;
pub use ids_http::{ErrorKind, IdsError, Parameters, MAX_URL_LENGTH};
pub use types::{
    DataStream, Flag, NewDatafile, NewDatafileBuilder, NewDatafileBuilderError, ServiceStatus,
    Status,
};

use ids_http::ErrorKind::{
    BadRequest, DataNotOnline, InsufficientPrivileges, InsufficientStorage, NotFound,
    NotImplemented,
};

/// Error kinds of calls that take a session and a data selection.
const SELECTION_ERRORS: &[ErrorKind] =
    &[BadRequest, InsufficientPrivileges, NotFound, NotImplemented];
/// Error kinds of calls that read data, which may sit on secondary storage.
const READ_ERRORS: &[ErrorKind] = &[
    BadRequest,
    InsufficientPrivileges,
    NotFound,
    NotImplemented,
    DataNotOnline,
];
/// Error kinds of calls keyed by a prepared id.
const PREPARED_ERRORS: &[ErrorKind] = &[BadRequest, NotFound, NotImplemented];
/// Error kinds of calls describing the server itself.
const SERVER_ERRORS: &[ErrorKind] = &[NotImplemented];
const ALL_ERRORS: &[ErrorKind] = &[
    BadRequest,
    DataNotOnline,
    InsufficientPrivileges,
    InsufficientStorage,
    NotFound,
    NotImplemented,
];

#[derive(Debug, Deserialize)]
struct PutResponse {
    id: u64,
    checksum: u64,
}

#[derive(Debug, Deserialize)]
struct DatafileIdsResponse {
    ids: Vec<u64>,
}

/// Client for an ICAT Data Service.
///
/// # Examples
/// Create a `Client` for an IDS reachable at `https://ids.example.com:8181`:
/// ```rust
/// # use ids_client::Client;
/// # fn main() {
/// let client = Client::builder()
///   .server_url("https://ids.example.com:8181")
///   .build()
///   .unwrap();
/// # }
/// ```
///
/// The client talks to `<server_url>/ids/`. A URL that cannot be parsed is
/// refused by `build()`:
/// ```rust
/// # use ids_client::Client;
/// let err = Client::builder().server_url("not a url").build().unwrap_err();
/// ```
///
/// ## Transport
///
/// With the default `reqwest_client` feature, requests go through
/// [`net::ReqwestClient`], which gives up connecting after
/// [`net::DEFAULT_CONNECT_TIMEOUT`] and otherwise waits for as long as the
/// transfer takes. Pass another one to bound whole requests:
/// ```rust
/// # #[cfg(feature = "reqwest_client")] {
/// # use ids_client::Client;
/// use ids_client::net::ReqwestClient;
/// use std::time::Duration;
///
/// let client = Client::builder()
///   .server_url("https://ids.example.com:8181")
///   .http_client(Box::new(
///     ReqwestClient::with_timeout(Some(Duration::from_secs(600))).unwrap(),
///   ))
///   .build()
///   .unwrap();
/// # }
/// ```
/// See [`net::Requester`] for plugging in a different HTTP library.
///
/// ## Downloads
///
/// ```no_run
/// # use ids_client::{Client, DataSelection, Flag};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///   .server_url("https://ids.example.com:8181")
///   .build()?;
///
/// let mut selection = DataSelection::new();
/// selection.add_dataset(1).add_dataset(2);
///
/// let mut stream = client.get_data("session-id", &selection, Flag::Zip, None, 0)?;
/// let mut out = std::fs::File::create("data.zip")?;
/// std::io::copy(&mut stream, &mut out)?;
/// // The connection is released when `stream` goes out of scope.
/// # Ok(())
/// # }
/// ```
///
/// Calls block until the server answers. Each call is independent: nothing
/// is retried and nothing is cached.
#[derive(Builder, Debug)]
#[builder(pattern = "owned")]
pub struct Client {
    // Set from the raw server URL, normalized once here.
    #[builder(
        setter(name = "server_url", into, strip_option),
        field(ty = "Option<String>", build = "self.ids_root()?")
    )]
    ids_url: Url,
    #[builder(default = "net::default_requester()")]
    http_client: Box<dyn net::Requester + 'static>,
}

impl ClientBuilder {
    fn ids_root(&self) -> Result<Url, ClientBuilderError> {
        let server_url = self
            .ids_url
            .as_deref()
            .ok_or_else(|| UninitializedFieldError::from("server_url"))?;
        Ok(ids_root(server_url)?)
    }
}

/// Root of the IDS API under `server_url`: the path gets a trailing slash
/// and `ids/` appended.
fn ids_root(server_url: &str) -> Result<Url, String> {
    let mut url =
        Url::parse(server_url).map_err(|e| format!("invalid IDS URL {:?}: {}", server_url, e))?;
    if url.cannot_be_a_base() {
        return Err(format!("invalid IDS URL {:?}: not a base URL", server_url));
    }
    let mut path = url.path().to_owned();
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str("ids/");
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn session_parameters(session_id: &str) -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("sessionId".to_owned(), session_id.to_owned());
    parameters
}

fn selection_parameters(session_id: &str, selection: &DataSelection) -> Parameters {
    let mut parameters = session_parameters(session_id);
    parameters.extend(selection.parameters());
    parameters
}

fn prepared_parameters(prepared_id: &str) -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("preparedId".to_owned(), prepared_id.to_owned());
    parameters
}

fn range_headers(offset: u64) -> Headers {
    let mut headers = Headers::new();
    if offset != 0 {
        headers.insert("Range".to_owned(), format!("bytes={}-", offset));
    }
    headers
}

impl Client {
    /// Creates a `ClientBuilder` to configure a `Client`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The URL every operation is resolved against.
    pub fn ids_url(&self) -> &Url {
        &self.ids_url
    }

    #[allow(clippy::too_many_arguments)]
    fn call(
        &self,
        operation: &str,
        parameters: &Parameters,
        method: Method,
        position: ParamPos,
        headers: Headers,
        body: Option<Body>,
        allowed: &[ErrorKind],
    ) -> Result<Response, IdsError> {
        process(
            self.http_client.as_ref(),
            &self.ids_url,
            operation,
            parameters,
            method,
            position,
            headers,
            body,
        )
        .map_err(|err| err.restrict(allowed))
    }

    fn get(
        &self,
        operation: &str,
        parameters: &Parameters,
        allowed: &[ErrorKind],
    ) -> Result<String, IdsError> {
        let response = self.call(
            operation,
            parameters,
            Method::GET,
            ParamPos::Query,
            Headers::new(),
            None,
            allowed,
        )?;
        read_text(response)
    }

    fn post(
        &self,
        operation: &str,
        parameters: &Parameters,
        allowed: &[ErrorKind],
    ) -> Result<Response, IdsError> {
        self.call(
            operation,
            parameters,
            Method::POST,
            ParamPos::Body,
            Headers::new(),
            None,
            allowed,
        )
    }

    /// Check that the server is alive and is an IDS server.
    ///
    /// # Errors
    /// `NotFound` if the server answers with anything but `IdsOK`; every
    /// other failure is `Internal`.
    pub fn ping(&self) -> Result<(), IdsError> {
        let result = self.get("ping", &Parameters::new(), &[])?;
        if result != "IdsOK" {
            return Err(IdsError::NotFound(format!(
                "Server gave invalid response: {}",
                result
            )));
        }
        Ok(())
    }

    /// Version of the IDS API served.
    pub fn get_api_version(&self) -> Result<String, IdsError> {
        self.get("getApiVersion", &Parameters::new(), SERVER_ERRORS)
    }

    /// Whether the server refuses writes.
    pub fn is_read_only(&self) -> Result<bool, IdsError> {
        parse_bool(&self.get("isReadOnly", &Parameters::new(), SERVER_ERRORS)?)
    }

    /// Whether the server has secondary (archive) storage.
    pub fn is_two_level(&self) -> Result<bool, IdsError> {
        parse_bool(&self.get("isTwoLevel", &Parameters::new(), SERVER_ERRORS)?)
    }

    /// Snapshot of the server queues and locks. Needs a privileged session.
    pub fn get_service_status(&self, session_id: &str) -> Result<ServiceStatus, IdsError> {
        let text = self.get(
            "getServiceStatus",
            &session_parameters(session_id),
            &[InsufficientPrivileges, NotImplemented],
        )?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Move the selected data to secondary storage.
    pub fn archive(&self, session_id: &str, selection: &DataSelection) -> Result<(), IdsError> {
        debug!("Archive {:?}", selection.parameters());
        let response = self.post(
            "archive",
            &selection_parameters(session_id, selection),
            SELECTION_ERRORS,
        )?;
        expect_empty(response)
    }

    /// Bring the selected data back online.
    pub fn restore(&self, session_id: &str, selection: &DataSelection) -> Result<(), IdsError> {
        debug!("Restore {:?}", selection.parameters());
        let response = self.post(
            "restore",
            &selection_parameters(session_id, selection),
            SELECTION_ERRORS,
        )?;
        expect_empty(response)
    }

    /// Delete the selected data, from the catalog and from storage.
    pub fn delete(&self, session_id: &str, selection: &DataSelection) -> Result<(), IdsError> {
        debug!("Delete {:?}", selection.parameters());
        let response = self.call(
            "delete",
            &selection_parameters(session_id, selection),
            Method::DELETE,
            ParamPos::Query,
            Headers::new(),
            None,
            READ_ERRORS,
        )?;
        expect_empty(response)
    }

    /// Availability of the selected data.
    pub fn get_status(
        &self,
        session_id: &str,
        selection: &DataSelection,
    ) -> Result<Status, IdsError> {
        self.get(
            "getStatus",
            &selection_parameters(session_id, selection),
            SELECTION_ERRORS,
        )?
        .parse()
    }

    /// Availability of the data behind a prepared id.
    pub fn get_status_prepared(&self, prepared_id: &str) -> Result<Status, IdsError> {
        self.get(
            "getStatus",
            &prepared_parameters(prepared_id),
            SELECTION_ERRORS,
        )?
        .parse()
    }

    /// Ask the server to stage the selected data. Returns the prepared id to
    /// use with [`Client::is_prepared`] and [`Client::get_data_prepared`].
    pub fn prepare_data(
        &self,
        session_id: &str,
        selection: &DataSelection,
        flag: Flag,
    ) -> Result<String, IdsError> {
        let mut parameters = selection_parameters(session_id, selection);
        flag.add_parameters(&mut parameters);
        let response = self.post("prepareData", &parameters, SELECTION_ERRORS)?;
        read_text(response)
    }

    /// Whether the data behind a prepared id can be downloaded yet.
    pub fn is_prepared(&self, prepared_id: &str) -> Result<bool, IdsError> {
        parse_bool(&self.get(
            "isPrepared",
            &prepared_parameters(prepared_id),
            PREPARED_ERRORS,
        )?)
    }

    /// Total size in bytes of the selected data.
    pub fn get_size(&self, session_id: &str, selection: &DataSelection) -> Result<u64, IdsError> {
        parse_u64(&self.get(
            "getSize",
            &selection_parameters(session_id, selection),
            SELECTION_ERRORS,
        )?)
    }

    /// Total size in bytes of the data behind a prepared id.
    pub fn get_size_prepared(&self, prepared_id: &str) -> Result<u64, IdsError> {
        parse_u64(&self.get(
            "getSize",
            &prepared_parameters(prepared_id),
            PREPARED_ERRORS,
        )?)
    }

    /// IDs of every datafile in the selection.
    pub fn get_datafile_ids(
        &self,
        session_id: &str,
        selection: &DataSelection,
    ) -> Result<Vec<u64>, IdsError> {
        let text = self.get(
            "getDatafileIds",
            &selection_parameters(session_id, selection),
            SELECTION_ERRORS,
        )?;
        let response: DatafileIdsResponse = serde_json::from_str(&text)?;
        Ok(response.ids)
    }

    /// IDs of every datafile behind a prepared id.
    pub fn get_datafile_ids_prepared(&self, prepared_id: &str) -> Result<Vec<u64>, IdsError> {
        let text = self.get(
            "getDatafileIds",
            &prepared_parameters(prepared_id),
            PREPARED_ERRORS,
        )?;
        let response: DatafileIdsResponse = serde_json::from_str(&text)?;
        Ok(response.ids)
    }

    /// Path on the server file system of a link to a datafile.
    pub fn get_link(&self, session_id: &str, datafile_id: u64) -> Result<PathBuf, IdsError> {
        let mut parameters = session_parameters(session_id);
        parameters.insert("datafileId".to_owned(), datafile_id.to_string());
        let response = self.post(
            "getLink",
            &parameters,
            &[
                BadRequest,
                InsufficientPrivileges,
                NotFound,
                DataNotOnline,
                NotImplemented,
            ],
        )?;
        Ok(PathBuf::from(read_text(response)?))
    }

    /// Download the selected data, starting `offset` bytes in.
    ///
    /// The returned stream holds the connection open until it is dropped.
    pub fn get_data(
        &self,
        session_id: &str,
        selection: &DataSelection,
        flag: Flag,
        outname: Option<&str>,
        offset: u64,
    ) -> Result<DataStream, IdsError> {
        let mut parameters = selection_parameters(session_id, selection);
        flag.add_parameters(&mut parameters);
        if let Some(outname) = outname {
            parameters.insert("outname".to_owned(), outname.to_owned());
        }
        self.download(&parameters, offset)
    }

    /// Download the data behind a prepared id, starting `offset` bytes in.
    pub fn get_data_prepared(
        &self,
        prepared_id: &str,
        outname: Option<&str>,
        offset: u64,
    ) -> Result<DataStream, IdsError> {
        let mut parameters = prepared_parameters(prepared_id);
        if let Some(outname) = outname {
            parameters.insert("outname".to_owned(), outname.to_owned());
        }
        self.download(&parameters, offset)
    }

    fn download(&self, parameters: &Parameters, offset: u64) -> Result<DataStream, IdsError> {
        let response = self.call(
            "getData",
            parameters,
            Method::GET,
            ParamPos::Query,
            range_headers(offset),
            None,
            READ_ERRORS,
        )?;
        Ok(DataStream::new(response.body))
    }

    /// URL that downloads the selected data when fetched, for use in links.
    ///
    /// The session id is embedded in the URL.
    pub fn get_data_url(
        &self,
        session_id: &str,
        selection: &DataSelection,
        flag: Flag,
        outname: Option<&str>,
    ) -> Result<Url, IdsError> {
        let mut parameters = selection_parameters(session_id, selection);
        flag.add_parameters(&mut parameters);
        if let Some(outname) = outname {
            parameters.insert("outname".to_owned(), outname.to_owned());
        }
        query_url(&self.ids_url, "getData", &parameters)
    }

    /// URL that downloads the data behind a prepared id when fetched.
    pub fn get_data_url_prepared(
        &self,
        prepared_id: &str,
        outname: Option<&str>,
    ) -> Result<Url, IdsError> {
        let mut parameters = prepared_parameters(prepared_id);
        if let Some(outname) = outname {
            parameters.insert("outname".to_owned(), outname.to_owned());
        }
        query_url(&self.ids_url, "getData", &parameters)
    }

    /// Upload a new datafile and return its ID.
    ///
    /// `input` is streamed to the server without being buffered, while a
    /// CRC-32 of it is computed. The server reports the checksum of what it
    /// stored, and the two must agree.
    ///
    /// # Errors
    /// `BadRequest` without any request made if `input` is `None`;
    /// `Internal` on checksum mismatch.
    pub fn put(
        &self,
        session_id: &str,
        input: Option<Box<dyn Read + Send>>,
        datafile: &NewDatafile,
    ) -> Result<u64, IdsError> {
        let input = input.ok_or_else(|| IdsError::BadRequest("Input stream is null".to_owned()))?;

        let mut parameters = session_parameters(session_id);
        datafile.add_parameters(&mut parameters);

        let (reader, checksum) = ChecksumReader::new(input);
        let response = self.call(
            "put",
            &parameters,
            Method::PUT,
            ParamPos::Query,
            Headers::new(),
            Some(Body::Stream(Box::new(reader))),
            ALL_ERRORS,
        )?;
        let confirmation: PutResponse = serde_json::from_str(&read_text(response)?)?;

        let local = checksum
            .value()
            .ok_or_else(|| IdsError::Internal("checksum could not be computed".to_owned()))?;
        debug!(
            "Uploaded datafile {}: local CRC-32 {}, server {}",
            confirmation.id, local, confirmation.checksum
        );
        if u64::from(local) != confirmation.checksum {
            return Err(IdsError::Internal(
                "Error uploading - the checksum was not as expected".to_owned(),
            ));
        }
        Ok(confirmation.id)
    }
}
