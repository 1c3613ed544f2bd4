// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use derive_builder::Builder;
use serde::Deserialize;

use super::ids_http::{IdsError, Parameters};

/// Packaging requested for downloaded data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    None,
    Zip,
    Compress,
    ZipAndCompress,
}

impl Flag {
    pub(crate) fn add_parameters(&self, parameters: &mut Parameters) {
        if matches!(self, Flag::Zip | Flag::ZipAndCompress) {
            parameters.insert("zip".to_owned(), "true".to_owned());
        }
        if matches!(self, Flag::Compress | Flag::ZipAndCompress) {
            parameters.insert("compress".to_owned(), "true".to_owned());
        }
    }
}

/// Availability of a data selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Archived,
    Incomplete,
    Online,
    Restoring,
}

impl FromStr for Status {
    type Err = IdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARCHIVED" => Ok(Status::Archived),
            "INCOMPLETE" => Ok(Status::Incomplete),
            "ONLINE" => Ok(Status::Online),
            "RESTORING" => Ok(Status::Restoring),
            other => Err(IdsError::Internal(format!(
                "Web service call did not return a valid status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpItem {
    data: String,
    request: String,
}

/// Snapshot of the server queues, as returned by `getServiceStatus`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[serde(default)]
    ops_queue: Vec<OpItem>,
    #[serde(default)]
    lock_count: u64,
    #[serde(default)]
    locked_ids: BTreeSet<u64>,
    #[serde(default)]
    failures: BTreeSet<u64>,
}

impl ServiceStatus {
    /// Queued operations: description of the data → requested action.
    pub fn op_items(&self) -> BTreeMap<&str, &str> {
        self.ops_queue
            .iter()
            .map(|item| (item.data.as_str(), item.request.as_str()))
            .collect()
    }

    /// Number of locks currently held.
    pub fn lock_count(&self) -> u64 {
        self.lock_count
    }

    /// IDs of the locked datasets.
    pub fn locked_ids(&self) -> &BTreeSet<u64> {
        &self.locked_ids
    }

    /// IDs of the datafiles whose last operation failed.
    pub fn failures(&self) -> &BTreeSet<u64> {
        &self.failures
    }
}

/// Metadata for a datafile to be uploaded with `put`.
///
/// ```rust
/// # use ids_client::NewDatafile;
/// let datafile = NewDatafile::builder()
///     .name("run42.nxs")
///     .dataset_id(1u64)
///     .datafile_format_id(2u64)
///     .description("raw detector output")
///     .build()
///     .unwrap();
/// ```
#[derive(Builder, Clone, Debug)]
#[builder(setter(into))]
pub struct NewDatafile {
    name: String,
    dataset_id: u64,
    datafile_format_id: u64,
    #[builder(setter(into, strip_option), default)]
    description: Option<String>,
    #[builder(setter(into, strip_option), default)]
    doi: Option<String>,
    #[builder(setter(into, strip_option), default)]
    create_time: Option<SystemTime>,
    #[builder(setter(into, strip_option), default)]
    mod_time: Option<SystemTime>,
}

impl NewDatafile {
    pub fn builder() -> NewDatafileBuilder {
        NewDatafileBuilder::default()
    }

    pub(crate) fn add_parameters(&self, parameters: &mut Parameters) {
        parameters.insert("name".to_owned(), self.name.clone());
        parameters.insert("datasetId".to_owned(), self.dataset_id.to_string());
        parameters.insert(
            "datafileFormatId".to_owned(),
            self.datafile_format_id.to_string(),
        );
        if let Some(ref description) = self.description {
            parameters.insert("description".to_owned(), description.clone());
        }
        if let Some(ref doi) = self.doi {
            parameters.insert("doi".to_owned(), doi.clone());
        }
        if let Some(time) = self.create_time {
            parameters.insert("datafileCreateTime".to_owned(), epoch_millis(time).to_string());
        }
        if let Some(time) = self.mod_time {
            parameters.insert("datafileModTime".to_owned(), epoch_millis(time).to_string());
        }
    }
}

fn epoch_millis(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_millis() as i128,
        Err(before) => -(before.duration().as_millis() as i128),
    }
}

/// A download in progress.
///
/// Reads pull bytes straight off the connection; nothing is buffered ahead.
/// The stream can be read once. Dropping it closes the connection, so keep
/// it scoped to the code that consumes it.
pub struct DataStream {
    inner: Box<dyn Read + Send>,
}

impl DataStream {
    pub(crate) fn new(inner: Box<dyn Read + Send>) -> Self {
        DataStream { inner }
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl std::fmt::Debug for DataStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataStream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_flag_parameters() {
        let mut parameters = Parameters::new();
        Flag::None.add_parameters(&mut parameters);
        assert!(parameters.is_empty());

        Flag::Zip.add_parameters(&mut parameters);
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters["zip"], "true");

        let mut parameters = Parameters::new();
        Flag::ZipAndCompress.add_parameters(&mut parameters);
        assert_eq!(parameters["zip"], "true");
        assert_eq!(parameters["compress"], "true");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("ONLINE".parse::<Status>().unwrap(), Status::Online);
        assert_eq!("INCOMPLETE".parse::<Status>().unwrap(), Status::Incomplete);
        assert!(matches!(
            "online".parse::<Status>(),
            Err(IdsError::Internal(_))
        ));
    }

    #[test]
    fn test_service_status_parse() {
        let status: ServiceStatus = serde_json::from_str(
            r#"{
                "opsQueue": [{"data": "Dataset 7", "request": "ARCHIVE"}],
                "lockCount": 2,
                "lockedIds": [7, 9]
            }"#,
        )
        .unwrap();

        assert_eq!(status.op_items().get("Dataset 7"), Some(&"ARCHIVE"));
        assert_eq!(status.lock_count(), 2);
        assert_eq!(status.locked_ids().iter().copied().collect::<Vec<_>>(), vec![7, 9]);
        assert!(status.failures().is_empty());
    }

    #[test]
    fn test_new_datafile_requires_name() {
        let err = NewDatafile::builder()
            .dataset_id(1u64)
            .datafile_format_id(2u64)
            .build()
            .unwrap_err();

        assert_eq!(err.to_string(), "`name` must be initialized");
    }

    #[test]
    fn test_new_datafile_parameters() {
        let datafile = NewDatafile::builder()
            .name("fred")
            .dataset_id(1u64)
            .datafile_format_id(2u64)
            .doi("10.5286/x")
            .create_time(UNIX_EPOCH + Duration::from_millis(1_500))
            .build()
            .unwrap();

        let mut parameters = Parameters::new();
        datafile.add_parameters(&mut parameters);

        assert_eq!(parameters["name"], "fred");
        assert_eq!(parameters["datasetId"], "1");
        assert_eq!(parameters["datafileFormatId"], "2");
        assert_eq!(parameters["doi"], "10.5286/x");
        assert_eq!(parameters["datafileCreateTime"], "1500");
        assert!(!parameters.contains_key("description"));
        assert!(!parameters.contains_key("datafileModTime"));
    }
}
