// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use super::ids_http::Parameters;

/// Ordered set of IDs; keeps the order of first insertion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct IdSet {
    seen: HashSet<u64>,
    ordered: Vec<u64>,
}

impl IdSet {
    fn insert(&mut self, id: u64) {
        if self.seen.insert(id) {
            self.ordered.push(id);
        }
    }

    fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn joined(&self) -> String {
        self.ordered
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// The datafiles, datasets and investigations an operation applies to.
///
/// # Examples
/// ```rust
/// # use ids_client::DataSelection;
/// let mut selection = DataSelection::new();
/// selection.add_dataset(1).add_dataset(2).add_datafile(42);
///
/// let parameters = selection.parameters();
/// assert_eq!(parameters["datasetIds"], "1,2");
/// assert_eq!(parameters["datafileIds"], "42");
/// ```
///
/// An empty selection is not rejected here: the server answers it with a
/// bad request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataSelection {
    datafile_ids: IdSet,
    dataset_ids: IdSet,
    investigation_ids: IdSet,
}

impl DataSelection {
    pub fn new() -> Self {
        DataSelection::default()
    }

    pub fn add_datafile(&mut self, id: u64) -> &mut Self {
        self.datafile_ids.insert(id);
        self
    }

    pub fn add_datafiles<I: IntoIterator<Item = u64>>(&mut self, ids: I) -> &mut Self {
        ids.into_iter().for_each(|id| self.datafile_ids.insert(id));
        self
    }

    pub fn add_dataset(&mut self, id: u64) -> &mut Self {
        self.dataset_ids.insert(id);
        self
    }

    pub fn add_datasets<I: IntoIterator<Item = u64>>(&mut self, ids: I) -> &mut Self {
        ids.into_iter().for_each(|id| self.dataset_ids.insert(id));
        self
    }

    pub fn add_investigation(&mut self, id: u64) -> &mut Self {
        self.investigation_ids.insert(id);
        self
    }

    pub fn add_investigations<I: IntoIterator<Item = u64>>(&mut self, ids: I) -> &mut Self {
        ids.into_iter()
            .for_each(|id| self.investigation_ids.insert(id));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.datafile_ids.is_empty()
            && self.dataset_ids.is_empty()
            && self.investigation_ids.is_empty()
    }

    /// Query parameters describing this selection. Empty sets are left out.
    pub fn parameters(&self) -> Parameters {
        let mut parameters = Parameters::new();
        for (key, ids) in [
            ("investigationIds", &self.investigation_ids),
            ("datasetIds", &self.dataset_ids),
            ("datafileIds", &self.datafile_ids),
        ] {
            if !ids.is_empty() {
                parameters.insert(key.to_owned(), ids.joined());
            }
        }
        parameters
    }
}
