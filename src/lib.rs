//! # IDS Client
//!
//! A library for talking to an ICAT Data Service: archiving, restoring,
//! downloading and uploading scientific data.

pub mod client;

pub use client::net;
pub use client::Client;
pub use client::ClientBuilder;
pub use client::ClientBuilderError;
pub use client::DataSelection;
pub use client::DataStream;
pub use client::ErrorKind;
pub use client::Flag;
pub use client::IdsError;
pub use client::NewDatafile;
pub use client::ServiceStatus;
pub use client::Status;
pub use client::MAX_URL_LENGTH;
