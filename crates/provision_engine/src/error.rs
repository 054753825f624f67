use provision_core::{CatalogError, JobId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("job {0:?} is already registered")]
    DuplicateJob(JobId),
    #[error("job {0:?} is not registered")]
    UnknownJob(JobId),
    #[error("job {0:?} is not provisional")]
    NotProvisional(JobId),
    #[error("invalid stage catalog: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not connect: {0}")]
    Connect(String),
    #[error("connection dropped: {0}")]
    Dropped(String),
    #[error("transport runtime failure: {0}")]
    Runtime(String),
}
