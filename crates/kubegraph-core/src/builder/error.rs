use thiserror::Error;

use crate::model::ResourceError;
use crate::store::StoreError;

/// An event the builder could not apply.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Rejected object: {0}")]
    Resource(#[from] ResourceError),

    #[error("Store rejected record: {0}")]
    Store(#[from] StoreError),
}
