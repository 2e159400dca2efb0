use thiserror::Error;

use crate::item::ItemId;

/// A field value that violates its invariant. Raised before anything is
/// committed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("category must not be empty")]
    EmptyCategory,
    #[error("price must be greater than zero, got {0}")]
    NonPositivePrice(f64),
    #[error("weight must be greater than zero, got {0}")]
    NonPositiveWeight(i64),
    #[error("unknown status {0:?}; expected one of: available, on_order, out_of_stock")]
    UnknownStatus(String),
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(ItemId),
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Storage(Box::new(err))
    }
}

/// Error type for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("item not found: {0}")]
    NotFound(ItemId),
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("catalog is shut down")]
    ShutDown,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CatalogError::NotFound(id),
            StoreError::Storage(source) => CatalogError::Storage(source),
        }
    }
}
