use catalog_core::{HarvestFailure, Phase};
use thiserror::Error;

use crate::{FailureKind, FetchError};

/// Failure to read an expected structure out of a vendor page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// The response has no results table (and no "no results" marker either).
    #[error("response does not contain a search results table")]
    NoSearchTable,
    #[error("search returned no results")]
    NoResults,
    #[error("required element `{0}` is missing")]
    MissingField(&'static str),
    #[error("results row {row} is malformed: {reason}")]
    MalformedRow { row: usize, reason: String },
    #[error("element `{field}` holds an unreadable value `{value}`")]
    MalformedValue { field: &'static str, value: String },
}

/// Every failure a caller of the harvester, extractor or downloader can observe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("request to the catalog timed out")]
    Timeout,
    #[error("catalog returned a page without a search results table")]
    EmptySearchTable,
    #[error("update {update_id} does not exist or was removed")]
    UpdateNotFound { update_id: String },
    #[error("catalog returned unknown error code {code}")]
    VendorError { code: String },
    #[error("unable to collect update details: {0}")]
    UnableToCollectDetails(String),
    #[error("failed to parse catalog page: {0}")]
    ParseFailure(String),
    #[error("classification `{classification}` is not supported")]
    NotImplemented { classification: String },
    #[error("gave up after {attempts} attempts while {phase}")]
    ReloadAttemptsExhausted { phase: Phase, attempts: u8 },
    #[error("no more search results: this is the final page")]
    FinalPage,
    #[error("operation was cancelled")]
    Cancelled,
    #[error("catalog responded with http status {status}")]
    Http { status: u16 },
    #[error("network error: {0}")]
    Network(String),
}

impl CatalogError {
    /// The two conditions a harvest phase absorbs with its reload budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Timeout | CatalogError::EmptySearchTable)
    }
}

impl From<FetchError> for CatalogError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FailureKind::Timeout => CatalogError::Timeout,
            FailureKind::HttpStatus(status) => CatalogError::Http { status },
            FailureKind::Decode => CatalogError::ParseFailure(err.message),
            FailureKind::InvalidUrl | FailureKind::TooLarge { .. } | FailureKind::Network => {
                CatalogError::Network(err.to_string())
            }
        }
    }
}

impl From<PageError> for CatalogError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::NoSearchTable => CatalogError::EmptySearchTable,
            other => CatalogError::ParseFailure(other.to_string()),
        }
    }
}

impl From<HarvestFailure> for CatalogError {
    fn from(failure: HarvestFailure) -> Self {
        match failure {
            HarvestFailure::ReloadAttemptsExhausted { phase, attempts } => {
                CatalogError::ReloadAttemptsExhausted { phase, attempts }
            }
            HarvestFailure::FinalPage => CatalogError::FinalPage,
            HarvestFailure::Cancelled => CatalogError::Cancelled,
            HarvestFailure::UnexpectedMessage { phase } => {
                CatalogError::ParseFailure(format!("unexpected response while {phase}"))
            }
        }
    }
}
