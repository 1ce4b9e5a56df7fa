use std::sync::Arc;

use catalog_core::{EntryKind, SummaryRecord};
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::details::DetailPage;
use crate::links::download_links;
use crate::{
    CatalogEntity, CatalogError, CatalogRequest, DriverEntry, EntryDetails, FailureKind,
    SharedFields, StandardEntry, Transport,
};

const TRY_LATER_CODE: &str = "8DDD0010";
const NOT_FOUND_CODE: &str = "8DDD0024";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Parse attempts for the shared detail fields, each on a freshly fetched page.
    pub retry_budget: u8,
    /// Records extracted at once by [`Extractor::details_many`].
    pub concurrency: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            concurrency: 4,
        }
    }
}

/// Turns summary rows into full [`CatalogEntity`] values.
pub struct Extractor {
    transport: Arc<dyn Transport>,
    settings: ExtractSettings,
    cancel: CancellationToken,
}

impl Extractor {
    pub fn new(transport: Arc<dyn Transport>, settings: ExtractSettings) -> Self {
        Self {
            transport,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetches the detail page and the download manifest of `record` and builds its entity.
    ///
    /// Unknown classifications fail before any request is made.
    pub async fn details(&self, record: &SummaryRecord) -> Result<CatalogEntity, CatalogError> {
        let kind = record.kind();
        if kind == EntryKind::Unknown {
            return Err(CatalogError::NotImplemented {
                classification: record.classification.clone(),
            });
        }
        let update_id = record.update_id.as_str();

        let mut detail_markup = self.fetch_details(update_id).await?;
        let manifest = self
            .send(CatalogRequest::DownloadManifest {
                update_id: update_id.to_string(),
            })
            .await?;
        let links = download_links(&manifest);
        if links.is_empty() {
            return Err(CatalogError::UnableToCollectDetails(
                "download manifest does not contain any download links".into(),
            ));
        }

        let mut budget = self.settings.retry_budget;
        let shared = loop {
            // The parsed page must not live across the refetch below.
            let parsed = DetailPage::parse(&detail_markup).shared();
            match parsed {
                Ok(shared) => break shared,
                Err(err) => {
                    budget = budget.saturating_sub(1);
                    if budget == 0 {
                        return Err(CatalogError::UnableToCollectDetails(format!(
                            "update {update_id}: {err}"
                        )));
                    }
                    engine_warn!(
                        "Details of {update_id} unreadable ({err}); {budget} attempts left"
                    );
                    detail_markup = self.fetch_details(update_id).await?;
                }
            }
        };

        let entity = assemble(record, kind, &detail_markup, links, shared)?;
        engine_debug!(
            "Extracted {} ({:?}) with {} links",
            update_id,
            kind,
            entity.download_links().len()
        );
        Ok(entity)
    }

    /// Like [`Extractor::details`], but logs the failure and yields `None`.
    pub async fn details_lenient(&self, record: &SummaryRecord) -> Option<CatalogEntity> {
        match self.details(record).await {
            Ok(entity) => Some(entity),
            Err(err) => {
                engine_warn!("Skipping {} ({}): {err}", record.update_id, record.title);
                None
            }
        }
    }

    /// Extracts several records with bounded parallelism; results keep input order.
    pub async fn details_many(
        &self,
        records: &[SummaryRecord],
    ) -> Vec<Result<CatalogEntity, CatalogError>> {
        let limit = self.settings.concurrency.max(1);
        engine_info!("Extracting {} records, {limit} at a time", records.len());
        stream::iter(records.iter().map(|record| self.details(record)))
            .buffered(limit)
            .collect()
            .await
    }

    /// Bounded fan-out over [`Extractor::details_lenient`]; failed records are left out.
    pub async fn details_many_lenient(&self, records: &[SummaryRecord]) -> Vec<CatalogEntity> {
        let limit = self.settings.concurrency.max(1);
        stream::iter(records.iter().map(|record| self.details_lenient(record)))
            .buffered(limit)
            .filter_map(|entity| async move { entity })
            .collect()
            .await
    }

    async fn fetch_details(&self, update_id: &str) -> Result<String, CatalogError> {
        let markup = self
            .send(CatalogRequest::Details {
                update_id: update_id.to_string(),
            })
            .await
            .map_err(|err| match err {
                CatalogError::Http { status } => CatalogError::UnableToCollectDetails(format!(
                    "catalog responded with status {status}"
                )),
                other => other,
            })?;
        check_vendor_error(update_id, &markup)?;
        Ok(markup)
    }

    async fn send(&self, request: CatalogRequest) -> Result<String, CatalogError> {
        if self.cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CatalogError::Cancelled),
            output = self.transport.send(&request) => output,
        };
        match output {
            Ok(output) => Ok(output.body),
            Err(err) if err.kind == FailureKind::Timeout => Err(CatalogError::Timeout),
            Err(err) => Err(err.into()),
        }
    }
}

fn check_vendor_error(update_id: &str, markup: &str) -> Result<(), CatalogError> {
    let Some(code) = DetailPage::parse(markup).error_code() else {
        return Ok(());
    };
    match code.as_str() {
        TRY_LATER_CODE => Err(CatalogError::UnableToCollectDetails(
            "catalog cannot process the request right now, try again later".into(),
        )),
        NOT_FOUND_CODE => Err(CatalogError::UpdateNotFound {
            update_id: update_id.to_string(),
        }),
        _ => Err(CatalogError::VendorError { code }),
    }
}

fn assemble(
    record: &SummaryRecord,
    kind: EntryKind,
    detail_markup: &str,
    links: Vec<String>,
    shared: SharedFields,
) -> Result<CatalogEntity, CatalogError> {
    let page = DetailPage::parse(detail_markup);
    let details = EntryDetails::new(record, links, shared);
    let entity = if kind == EntryKind::Driver {
        CatalogEntity::Driver(DriverEntry {
            details,
            fields: page.driver()?,
        })
    } else {
        CatalogEntity::Standard(StandardEntry {
            kind,
            details,
            fields: page.standard()?,
        })
    };
    Ok(entity)
}
