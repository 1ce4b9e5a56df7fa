use std::sync::Arc;

use catalog_core::{
    update, Effect, HarvestOptions, HarvestReport, HarvestState, Msg, SearchPage, Transient,
};
use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::fetch::search_uri;
use crate::page::decode_search_page;
use crate::{CatalogError, CatalogRequest, FailureKind, PageError, Transport};

/// Runs the harvest state machine against a [`Transport`].
///
/// Each call owns its own state; one harvester can serve concurrent harvests.
pub struct Harvester {
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
}

impl Harvester {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Requests stop being issued once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Search, sort if asked to, and page until the last page or `max_results`.
    pub async fn harvest(
        &self,
        query: &str,
        options: HarvestOptions,
    ) -> Result<HarvestReport, CatalogError> {
        engine_info!("Harvesting `{query}`");
        let state = self.drive(HarvestState::new(query, options)).await?;
        let report = state.into_report();
        engine_info!(
            "Harvested {} records for `{query}` ({} postbacks, {} reloads, {} duplicates dropped)",
            report.reported_count,
            report.stats.postbacks(),
            report.stats.reloads,
            report.stats.duplicates_dropped
        );
        Ok(report)
    }

    /// The first (sorted) page of results, or `None` when the search finds nothing.
    pub async fn first_page(
        &self,
        query: &str,
        options: HarvestOptions,
    ) -> Result<Option<SearchPage>, CatalogError> {
        let state = self.drive(HarvestState::first_page(query, options)).await?;
        Ok(state.into_current_page())
    }

    /// The page after `page`. Fails with [`CatalogError::FinalPage`] on the last page.
    pub async fn next_page(
        &self,
        page: &SearchPage,
        options: &HarvestOptions,
    ) -> Result<SearchPage, CatalogError> {
        let state = self
            .drive(HarvestState::next_page(page.clone(), options.clone()))
            .await?;
        state
            .into_current_page()
            .ok_or_else(|| CatalogError::ParseFailure("page turn produced no page".into()))
    }

    async fn drive(&self, mut state: HarvestState) -> Result<HarvestState, CatalogError> {
        let mut msg = Msg::Start;
        loop {
            let (next, effects) = update(state, msg);
            state = next;
            let Some(effect) = effects.into_iter().next() else {
                return Ok(state);
            };
            msg = match effect {
                Effect::SendSearch { query } => {
                    engine_debug!("Searching `{query}`");
                    let uri = search_uri(&query);
                    self.perform(CatalogRequest::Search { query }, &uri).await?
                }
                Effect::SendPostback(postback) => {
                    engine_debug!("Postback: {} (phase {})", postback.target, state.phase());
                    let uri = postback.tokens.query_echo_uri.clone();
                    self.perform(CatalogRequest::Postback(postback), &uri).await?
                }
                Effect::Complete => return Ok(state),
                Effect::Abort(failure) => {
                    engine_warn!("Harvest of `{}` aborted: {failure:?}", state.query());
                    return Err(failure.into());
                }
            };
        }
    }

    /// Sends one request and turns its outcome into the next message.
    async fn perform(
        &self,
        request: CatalogRequest,
        query_echo_uri: &str,
    ) -> Result<Msg, CatalogError> {
        if self.cancel.is_cancelled() {
            return Ok(Msg::Cancel);
        }
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(Msg::Cancel),
            response = self.transport.send(&request) => response,
        };

        let output = match response {
            Ok(output) => output,
            Err(err) if err.kind == FailureKind::Timeout => {
                engine_warn!("{} timed out: {}", request.label(), err.message);
                return Ok(Msg::TransientFailure(Transient::Timeout));
            }
            Err(err) => return Err(err.into()),
        };

        match decode_search_page(&output.body, query_echo_uri) {
            Ok(page) => Ok(Msg::PageLoaded(page)),
            Err(PageError::NoResults) => Ok(Msg::NoResults),
            Err(PageError::NoSearchTable) => {
                engine_warn!("{} returned no results table", request.label());
                Ok(Msg::TransientFailure(Transient::EmptySearchTable))
            }
            Err(err) => Err(err.into()),
        }
    }
}
