use std::collections::HashSet;
use std::fmt;

use crate::{
    EventTarget, HarvestOptions, HarvestReport, HarvestStats, Postback, SearchPage, SummaryRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Searching,
    Sorting,
    Paging,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Searching => "searching",
            Phase::Sorting => "sorting",
            Phase::Paging => "paging",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How far a run goes before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Search, sort, then page until exhausted or enough.
    Full,
    /// Search and sort, then stop with the first page.
    FirstPage,
    /// Turn exactly one page, starting from a page the caller already holds.
    NextPage,
}

/// State of one harvest. Owned by exactly one driver; never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestState {
    pub(crate) query: String,
    pub(crate) options: HarvestOptions,
    pub(crate) mode: Mode,
    pub(crate) phase: Phase,
    pub(crate) current: Option<SearchPage>,
    pub(crate) records: Vec<SummaryRecord>,
    pub(crate) seen: HashSet<(u64, String)>,
    pub(crate) reloads_left: u8,
    pub(crate) sort_postbacks_left: u8,
    pub(crate) vendor_total: Option<u32>,
    pub(crate) stats: HarvestStats,
}

impl HarvestState {
    /// Full harvest of `query`: search, optional sort, every page.
    pub fn new(query: impl Into<String>, options: HarvestOptions) -> Self {
        Self::with_mode(query.into(), options, Mode::Full)
    }

    /// Search and optional sort only; completes holding the first page.
    pub fn first_page(query: impl Into<String>, options: HarvestOptions) -> Self {
        Self::with_mode(query.into(), options, Mode::FirstPage)
    }

    /// One page turn from `page`, which the caller obtained earlier.
    pub fn next_page(page: SearchPage, options: HarvestOptions) -> Self {
        let query = page.tokens().query_echo_uri.clone();
        let mut state = Self::with_mode(query, options, Mode::NextPage);
        state.vendor_total = Some(page.reported_count());
        state.current = Some(page);
        state
    }

    fn with_mode(query: String, options: HarvestOptions, mode: Mode) -> Self {
        let reloads_left = options.reload_attempts;
        Self {
            query,
            options,
            mode,
            phase: Phase::Idle,
            current: None,
            records: Vec::new(),
            seen: HashSet::new(),
            reloads_left,
            sort_postbacks_left: 0,
            vendor_total: None,
            stats: HarvestStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn options(&self) -> &HarvestOptions {
        &self.options
    }

    pub fn records(&self) -> &[SummaryRecord] {
        &self.records
    }

    pub fn stats(&self) -> &HarvestStats {
        &self.stats
    }

    /// Most recently decoded page, if any.
    pub fn current_page(&self) -> Option<&SearchPage> {
        self.current.as_ref()
    }

    pub fn reloads_left(&self) -> u8 {
        self.reloads_left
    }

    pub fn into_current_page(self) -> Option<SearchPage> {
        self.current
    }

    pub fn into_report(self) -> HarvestReport {
        HarvestReport {
            reported_count: self.records.len(),
            vendor_total: self.vendor_total,
            records: self.records,
            stats: self.stats,
        }
    }

    pub(crate) fn reset_reloads(&mut self) {
        self.reloads_left = self.options.reload_attempts;
    }

    /// Spend one reload; `false` once the phase budget is gone.
    pub(crate) fn consume_reload(&mut self) -> bool {
        self.stats.reloads += 1;
        self.reloads_left = self.reloads_left.saturating_sub(1);
        self.reloads_left > 0
    }

    pub(crate) fn sort_postback(&mut self) -> Option<Postback> {
        let column = self.options.sort_by?;
        let page = self.current.as_ref()?;
        self.stats.sort_postbacks += 1;
        Some(Postback {
            tokens: page.tokens().clone(),
            target: EventTarget::Sort(column),
            search_text: Some(self.query.clone()),
        })
    }

    pub(crate) fn next_page_postback(&mut self) -> Option<Postback> {
        let tokens = self.current.as_ref()?.next_page_tokens()?.clone();
        self.stats.page_postbacks += 1;
        Some(Postback {
            tokens,
            target: EventTarget::NextPage,
            search_text: None,
        })
    }

    /// Appends the rows of a freshly decoded page in arrival order.
    pub(crate) fn accept_rows(&mut self, rows: &[SummaryRecord]) {
        for row in rows {
            if self.options.ignore_duplicates {
                let key = (row.size_in_bytes, row.title.clone());
                if !self.seen.insert(key) {
                    self.stats.duplicates_dropped += 1;
                    continue;
                }
            }
            self.records.push(row.clone());
        }
    }

    pub(crate) fn reached_max_results(&self) -> bool {
        self.options
            .max_results
            .is_some_and(|max| self.records.len() >= max)
    }
}
