use crate::SearchPage;

/// Input to the harvest state machine, produced by whoever performs the requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Kick off the harvest (first request).
    Start,
    /// The last requested search or postback decoded into a page.
    PageLoaded(SearchPage),
    /// The search response showed the "no results" marker instead of a table.
    NoResults,
    /// The last request hit a recoverable condition and may be resent.
    TransientFailure(Transient),
    /// The caller asked the harvest to stop.
    Cancel,
}

/// The only two conditions a phase retries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transient {
    /// Transport-level timeout.
    Timeout,
    /// The response came back without a results table.
    EmptySearchTable,
}
