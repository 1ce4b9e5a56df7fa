use crate::{EventTarget, Phase, SessionTokens};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// GET the search endpoint for `query`.
    SendSearch { query: String },
    /// POST the form postback described by the payload.
    SendPostback(Postback),
    /// The harvest finished; the state holds the result.
    Complete,
    /// The harvest failed and will issue no further requests.
    Abort(HarvestFailure),
}

/// Form submission replaying one page's session tokens against a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postback {
    pub tokens: SessionTokens,
    pub target: EventTarget,
    /// Original query text, echoed in the search box field when sorting.
    pub search_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestFailure {
    /// A phase ran out of reload attempts on transient failures.
    ReloadAttemptsExhausted { phase: Phase, attempts: u8 },
    /// Paging was requested from a page that has no next-page control.
    FinalPage,
    Cancelled,
    /// A message arrived that the current phase cannot accept.
    UnexpectedMessage { phase: Phase },
}
