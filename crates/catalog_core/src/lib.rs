//! Catalog core: pure harvest state machine and the shared record model.
mod effect;
mod msg;
mod options;
mod record;
mod report;
mod state;
mod update;

pub use effect::{Effect, HarvestFailure, Postback};
pub use msg::{Msg, Transient};
pub use options::{
    EventTarget, HarvestOptions, ParseSortError, SortBy, SortDirection, DEFAULT_RELOAD_ATTEMPTS,
};
pub use record::{EntryKind, SearchPage, SessionTokens, SummaryRecord};
pub use report::{HarvestReport, HarvestStats};
pub use state::{HarvestState, Phase};
pub use update::update;
