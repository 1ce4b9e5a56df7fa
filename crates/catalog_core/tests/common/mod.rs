#![allow(dead_code)]

use std::sync::Once;

use catalog_core::{
    update, Effect, HarvestState, Msg, Postback, SearchPage, SessionTokens, SummaryRecord,
};
use chrono::NaiveDate;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn tokens(tag: &str) -> SessionTokens {
    SessionTokens {
        query_echo_uri: "Search.aspx?q=kb5005565".to_string(),
        event_argument: String::new(),
        event_validation: format!("validation-{tag}"),
        view_state: format!("viewstate-{tag}"),
        view_state_generator: "8E2F3C9D".to_string(),
    }
}

pub fn row(id: &str, title: &str, size_in_bytes: u64) -> SummaryRecord {
    SummaryRecord {
        update_id: id.to_string(),
        title: title.to_string(),
        classification: "Security Updates".to_string(),
        products: "Windows 10".to_string(),
        last_updated: NaiveDate::from_ymd_opt(2021, 9, 14).unwrap(),
        version: "n/a".to_string(),
        size: format!("{size_in_bytes} B"),
        size_in_bytes,
    }
}

pub fn page(tag: &str, rows: Vec<SummaryRecord>, is_final: bool) -> SearchPage {
    SearchPage::new(tokens(tag), rows, 99, is_final)
}

pub fn postback_of(effects: &[Effect]) -> Postback {
    match effects {
        [Effect::SendPostback(postback)] => postback.clone(),
        other => panic!("expected a single postback, got {other:?}"),
    }
}

/// Starts a harvest and answers the search request with `first`.
pub fn start_with(state: HarvestState, first: SearchPage) -> (HarvestState, Vec<Effect>) {
    let (state, effects) = update(state, Msg::Start);
    assert!(matches!(effects.as_slice(), [Effect::SendSearch { .. }]));
    update(state, Msg::PageLoaded(first))
}
