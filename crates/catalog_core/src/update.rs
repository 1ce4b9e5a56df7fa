use crate::state::Mode;
use crate::{Effect, HarvestFailure, HarvestState, Msg, Phase};

/// Pure update function: applies a message to the harvest and returns the next request.
///
/// Every call yields at most one effect. The driver performs it, turns the
/// response into the next [`Msg`], and feeds it back until it sees
/// [`Effect::Complete`] or [`Effect::Abort`].
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match (state.phase, msg) {
        (Phase::Done | Phase::Failed, _) => Vec::new(),
        (_, Msg::Cancel) => fail(&mut state, HarvestFailure::Cancelled),
        (Phase::Idle, Msg::Start) => start(&mut state),
        (Phase::Searching, Msg::NoResults) => complete(&mut state),
        (Phase::Searching, Msg::PageLoaded(page)) => {
            state.stats.pages_decoded += 1;
            state.vendor_total = Some(page.reported_count());
            state.current = Some(page);
            state.reset_reloads();
            if state.options.sort_by.is_some() {
                state.phase = Phase::Sorting;
                state.sort_postbacks_left = state.options.sort_direction.postbacks();
                send_sort(&mut state)
            } else {
                enter_paging(&mut state)
            }
        }
        (Phase::Sorting, Msg::PageLoaded(page)) => {
            state.stats.pages_decoded += 1;
            state.current = Some(page);
            state.reset_reloads();
            state.sort_postbacks_left = state.sort_postbacks_left.saturating_sub(1);
            if state.sort_postbacks_left > 0 {
                send_sort(&mut state)
            } else {
                enter_paging(&mut state)
            }
        }
        (Phase::Paging, Msg::PageLoaded(page)) => {
            state.stats.pages_decoded += 1;
            state.accept_rows(page.rows());
            state.current = Some(page);
            // A good page refunds the budget: page 5 never pays for page 2.
            state.reset_reloads();
            if state.mode == Mode::NextPage {
                complete(&mut state)
            } else {
                continue_paging(&mut state)
            }
        }
        (Phase::Searching | Phase::Sorting | Phase::Paging, Msg::TransientFailure(_)) => {
            reload(&mut state)
        }
        (phase, _) => fail(&mut state, HarvestFailure::UnexpectedMessage { phase }),
    };

    (state, effects)
}

fn start(state: &mut HarvestState) -> Vec<Effect> {
    match state.mode {
        Mode::Full | Mode::FirstPage => {
            state.phase = Phase::Searching;
            send_search(state)
        }
        Mode::NextPage => {
            state.phase = Phase::Paging;
            match state.next_page_postback() {
                Some(postback) => vec![Effect::SendPostback(postback)],
                None => fail(state, HarvestFailure::FinalPage),
            }
        }
    }
}

fn send_search(state: &mut HarvestState) -> Vec<Effect> {
    state.stats.search_requests += 1;
    vec![Effect::SendSearch {
        query: state.query.clone(),
    }]
}

fn send_sort(state: &mut HarvestState) -> Vec<Effect> {
    match state.sort_postback() {
        Some(postback) => vec![Effect::SendPostback(postback)],
        None => {
            let phase = state.phase;
            fail(state, HarvestFailure::UnexpectedMessage { phase })
        }
    }
}

/// The first page is settled (sorted if requested); its rows start the accumulation.
fn enter_paging(state: &mut HarvestState) -> Vec<Effect> {
    let rows = state
        .current
        .as_ref()
        .map(|page| page.rows().to_vec())
        .unwrap_or_default();
    state.accept_rows(&rows);

    if state.mode == Mode::FirstPage {
        return complete(state);
    }
    state.phase = Phase::Paging;
    continue_paging(state)
}

fn continue_paging(state: &mut HarvestState) -> Vec<Effect> {
    if state.reached_max_results() {
        return complete(state);
    }
    match state.next_page_postback() {
        Some(postback) => vec![Effect::SendPostback(postback)],
        None => complete(state),
    }
}

fn reload(state: &mut HarvestState) -> Vec<Effect> {
    let phase = state.phase;
    if !state.consume_reload() {
        let attempts = state.options.reload_attempts;
        return fail(state, HarvestFailure::ReloadAttemptsExhausted { phase, attempts });
    }

    // The failed request changed nothing, so the same tokens are replayed.
    match phase {
        Phase::Searching => send_search(state),
        Phase::Sorting => send_sort(state),
        _ => match state.next_page_postback() {
            Some(postback) => vec![Effect::SendPostback(postback)],
            None => fail(state, HarvestFailure::UnexpectedMessage { phase }),
        },
    }
}

fn complete(state: &mut HarvestState) -> Vec<Effect> {
    state.phase = Phase::Done;
    vec![Effect::Complete]
}

fn fail(state: &mut HarvestState, failure: HarvestFailure) -> Vec<Effect> {
    state.phase = Phase::Failed;
    vec![Effect::Abort(failure)]
}
