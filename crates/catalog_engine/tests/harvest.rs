mod common;

use std::sync::Arc;

use catalog_core::{EventTarget, HarvestOptions, Phase, SortBy, SortDirection};
use catalog_engine::{CatalogError, CatalogRequest, FailureKind, Harvester};
use common::{
    empty_table_markup, init_logging, no_results_markup, row, search_markup, ScriptedTransport,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn three_rows(prefix: &str, base: u64) -> Vec<common::Row> {
    (0..3)
        .map(|i| row(&format!("{prefix}-{i}"), &format!("{prefix} update {i}"), base + i))
        .collect()
}

fn postback_targets(requests: &[CatalogRequest]) -> Vec<EventTarget> {
    requests
        .iter()
        .filter_map(|request| match request {
            CatalogRequest::Postback(postback) => Some(postback.target),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn timeout_on_second_page_is_retried() {
    init_logging();
    let transport = ScriptedTransport::new([
        Ok(search_markup("p1", &three_rows("a", 1000), true, 5)),
        Err(FailureKind::Timeout),
        Ok(search_markup(
            "p2",
            &[row("b-0", "b update 0", 2000), row("b-1", "b update 1", 2001)],
            false,
            5,
        )),
    ]);
    let harvester = Harvester::new(transport.clone());
    let options = HarvestOptions {
        reload_attempts: 3,
        ignore_duplicates: true,
        ..HarvestOptions::default()
    };

    let report = harvester.harvest("kb5005565", options).await.unwrap();

    let ids: Vec<_> = report.records.iter().map(|r| r.update_id.as_str()).collect();
    assert_eq!(ids, vec!["a-0", "a-1", "a-2", "b-0", "b-1"]);
    assert_eq!(report.stats.reloads, 1);
    assert_eq!(report.reported_count, 5);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    // The retried postback replays the first page's tokens.
    assert_eq!(requests[1], requests[2]);
    match &requests[1] {
        CatalogRequest::Postback(postback) => {
            assert_eq!(postback.tokens.view_state, "vs-p1");
            assert_eq!(postback.tokens.query_echo_uri, "Search.aspx?q=kb5005565");
        }
        other => panic!("expected a postback, got {other:?}"),
    }
}

#[tokio::test]
async fn max_results_stops_before_a_third_page() {
    init_logging();
    let transport = ScriptedTransport::new([
        Ok(search_markup("p1", &three_rows("a", 1000), true, 9)),
        Ok(search_markup("p2", &three_rows("b", 2000), true, 9)),
    ]);
    let harvester = Harvester::new(transport.clone());
    let options = HarvestOptions {
        max_results: Some(4),
        ..HarvestOptions::default()
    };

    let report = harvester.harvest("q", options).await.unwrap();

    assert_eq!(report.records.len(), 6);
    assert_eq!(transport.requests().len(), 2);
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test]
async fn no_results_is_an_empty_success() {
    init_logging();
    let transport = ScriptedTransport::new([Ok(no_results_markup())]);
    let harvester = Harvester::new(transport.clone());
    let options = HarvestOptions {
        sort_by: Some(SortBy::Title),
        ..HarvestOptions::default()
    };

    let report = harvester.harvest("zzz", options).await.unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.stats.postbacks(), 0);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn descending_sort_doubles_sort_postbacks() {
    init_logging();
    async fn run(direction: SortDirection) -> Vec<EventTarget> {
        let sorts = if direction == SortDirection::Descending { 2 } else { 1 };
        let mut script = vec![Ok(search_markup("search", &three_rows("a", 1), true, 6))];
        for n in 0..sorts {
            script.push(Ok(search_markup(&format!("sort{n}"), &three_rows("a", 1), true, 6)));
        }
        script.push(Ok(search_markup("p2", &three_rows("b", 100), false, 6)));
        let transport = ScriptedTransport::new(script);
        let options = HarvestOptions {
            sort_by: Some(SortBy::LastUpdated),
            sort_direction: direction,
            ..HarvestOptions::default()
        };
        Harvester::new(transport.clone())
            .harvest("q", options)
            .await
            .unwrap();
        postback_targets(&transport.requests())
    }

    let sort = EventTarget::Sort(SortBy::LastUpdated);
    let ascending = run(SortDirection::Ascending).await;
    let descending = run(SortDirection::Descending).await;
    assert_eq!(ascending, vec![sort, EventTarget::NextPage]);
    assert_eq!(descending, vec![sort, sort, EventTarget::NextPage]);
}

#[tokio::test]
async fn sort_postbacks_echo_the_query() {
    init_logging();
    let transport = ScriptedTransport::new([
        Ok(search_markup("search", &three_rows("a", 1), false, 3)),
        Ok(search_markup("sorted", &three_rows("a", 1), false, 3)),
    ]);
    let options = HarvestOptions {
        sort_by: Some(SortBy::Size),
        sort_direction: SortDirection::Ascending,
        ..HarvestOptions::default()
    };
    Harvester::new(transport.clone())
        .harvest("kb 123", options)
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(
        requests[0],
        CatalogRequest::Search {
            query: "kb 123".into()
        }
    );
    let CatalogRequest::Postback(postback) = &requests[1] else {
        panic!("expected a sort postback");
    };
    assert_eq!(postback.search_text.as_deref(), Some("kb 123"));
    assert_eq!(postback.tokens.query_echo_uri, "Search.aspx?q=kb+123");
    assert_eq!(postback.tokens.view_state, "vs-search");
}

#[tokio::test]
async fn exhausted_reloads_fail_the_harvest() {
    init_logging();
    let transport = ScriptedTransport::new([
        Ok(empty_table_markup()),
        Err(FailureKind::Timeout),
        Ok(empty_table_markup()),
    ]);
    let err = Harvester::new(transport.clone())
        .harvest("q", HarvestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CatalogError::ReloadAttemptsExhausted {
            phase: Phase::Searching,
            attempts: 3
        }
    );
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn non_transient_failures_are_not_retried() {
    init_logging();
    let transport = ScriptedTransport::new([Err(FailureKind::HttpStatus(500))]);
    let err = Harvester::new(transport.clone())
        .harvest("q", HarvestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, CatalogError::Http { status: 500 });
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn duplicates_across_pages_are_dropped() {
    init_logging();
    let transport = ScriptedTransport::new([
        Ok(search_markup(
            "p1",
            &[row("x64", "Servicing Stack", 4096), row("x86", "Other", 10)],
            true,
            4,
        )),
        Ok(search_markup(
            "p2",
            &[row("arm64", "Servicing Stack", 4096), row("ia64", "Servicing Stack", 4097)],
            false,
            4,
        )),
    ]);
    let report = Harvester::new(transport)
        .harvest("q", HarvestOptions::default())
        .await
        .unwrap();
    let ids: Vec<_> = report.records.iter().map(|r| r.update_id.as_str()).collect();
    assert_eq!(ids, vec!["x64", "x86", "ia64"]);
    assert_eq!(report.stats.duplicates_dropped, 1);
}

#[tokio::test]
async fn cancelled_harvest_issues_no_requests() {
    init_logging();
    let transport = ScriptedTransport::new(Vec::<common::Reply>::new());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Harvester::new(transport.clone())
        .with_cancellation(cancel)
        .harvest("q", HarvestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, CatalogError::Cancelled);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn pages_can_be_walked_one_at_a_time() {
    init_logging();
    let transport = ScriptedTransport::new([
        Ok(search_markup("p1", &three_rows("a", 1), true, 6)),
        Ok(search_markup("p2", &three_rows("b", 100), false, 6)),
    ]);
    let harvester = Harvester::new(transport.clone());
    let options = HarvestOptions::default();

    let first = harvester.first_page("q", options.clone()).await.unwrap().unwrap();
    assert_eq!(first.rows().len(), 3);
    assert_eq!(transport.requests().len(), 1);

    let second = harvester.next_page(&first, &options).await.unwrap();
    assert_eq!(second.rows()[0].update_id, "b-0");
    assert!(second.is_final_page());

    let err = harvester.next_page(&second, &options).await.unwrap_err();
    assert_eq!(err, CatalogError::FinalPage);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn first_page_of_empty_search_is_none() {
    init_logging();
    let transport = ScriptedTransport::new([Ok(no_results_markup())]);
    let page = Harvester::new(transport)
        .first_page("zzz", HarvestOptions::default())
        .await
        .unwrap();
    assert_eq!(page, None);
}

#[tokio::test]
async fn harvester_is_shareable_across_tasks() {
    init_logging();
    let transport = ScriptedTransport::new([Ok(no_results_markup()), Ok(no_results_markup())]);
    let harvester = Arc::new(Harvester::new(transport));
    let tasks: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|query| {
            let harvester = harvester.clone();
            tokio::spawn(async move { harvester.harvest(query, HarvestOptions::default()).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().records.is_empty());
    }
}
