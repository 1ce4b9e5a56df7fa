use std::sync::LazyLock;

use catalog_core::{SearchPage, SessionTokens, SummaryRecord};
use chrono::NaiveDate;
use engine_logging::engine_trace;
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::dom::{child_elements, element_by_id, element_text};
use crate::PageError;

const NO_RESULTS_ID: &str = "ctl00_catalogBody_noResultText";
const RESULTS_TABLE_ID: &str = "ctl00_catalogBody_updateMatches";
const RESULT_COUNT_ID: &str = "ctl00_catalogBody_searchDuration";
const NEXT_PAGE_ID: &str = "ctl00_catalogBody_nextPageLinkText";
const EVENT_ARGUMENT_ID: &str = "__EVENTARGUMENT";
const EVENT_VALIDATION_ID: &str = "__EVENTVALIDATION";
const VIEW_STATE_ID: &str = "__VIEWSTATE";
const VIEW_STATE_GENERATOR_ID: &str = "__VIEWSTATEGENERATOR";

const ROW_DATE_FORMAT: &str = "%m/%d/%Y";
const ROW_CELLS: usize = 8;

// "... showing 1 - 25 of 347 ..."; localized pages phrase this differently.
static RESULT_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"of (\d{1,4})").expect("result count pattern is valid"));

/// Decode a search or postback response.
///
/// `query_echo_uri` is carried into the tokens so later postbacks reach the
/// same search. Pure: the same markup always yields the same page.
pub fn decode_search_page(markup: &str, query_echo_uri: &str) -> Result<SearchPage, PageError> {
    let doc = Html::parse_document(markup);

    if element_by_id(&doc, NO_RESULTS_ID).is_some() {
        return Err(PageError::NoResults);
    }
    let table = element_by_id(&doc, RESULTS_TABLE_ID).ok_or(PageError::NoSearchTable)?;

    let tokens = SessionTokens {
        query_echo_uri: query_echo_uri.to_string(),
        event_argument: value_attr(&doc, EVENT_ARGUMENT_ID).unwrap_or_default(),
        event_validation: value_attr(&doc, EVENT_VALIDATION_ID)
            .ok_or(PageError::MissingField(EVENT_VALIDATION_ID))?,
        view_state: value_attr(&doc, VIEW_STATE_ID).ok_or(PageError::MissingField(VIEW_STATE_ID))?,
        view_state_generator: value_attr(&doc, VIEW_STATE_GENERATOR_ID)
            .ok_or(PageError::MissingField(VIEW_STATE_GENERATOR_ID))?,
    };

    let count_text = element_by_id(&doc, RESULT_COUNT_ID)
        .map(element_text)
        .ok_or(PageError::MissingField(RESULT_COUNT_ID))?;
    let reported_count = parse_result_count(&count_text).ok_or(PageError::MalformedValue {
        field: RESULT_COUNT_ID,
        value: count_text.clone(),
    })?;

    let is_final_page = element_by_id(&doc, NEXT_PAGE_ID).is_none();

    let rows = table_rows(table)
        .skip(1)
        .enumerate()
        .map(|(index, row)| decode_row(index + 1, row))
        .collect::<Result<Vec<_>, _>>()?;

    engine_trace!(
        "decoded {} rows (reported {reported_count}, final page: {is_final_page})",
        rows.len()
    );
    Ok(SearchPage::new(tokens, rows, reported_count, is_final_page))
}

/// First 1-4 digit run after the literal "of ".
pub fn parse_result_count(text: &str) -> Option<u32> {
    RESULT_COUNT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn value_attr(doc: &Html, id: &str) -> Option<String> {
    element_by_id(doc, id)
        .and_then(|element| element.value().attr("value"))
        .map(str::to_string)
}

/// `tr` rows of the table, looking through the implicit `tbody` the parser inserts.
fn table_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .flat_map(|child| match child.value().name() {
            "tbody" | "thead" | "tfoot" => child_elements(child, "tr").collect::<Vec<_>>(),
            "tr" => vec![child],
            _ => Vec::new(),
        })
}

fn decode_row(index: usize, row: ElementRef<'_>) -> Result<SummaryRecord, PageError> {
    let malformed = |reason: String| PageError::MalformedRow { row: index, reason };

    let cells: Vec<_> = child_elements(row, "td").collect();
    if cells.len() < ROW_CELLS {
        return Err(malformed(format!(
            "expected {ROW_CELLS} cells, found {}",
            cells.len()
        )));
    }

    let date_text = element_text(cells[4]);
    let last_updated = NaiveDate::parse_from_str(&date_text, ROW_DATE_FORMAT)
        .map_err(|err| malformed(format!("last updated `{date_text}`: {err}")))?;

    let spans: Vec<_> = child_elements(cells[6], "span").collect();
    let [size_label, size_bytes, ..] = spans.as_slice() else {
        return Err(malformed("size cell needs a label and a byte count".into()));
    };
    let bytes_text = element_text(*size_bytes);
    let size_in_bytes = bytes_text
        .parse()
        .map_err(|_| malformed(format!("size in bytes `{bytes_text}`")))?;

    let update_id = cells[7]
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "input")
        .and_then(|input| input.value().id())
        .ok_or_else(|| malformed("missing update id control".into()))?
        .to_string();

    Ok(SummaryRecord {
        update_id,
        title: element_text(cells[1]),
        products: element_text(cells[2]),
        classification: element_text(cells[3]),
        last_updated,
        version: element_text(cells[5]),
        size: element_text(*size_label),
        size_in_bytes,
    })
}
