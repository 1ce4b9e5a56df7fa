use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Server-issued form state that must be replayed verbatim on the next postback.
///
/// The values are opaque: they are copied out of one response and sent back
/// byte-for-byte with the following request. A new page always brings a whole
/// new tuple; nothing here is ever updated field by field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionTokens {
    /// Relative search URI the postbacks are submitted to (`Search.aspx?q=...`).
    pub query_echo_uri: String,
    pub event_argument: String,
    pub event_validation: String,
    pub view_state: String,
    pub view_state_generator: String,
}

/// One row of the search results table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub update_id: String,
    pub title: String,
    pub classification: String,
    /// Comma separated product label exactly as the row shows it.
    pub products: String,
    pub last_updated: NaiveDate,
    pub version: String,
    /// Human readable size label, e.g. `"1.2 MB"`.
    pub size: String,
    pub size_in_bytes: u64,
}

impl SummaryRecord {
    /// Identity used when duplicates are ignored.
    ///
    /// The same update is often republished under several ids (one per
    /// platform); size and title together are what collapses those into one hit.
    pub fn dedup_key(&self) -> (u64, &str) {
        (self.size_in_bytes, self.title.as_str())
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from_classification(&self.classification)
    }

    /// Splits the products label into trimmed, non-empty product names.
    pub fn product_names(&self) -> Vec<String> {
        self.products
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

/// Decoded search or postback response.
///
/// Immutable once built; the next page supersedes it instead of mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    tokens: SessionTokens,
    rows: Vec<SummaryRecord>,
    reported_count: u32,
    is_final_page: bool,
}

impl SearchPage {
    pub fn new(
        tokens: SessionTokens,
        rows: Vec<SummaryRecord>,
        reported_count: u32,
        is_final_page: bool,
    ) -> Self {
        Self {
            tokens,
            rows,
            reported_count,
            is_final_page,
        }
    }

    /// Tokens for postbacks that re-render this page (sorting).
    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    /// Tokens usable to request the following page; `None` on the final page.
    pub fn next_page_tokens(&self) -> Option<&SessionTokens> {
        if self.is_final_page {
            None
        } else {
            Some(&self.tokens)
        }
    }

    pub fn rows(&self) -> &[SummaryRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<SummaryRecord> {
        self.rows
    }

    /// Total hit count as printed by the vendor ("showing 1 - 25 of N").
    pub fn reported_count(&self) -> u32 {
        self.reported_count
    }

    pub fn is_final_page(&self) -> bool {
        self.is_final_page
    }
}

/// Entry shape selected from a classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    SecurityUpdate,
    CriticalUpdate,
    DefinitionUpdate,
    FeaturePack,
    ServicePack,
    UpdateRollup,
    StandardUpdate,
    Hotfix,
    Driver,
    Unknown,
}

impl EntryKind {
    pub fn from_classification(label: &str) -> Self {
        let label = label.trim();
        if label.to_ascii_lowercase().contains("driver") {
            return EntryKind::Driver;
        }
        match label {
            "Security Updates" => EntryKind::SecurityUpdate,
            "Critical Updates" => EntryKind::CriticalUpdate,
            "Definition Updates" => EntryKind::DefinitionUpdate,
            "Feature Packs" => EntryKind::FeaturePack,
            "Service Packs" => EntryKind::ServicePack,
            "Update Rollups" => EntryKind::UpdateRollup,
            "Updates" => EntryKind::StandardUpdate,
            "Hotfix" => EntryKind::Hotfix,
            _ => EntryKind::Unknown,
        }
    }

    /// True for every known non-driver classification.
    pub fn is_standard(self) -> bool {
        !matches!(self, EntryKind::Driver | EntryKind::Unknown)
    }
}
