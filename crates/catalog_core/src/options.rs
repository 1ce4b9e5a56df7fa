use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_RELOAD_ATTEMPTS: u8 = 3;

const NEXT_PAGE_CONTROL: &str = "ctl00$catalogBody$nextPageLinkText";

/// Column the vendor page can sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Title,
    Products,
    Classification,
    LastUpdated,
    Version,
    Size,
}

impl SortBy {
    /// Server-side name of the column header control.
    pub fn control_name(self) -> &'static str {
        match self {
            SortBy::Title => "ctl00$catalogBody$updateMatches$ctl02$titleHeaderLink",
            SortBy::Products => "ctl00$catalogBody$updateMatches$ctl02$productsHeaderLink",
            SortBy::Classification => "ctl00$catalogBody$updateMatches$ctl02$classHeaderLink",
            SortBy::LastUpdated => "ctl00$catalogBody$updateMatches$ctl02$dateHeaderLink",
            SortBy::Version => "ctl00$catalogBody$updateMatches$ctl02$versionHeaderLink",
            SortBy::Size => "ctl00$catalogBody$updateMatches$ctl02$sizeHeaderLink",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort column `{0}`")]
pub struct ParseSortError(String);

impl FromStr for SortBy {
    type Err = ParseSortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "title" => Ok(SortBy::Title),
            "products" => Ok(SortBy::Products),
            "classification" => Ok(SortBy::Classification),
            "lastupdated" | "date" => Ok(SortBy::LastUpdated),
            "version" => Ok(SortBy::Version),
            "size" => Ok(SortBy::Size),
            _ => Err(ParseSortError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    /// Number of identical sort postbacks needed to reach this direction.
    ///
    /// The vendor page only has a toggle: the first click sorts ascending, a
    /// second click on the same header reverses it.
    pub fn postbacks(self) -> u8 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => 2,
        }
    }
}

/// Control named as `__EVENTTARGET` in a postback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    NextPage,
    Sort(SortBy),
}

impl EventTarget {
    pub fn control_name(self) -> &'static str {
        match self {
            EventTarget::NextPage => NEXT_PAGE_CONTROL,
            EventTarget::Sort(column) => column.control_name(),
        }
    }
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTarget::NextPage => write!(f, "next page"),
            EventTarget::Sort(column) => write!(f, "sort by {column:?}"),
        }
    }
}

/// Caller-facing knobs of a single harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestOptions {
    pub sort_by: Option<SortBy>,
    pub sort_direction: SortDirection,
    /// Drop rows whose `(size_in_bytes, title)` was already kept.
    pub ignore_duplicates: bool,
    /// Stop paging once at least this many records were kept.
    pub max_results: Option<usize>,
    /// Attempts per phase before a transient failure becomes fatal.
    pub reload_attempts: u8,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            sort_by: None,
            sort_direction: SortDirection::Descending,
            ignore_duplicates: true,
            max_results: None,
            reload_attempts: DEFAULT_RELOAD_ATTEMPTS,
        }
    }
}
