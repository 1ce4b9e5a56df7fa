use serde::Serialize;

use crate::SummaryRecord;

/// Request and page counters for one harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HarvestStats {
    pub search_requests: u32,
    pub sort_postbacks: u32,
    pub page_postbacks: u32,
    pub pages_decoded: u32,
    /// Resends caused by timeouts or empty result tables.
    pub reloads: u32,
    pub duplicates_dropped: u32,
}

impl HarvestStats {
    pub fn postbacks(&self) -> u32 {
        self.sort_postbacks + self.page_postbacks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    /// Kept records in arrival order.
    pub records: Vec<SummaryRecord>,
    /// Number of kept records.
    pub reported_count: usize,
    /// Hit count printed by the vendor on the first decoded page.
    pub vendor_total: Option<u32>,
    pub stats: HarvestStats,
}
