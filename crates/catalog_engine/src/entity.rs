use std::collections::BTreeSet;

use catalog_core::{EntryKind, SummaryRecord};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{DriverFields, SharedFields, StandardFields};

/// Summary row data, detail-page fields and download links shared by both entry shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDetails {
    pub update_id: String,
    pub title: String,
    pub classification: String,
    pub products: BTreeSet<String>,
    pub last_updated: NaiveDate,
    pub version: String,
    pub size: String,
    pub size_in_bytes: u64,
    /// Never empty on an extracted entity.
    pub download_links: Vec<String>,
    #[serde(flatten)]
    pub fields: SharedFields,
}

impl EntryDetails {
    pub(crate) fn new(record: &SummaryRecord, download_links: Vec<String>, fields: SharedFields) -> Self {
        Self {
            update_id: record.update_id.clone(),
            title: record.title.clone(),
            classification: record.classification.clone(),
            products: record.product_names().into_iter().collect(),
            last_updated: record.last_updated,
            version: record.version.clone(),
            size: record.size.clone(),
            size_in_bytes: record.size_in_bytes,
            download_links,
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandardEntry {
    pub kind: EntryKind,
    #[serde(flatten)]
    pub details: EntryDetails,
    #[serde(flatten)]
    pub fields: StandardFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverEntry {
    #[serde(flatten)]
    pub details: EntryDetails,
    #[serde(flatten)]
    pub fields: DriverFields,
}

/// A fully extracted catalog entry. Only ever built complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum CatalogEntity {
    Standard(StandardEntry),
    Driver(DriverEntry),
}

impl CatalogEntity {
    pub fn details(&self) -> &EntryDetails {
        match self {
            CatalogEntity::Standard(entry) => &entry.details,
            CatalogEntity::Driver(entry) => &entry.details,
        }
    }

    pub fn update_id(&self) -> &str {
        &self.details().update_id
    }

    pub fn download_links(&self) -> &[String] {
        &self.details().download_links
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            CatalogEntity::Standard(entry) => entry.kind,
            CatalogEntity::Driver(_) => EntryKind::Driver,
        }
    }
}
