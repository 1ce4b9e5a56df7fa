use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Serialize;

use crate::dom::{child_elements, element_by_id, element_text, last_child_text, node_text};
use crate::links::reference_urls;
use crate::PageError;

const ERROR_ID: &str = "errorPageDisplayedError";
const SUPERSEDED_BY_PREFIX: &str = "ScopedViewInline.aspx?updateid=";
const VERSION_DATE_FORMAT: &str = "%m/%d/%Y";

static ERROR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9A-Fa-f]{8}\b").expect("error code pattern is valid"));

/// Detail-page fields every entry carries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SharedFields {
    pub description: String,
    pub architectures: BTreeSet<String>,
    pub supported_languages: BTreeSet<String>,
    pub more_information: BTreeSet<String>,
    pub support_urls: BTreeSet<String>,
    pub restart_behavior: String,
    pub may_request_user_input: String,
    pub must_be_installed_exclusively: String,
    pub requires_network_connectivity: String,
    pub uninstall_notes: String,
    pub uninstall_steps: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StandardFields {
    pub security_bulletin: String,
    pub severity: String,
    pub kb_numbers: Vec<String>,
    pub supersedes: Vec<String>,
    pub superseded_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverFields {
    pub company: String,
    pub manufacturer: String,
    pub driver_class: String,
    pub driver_model: String,
    pub driver_provider: String,
    pub driver_version: String,
    pub version_date: NaiveDate,
    /// Upper-cased, first occurrence kept.
    pub hardware_ids: Vec<String>,
}

/// A parsed update details page.
///
/// Holds the DOM, which is not `Send`: build it, read what is needed and drop
/// it before the next await point.
pub struct DetailPage {
    doc: Html,
}

impl DetailPage {
    pub fn parse(markup: &str) -> Self {
        Self {
            doc: Html::parse_document(markup),
        }
    }

    /// Vendor error code embedded in place of the details, e.g. `8DDD0024`.
    ///
    /// Any page carrying the error container is an error page. Without a
    /// recognizable code the container's text stands in for it.
    pub fn error_code(&self) -> Option<String> {
        let div = element_by_id(&self.doc, ERROR_ID)?;
        let text = div.text().collect::<Vec<_>>().join(" ");
        let code = ERROR_CODE
            .find_iter(&text)
            .last()
            .map(|found| found.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| text.split_whitespace().collect::<Vec<_>>().join(" "));
        Some(code)
    }

    pub fn shared(&self) -> Result<SharedFields, PageError> {
        let more_info = self.required("moreInfoDiv")?;
        let support = self.required("suportUrlDiv")?;
        Ok(SharedFields {
            description: self.text("ScopedViewHandler_desc")?,
            architectures: comma_set(&self.last_child("archDiv")?),
            supported_languages: comma_set(&self.last_child("languagesDiv")?),
            more_information: reference_urls(&more_info.inner_html()).into_iter().collect(),
            support_urls: reference_urls(&support.inner_html()).into_iter().collect(),
            restart_behavior: self.text("ScopedViewHandler_rebootBehavior")?,
            may_request_user_input: self.text("ScopedViewHandler_userInput")?,
            must_be_installed_exclusively: self.text("ScopedViewHandler_installationImpact")?,
            requires_network_connectivity: self.text("ScopedViewHandler_connectivity")?,
            uninstall_notes: self.uninstall_notes()?,
            uninstall_steps: self.last_child("uninstallStepsDiv")?,
        })
    }

    pub fn standard(&self) -> Result<StandardFields, PageError> {
        let kb_numbers = self
            .last_child("kbDiv")?
            .split(',')
            .map(str::trim)
            .filter(|kb| !kb.is_empty())
            .map(str::to_string)
            .collect();

        let supersedes_info = self.required("supersedesInfo")?;
        let supersedes = if is_not_applicable(supersedes_info) {
            Vec::new()
        } else {
            child_elements(supersedes_info, "div")
                .map(element_text)
                .collect()
        };

        let superseded_by_info = self.required("supersededbyInfo")?;
        let superseded_by = if is_not_applicable(superseded_by_info) {
            Vec::new()
        } else {
            child_elements(superseded_by_info, "div")
                .filter_map(|div| {
                    let anchor = child_elements(div, "a").next()?;
                    let href = anchor.value().attr("href").unwrap_or_default();
                    Some(href.replace(SUPERSEDED_BY_PREFIX, ""))
                })
                .collect()
        };

        Ok(StandardFields {
            security_bulletin: self.last_child("securityBullitenDiv")?,
            severity: self.text("ScopedViewHandler_msrcSeverity")?,
            kb_numbers,
            supersedes,
            superseded_by,
        })
    }

    pub fn driver(&self) -> Result<DriverFields, PageError> {
        let date_text = self.text("ScopedViewHandler_versionDate")?;
        let version_date = NaiveDate::parse_from_str(&date_text, VERSION_DATE_FORMAT).map_err(
            |_| PageError::MalformedValue {
                field: "ScopedViewHandler_versionDate",
                value: date_text.clone(),
            },
        )?;
        Ok(DriverFields {
            company: self.text("ScopedViewHandler_company")?,
            manufacturer: self.text("ScopedViewHandler_manufacturer")?,
            driver_class: self.text("ScopedViewHandler_driverClass")?,
            driver_model: self.text("ScopedViewHandler_driverModel")?,
            driver_provider: self.text("ScopedViewHandler_driverProvider")?,
            driver_version: self.text("ScopedViewHandler_version")?,
            version_date,
            hardware_ids: self.hardware_ids(),
        })
    }

    /// Hardware ids; an absent container means none.
    pub fn hardware_ids(&self) -> Vec<String> {
        let Some(container) = element_by_id(&self.doc, "driverhwIDs") else {
            return Vec::new();
        };
        let mut ids: Vec<String> = Vec::new();
        for div in child_elements(container, "div") {
            let Some(first) = div.first_child() else {
                continue;
            };
            let id = node_text(first).trim().replace("\\r\\n", "").to_uppercase();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    fn required(&self, id: &'static str) -> Result<ElementRef<'_>, PageError> {
        element_by_id(&self.doc, id).ok_or(PageError::MissingField(id))
    }

    fn text(&self, id: &'static str) -> Result<String, PageError> {
        self.required(id).map(element_text)
    }

    fn last_child(&self, id: &'static str) -> Result<String, PageError> {
        last_child_text(self.required(id)?).ok_or(PageError::MissingField(id))
    }

    /// Two layouts exist: label plus note (three nodes), or a longer form
    /// where the note sits at child offset three.
    fn uninstall_notes(&self) -> Result<String, PageError> {
        const ID: &str = "uninstallNotesDiv";
        let div = self.required(ID)?;
        let children: Vec<_> = div.children().collect();
        let node = if children.len() == 3 {
            children.last()
        } else {
            children.get(3)
        };
        node.map(|node| node_text(*node).trim().to_string())
            .ok_or(PageError::MissingField(ID))
    }
}

fn comma_set(text: &str) -> BTreeSet<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_not_applicable(container: ElementRef<'_>) -> bool {
    container
        .first_child()
        .map(|node| node_text(node).trim().eq_ignore_ascii_case("n/a"))
        .unwrap_or(true)
}
