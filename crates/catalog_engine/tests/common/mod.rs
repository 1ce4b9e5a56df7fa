#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};

use catalog_core::SummaryRecord;
use catalog_engine::{
    ByteProgress, CatalogRequest, FailureKind, FetchError, FetchMetadata, FetchOutput,
    ProgressSink, Transport,
};
use chrono::NaiveDate;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// One row of a generated results table.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: String,
    pub title: String,
    pub classification: String,
    pub size_in_bytes: u64,
}

pub fn row(id: &str, title: &str, size_in_bytes: u64) -> Row {
    Row {
        id: id.to_string(),
        title: title.to_string(),
        classification: "Security Updates".to_string(),
        size_in_bytes,
    }
}

/// Results page in the vendor's layout. `tag` makes the session tokens unique.
pub fn search_markup(tag: &str, rows: &[Row], has_next: bool, total: u32) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        r#"<html><head><title>Microsoft Update Catalog</title></head><body>
<form method="post" action="./Search.aspx?q=kb5005565" id="aspnetForm">
<input type="hidden" name="__EVENTTARGET" id="__EVENTTARGET" value="" />
<input type="hidden" name="__EVENTARGUMENT" id="__EVENTARGUMENT" value="" />
<input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="vs-{tag}" />
<input type="hidden" name="__VIEWSTATEGENERATOR" id="__VIEWSTATEGENERATOR" value="BBBC20B8" />
<input type="hidden" name="__EVENTVALIDATION" id="__EVENTVALIDATION" value="ev-{tag}" />
<span id="ctl00_catalogBody_searchDuration">Updates: 1 - {shown} of {total} (page 1 of 2)</span>
<table id="ctl00_catalogBody_updateMatches" class="resultsBorder">
<tr id="headerRow"><td></td><td><a id="ctl00_catalogBody_updateMatches_ctl02_titleHeaderLink">Title</a></td><td>Products</td><td>Classification</td><td>Last Updated</td><td>Version</td><td>Size</td><td></td></tr>
"#,
        shown = rows.len()
    ));
    for r in rows {
        body.push_str(&format!(
            r#"<tr id="{id}_R1">
<td class="resultsIconWidth"><img src="icon.gif"></td>
<td class="resultsbottomBorder"><a id="{id}_link" href="javascript:void(0);">
    {title}
</a></td>
<td class="resultsbottomBorder">Windows 10, version 1903 and later</td>
<td class="resultsbottomBorder">{classification}</td>
<td class="resultsbottomBorder">9/14/2021</td>
<td class="resultsbottomBorder">n/a</td>
<td class="resultsbottomBorder"><span id="{id}_size">{kb} KB</span><span style="display: none;">{bytes}</span></td>
<td><input id="{id}" class="flatBlueButtonDownload" type="button" value="Download"></td>
</tr>
"#,
            id = r.id,
            title = r.title,
            classification = r.classification,
            kb = r.size_in_bytes / 1024,
            bytes = r.size_in_bytes,
        ));
    }
    body.push_str("</table>\n");
    if has_next {
        body.push_str(
            r#"<a id="ctl00_catalogBody_nextPageLinkText" href="javascript:__doPostBack('ctl00$catalogBody$nextPageLinkText','')">Next</a>"#,
        );
    }
    body.push_str("</form></body></html>");
    body
}

pub fn no_results_markup() -> String {
    r#"<html><body><form><span id="ctl00_catalogBody_noResultText">We did not find any results for "zzz".</span></form></body></html>"#
        .to_string()
}

/// What the vendor serves while it is overloaded: a page, but no table.
pub fn empty_table_markup() -> String {
    "<html><body><p>The website has encountered a problem.</p></body></html>".to_string()
}

pub fn record(id: &str, title: &str, classification: &str) -> SummaryRecord {
    SummaryRecord {
        update_id: id.to_string(),
        title: title.to_string(),
        classification: classification.to_string(),
        products: "Windows 10, Windows Server 2019".to_string(),
        last_updated: NaiveDate::from_ymd_opt(2021, 9, 14).unwrap(),
        version: "n/a".to_string(),
        size: "12 KB".to_string(),
        size_in_bytes: 12 * 1024,
    }
}

const SHARED_FIELDS: &str = r#"
<span id="ScopedViewHandler_titleText">Update</span>
<span id="ScopedViewHandler_desc">Install this update to resolve issues in Windows.</span>
<div id="archDiv"><span>Architecture:</span> AMD64, X86</div>
<div id="languagesDiv"><span>Supported languages:</span> English, German, all</div>
<div id="moreInfoDiv"><span>More information:</span><div><a href="https://support.microsoft.com/help/5005565">https://support.microsoft.com/help/5005565</a></div></div>
<div id="suportUrlDiv"><span>Support Url:</span><div><a href="https://support.microsoft.com/">https://support.microsoft.com/</a></div></div>
<span id="ScopedViewHandler_rebootBehavior">Can request restart</span>
<span id="ScopedViewHandler_userInput">No</span>
<span id="ScopedViewHandler_installationImpact">No</span>
<span id="ScopedViewHandler_connectivity">No</span>
<div id="uninstallNotesDiv"><span>Uninstall Notes:</span><br>This software update can be removed.</div>
<div id="uninstallStepsDiv"><span>Uninstall Steps:</span>n/a</div>
"#;

pub fn standard_detail_markup() -> String {
    format!(
        r#"<html><body>{SHARED_FIELDS}
<div id="securityBullitenDiv"><span>MSRC Number:</span> MS21-SEP</div>
<span id="ScopedViewHandler_msrcSeverity">Critical</span>
<div id="kbDiv"><span>KB article numbers:</span> 5005565</div>
<div id="supersedesInfo"><div>2021-08 Cumulative Update for Windows 10 (KB5005033)</div><div>2021-07 Cumulative Update for Windows 10 (KB5004237)</div></div>
<div id="supersededbyInfo"><div> <a href="ScopedViewInline.aspx?updateid=0f1e2d3c-0000-4000-8000-000000000001">2021-10 Cumulative Update</a></div></div>
</body></html>"#
    )
}

pub fn driver_detail_markup() -> String {
    format!(
        r#"<html><body>{SHARED_FIELDS}
<span id="ScopedViewHandler_company">Intel Corporation</span>
<span id="ScopedViewHandler_manufacturer">Intel</span>
<span id="ScopedViewHandler_driverClass">Net</span>
<span id="ScopedViewHandler_driverModel">Intel(R) Ethernet Connection I219-V</span>
<span id="ScopedViewHandler_driverProvider">Intel</span>
<span id="ScopedViewHandler_version">12.19.1.37</span>
<span id="ScopedViewHandler_versionDate">4/12/2021</span>
<div id="driverhwIDs"><div>pci\ven_8086&amp;dev_15bc</div><div>PCI\VEN_8086&amp;DEV_15BC</div><div>pci\ven_8086&amp;dev_15bd</div></div>
</body></html>"#
    )
}

/// Shared fields cut off mid-page, as served by a truncated response.
pub fn truncated_detail_markup() -> String {
    r#"<html><body><span id="ScopedViewHandler_desc">Install this update</span></body></html>"#
        .to_string()
}

pub fn vendor_error_markup(code: &str) -> String {
    format!(
        r#"<html><body><div id="errorPageDisplayedError"><span>Error number: </span>{code}]</div></body></html>"#
    )
}

pub fn manifest_markup(links: &[&str]) -> String {
    let mut body = String::from("<html><head><script>var downloadInformation = new Array();\n");
    for (index, link) in links.iter().enumerate() {
        body.push_str(&format!(
            "downloadInformation[0].files[{index}].url = '{link}';\n"
        ));
    }
    body.push_str("</script></head><body></body></html>");
    body
}

pub fn ok_output(body: String) -> FetchOutput {
    FetchOutput {
        metadata: FetchMetadata {
            final_url: "https://www.catalog.update.microsoft.com/".to_string(),
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            encoding_label: "UTF-8".to_string(),
            byte_len: body.len() as u64,
        },
        body,
    }
}

pub fn failure(kind: FailureKind) -> FetchError {
    FetchError {
        message: kind.to_string(),
        kind,
    }
}

pub type Reply = Result<String, FailureKind>;

/// Transport answering requests from a fixed script, in order.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CatalogRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CatalogRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &CatalogRequest) -> Result<FetchOutput, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted request {request:?}"));
        reply.map(ok_output).map_err(failure)
    }
}

/// Transport answering detail and manifest requests per update id.
#[derive(Default)]
pub struct RoutedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<CatalogRequest>>,
}

impl RoutedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn details(self, update_id: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.route(format!("details:{update_id}"), replies)
    }

    pub fn manifest(self, update_id: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.route(format!("manifest:{update_id}"), replies)
    }

    fn route(self, key: String, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .extend(replies);
        self
    }

    pub fn requests(&self) -> Vec<CatalogRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for RoutedTransport {
    async fn send(&self, request: &CatalogRequest) -> Result<FetchOutput, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let key = match request {
            CatalogRequest::Details { update_id } => format!("details:{update_id}"),
            CatalogRequest::DownloadManifest { update_id } => format!("manifest:{update_id}"),
            other => panic!("unexpected request {other:?}"),
        };
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("no reply left for {key}"));
        reply.map(ok_output).map_err(failure)
    }
}

#[derive(Default)]
pub struct TestSink {
    events: Mutex<Vec<ByteProgress>>,
}

impl TestSink {
    pub fn take(&self) -> Vec<ByteProgress> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, progress: ByteProgress) {
        self.events.lock().unwrap().push(progress);
    }
}
