use std::time::Duration;

use catalog_core::Postback;
use engine_logging::{engine_debug, engine_trace};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use url::Url;

use crate::decode::decode_body;
use crate::{ByteProgress, FailureKind, FetchError, FetchMetadata, FetchOutput};

pub const DEFAULT_BASE_URL: &str = "https://www.catalog.update.microsoft.com";

const SEARCH_PAGE: &str = "Search.aspx";
const DETAILS_PAGE: &str = "ScopedViewInline.aspx";
const DOWNLOAD_DIALOG: &str = "DownloadDialog.aspx";
const MANIFEST_FIELD: &str = "updateIds";
const SEARCH_TEXT_FIELD: &str = "ctl00$searchTextBox";

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Whole-request limit for catalog pages. Downloads only use the connect timeout.
    pub request_timeout: Duration,
    pub max_page_bytes: u64,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_page_bytes: 16 * 1024 * 1024,
            user_agent: concat!("catalog-harvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// The four exchanges the catalog protocol consists of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRequest {
    Search { query: String },
    Postback(Postback),
    Details { update_id: String },
    DownloadManifest { update_id: String },
}

impl CatalogRequest {
    pub fn label(&self) -> &'static str {
        match self {
            CatalogRequest::Search { .. } => "search",
            CatalogRequest::Postback(_) => "postback",
            CatalogRequest::Details { .. } => "details",
            CatalogRequest::DownloadManifest { .. } => "download manifest",
        }
    }
}

/// Relative search URI for `query`; postbacks for that search go back to it.
pub fn search_uri(query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{SEARCH_PAGE}?q={encoded}")
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: ByteProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(ByteProgress) + Send + Sync,
{
    fn emit(&self, progress: ByteProgress) {
        self(progress)
    }
}

/// Sends one catalog request and returns the decoded body. Never retries.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &CatalogRequest) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    max_page_bytes: u64,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, FetchError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = client_builder(settings)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            max_page_bytes: settings.max_page_bytes,
        })
    }

    fn endpoint(&self, relative: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(relative)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    fn build_request(&self, request: &CatalogRequest) -> Result<reqwest::RequestBuilder, FetchError> {
        let builder = match request {
            CatalogRequest::Search { query } => self.client.get(self.endpoint(&search_uri(query))?),
            CatalogRequest::Postback(postback) => self
                .client
                .post(self.endpoint(&postback.tokens.query_echo_uri)?)
                .form(&postback_form(postback)),
            CatalogRequest::Details { update_id } => {
                let mut url = self.endpoint(DETAILS_PAGE)?;
                url.query_pairs_mut().append_pair("updateid", update_id);
                self.client.get(url)
            }
            CatalogRequest::DownloadManifest { update_id } => {
                let form = reqwest::multipart::Form::new()
                    .text(MANIFEST_FIELD, manifest_body(update_id)?);
                self.client
                    .post(self.endpoint(DOWNLOAD_DIALOG)?)
                    .multipart(form)
            }
        };
        Ok(builder)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &CatalogRequest) -> Result<FetchOutput, FetchError> {
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let final_url = response.url().to_string();
        let status = response.status();
        engine_debug!("{} {} -> {}", request.label(), final_url, status);
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_page_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_page_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_page_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_page_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_body(&bytes, content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        engine_trace!("decoded {} bytes as {}", bytes.len(), decoded.encoding_label);

        let metadata = FetchMetadata {
            final_url,
            status: status.as_u16(),
            content_type,
            encoding_label: decoded.encoding_label,
            byte_len: bytes.len() as u64,
        };
        Ok(FetchOutput {
            body: decoded.text,
            metadata,
        })
    }
}

/// Client settings shared by the page transport and the downloader.
pub(crate) fn client_builder(settings: &TransportSettings) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .user_agent(settings.user_agent.clone())
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

/// Form body of a postback: the replayed tokens plus the control being "clicked".
pub fn postback_form(postback: &Postback) -> Vec<(&'static str, String)> {
    let tokens = &postback.tokens;
    let mut form = vec![
        ("__EVENTTARGET", postback.target.control_name().to_string()),
        ("__EVENTARGUMENT", tokens.event_argument.clone()),
        ("__VIEWSTATE", tokens.view_state.clone()),
        ("__VIEWSTATEGENERATOR", tokens.view_state_generator.clone()),
        ("__EVENTVALIDATION", tokens.event_validation.clone()),
    ];
    if let Some(text) = &postback.search_text {
        form.push((SEARCH_TEXT_FIELD, text.clone()));
    }
    form
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ManifestEntry<'a> {
    size: u64,
    uid_info: &'a str,
    #[serde(rename = "UpdateID")]
    update_id: &'a str,
}

/// JSON array naming the single update whose download links are wanted.
pub fn manifest_body(update_id: &str) -> Result<String, FetchError> {
    let entry = ManifestEntry {
        size: 0,
        uid_info: update_id,
        update_id,
    };
    serde_json::to_string(&[entry])
        .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
}
