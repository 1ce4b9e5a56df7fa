//! Catalog engine: transport, page decoding, harvest driver, extraction and downloads.
mod decode;
mod details;
mod dom;
mod engine;
mod entity;
mod error;
mod extract;
mod fetch;
mod filename;
mod links;
mod page;
mod persist;
mod types;

pub use decode::{decode_body, DecodeError, DecodedBody};
pub use details::{DetailPage, DriverFields, SharedFields, StandardFields};
pub use engine::Harvester;
pub use entity::{CatalogEntity, DriverEntry, EntryDetails, StandardEntry};
pub use error::{CatalogError, PageError};
pub use extract::{ExtractSettings, Extractor};
pub use fetch::{
    manifest_body, postback_form, search_uri, CatalogRequest, ProgressSink, ReqwestTransport,
    Transport, TransportSettings, DEFAULT_BASE_URL,
};
pub use filename::file_name_from_url;
pub use links::{download_links, reference_urls};
pub use page::{decode_search_page, parse_result_count};
pub use persist::{ensure_output_dir, DownloadError, Downloader, PersistError};
pub use types::{ByteProgress, FailureKind, FetchError, FetchMetadata, FetchOutput};
