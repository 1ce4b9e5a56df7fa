use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info};
use futures_util::StreamExt;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::fetch::{client_builder, map_reqwest_error};
use crate::filename::file_name_from_url;
use crate::{
    ByteProgress, CatalogEntity, FailureKind, FetchError, ProgressSink, TransportSettings,
};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("update {update_id} has no download links")]
    NoLinks { update_id: String },
    #[error("download link `{0}` does not name a file")]
    InvalidLink(String),
    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("download was cancelled")]
    Cancelled,
}

impl From<io::Error> for DownloadError {
    fn from(err: io::Error) -> Self {
        DownloadError::Persist(PersistError::Io(err))
    }
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Streams an entity's download links to disk.
///
/// Each file is written to a temp file next to its target and renamed into
/// place once complete, so a failed or cancelled download leaves nothing behind.
pub struct Downloader {
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(settings: &TransportSettings) -> Result<Self, FetchError> {
        let client = client_builder(settings)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Downloads every link of `entity` into `destination`; returns the paths in link order.
    pub async fn download(
        &self,
        entity: &CatalogEntity,
        destination: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<PathBuf>, DownloadError> {
        let links = entity.download_links();
        if links.is_empty() {
            return Err(DownloadError::NoLinks {
                update_id: entity.update_id().to_string(),
            });
        }
        let names = links
            .iter()
            .map(|link| {
                file_name_from_url(link).ok_or_else(|| DownloadError::InvalidLink(link.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        ensure_output_dir(destination)?;

        let total = Some(entity.details().size_in_bytes).filter(|size| *size > 0);
        let mut progress = ByteProgress {
            link_index: 0,
            file_name: String::new(),
            bytes: 0,
            total,
        };
        let mut written = Vec::with_capacity(links.len());
        for (index, (link, name)) in links.iter().zip(names).enumerate() {
            progress.link_index = index;
            progress.file_name = name.clone();
            let target = destination.join(&name);
            engine_info!("Downloading {link} -> {}", target.display());
            self.download_one(link, &target, &mut progress, sink).await?;
            written.push(target);
        }
        Ok(written)
    }

    async fn download_one(
        &self,
        link: &str,
        target: &Path,
        progress: &mut ByteProgress,
        sink: &dyn ProgressSink,
    ) -> Result<(), DownloadError> {
        let dir = target.parent().unwrap_or(Path::new("."));
        let temp = NamedTempFile::new_in(dir).map_err(PersistError::Io)?;
        let mut file = tokio::fs::File::from_std(temp.reopen()?);

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get(link).send() => response.map_err(map_reqwest_error)?,
        };
        let status = response.status();
        if !status.is_success() {
            let err = FetchError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string());
            return Err(err.into());
        }

        sink.emit(progress.clone());
        let mut stream = response.bytes_stream();
        loop {
            if self.cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk).await?;
            progress.bytes += chunk.len() as u64;
            sink.emit(progress.clone());
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // Replace an existing file so repeated downloads converge.
        if target.exists() {
            fs::remove_file(target)?;
        }
        temp.persist(target).map_err(|e| PersistError::Io(e.error))?;
        engine_debug!("Wrote {} ({} bytes so far)", target.display(), progress.bytes);
        Ok(())
    }
}
