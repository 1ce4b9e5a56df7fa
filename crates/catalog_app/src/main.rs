//! `catalog-harvest`: search the update catalog, extract entry details and download payloads.
mod config;
mod logging;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use catalog_core::{HarvestOptions, SortBy, SortDirection};
use catalog_engine::{
    ByteProgress, CatalogEntity, Downloader, Extractor, Harvester, ReqwestTransport, Transport,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use log::LevelFilter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use config::AppConfig;
use logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "catalog-harvest", version, about)]
struct Cli {
    /// RON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_enum)]
    log: Option<LogDestination>,
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Catalog root, e.g. a local mirror.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Log at debug level (twice for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the summary records a query yields.
    Search {
        #[command(flatten)]
        harvest: HarvestArgs,
        /// Only fetch the first (sorted) page.
        #[arg(long)]
        first_page: bool,
    },
    /// Harvest a query and extract the full entry of every record.
    Details {
        #[command(flatten)]
        harvest: HarvestArgs,
        /// Skip records whose extraction fails instead of aborting.
        #[arg(long)]
        lenient: bool,
    },
    /// Harvest a query, extract entries and download their files.
    Download {
        #[command(flatten)]
        harvest: HarvestArgs,
        /// Only download this update id.
        #[arg(long)]
        update_id: Option<String>,
        /// Output directory; defaults to the configured one.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct HarvestArgs {
    query: String,
    /// Column to sort on before paging.
    #[arg(long)]
    sort: Option<SortBy>,
    #[arg(long, value_enum, default_value_t = DirectionArg::Descending)]
    direction: DirectionArg,
    #[arg(long)]
    max_results: Option<usize>,
    /// Keep rows sharing size and title with an earlier row.
    #[arg(long)]
    keep_duplicates: bool,
    /// Attempts per phase; overrides the configured value.
    #[arg(long)]
    reload_attempts: Option<u8>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Ascending,
    Descending,
}

impl HarvestArgs {
    fn options(&self, config: &AppConfig) -> HarvestOptions {
        HarvestOptions {
            sort_by: self.sort,
            sort_direction: match self.direction {
                DirectionArg::Ascending => SortDirection::Ascending,
                DirectionArg::Descending => SortDirection::Descending,
            },
            ignore_duplicates: !self.keep_duplicates,
            max_results: self.max_results,
            reload_attempts: self.reload_attempts.unwrap_or(config.reload_attempts),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(log) = cli.log {
        config.log = log;
    }
    if let Some(log_file) = &cli.log_file {
        config.log_file = log_file.clone();
    }

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    logging::initialize(config.log, level, &config.log_file);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine_warn!("Interrupted; finishing the request in flight");
                cancel.cancel();
            }
        }
    });

    let result = run(cli.command, &config, cancel).await;
    if let Err(err) = &result {
        engine_error!("{err:#}");
    }
    result
}

async fn run(command: Command, config: &AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let settings = config.transport();
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new(&settings).context("building HTTP client")?);
    let harvester = Harvester::new(transport.clone()).with_cancellation(cancel.clone());
    let extractor =
        Extractor::new(transport, config.extract()).with_cancellation(cancel.clone());

    match command {
        Command::Search {
            harvest,
            first_page: true,
        } => {
            let page = harvester
                .first_page(&harvest.query, harvest.options(config))
                .await
                .with_context(|| format!("searching `{}`", harvest.query))?;
            let rows = page.map(|page| page.into_rows()).unwrap_or_default();
            print_json(&rows)
        }
        Command::Search { harvest, .. } => {
            let report = harvester
                .harvest(&harvest.query, harvest.options(config))
                .await
                .with_context(|| format!("harvesting `{}`", harvest.query))?;
            print_json(&report)
        }
        Command::Details { harvest, lenient } => {
            let entities = extract(&harvester, &extractor, &harvest, config, lenient, None).await?;
            print_json(&entities)
        }
        Command::Download {
            harvest,
            update_id,
            output,
        } => {
            let entities =
                extract(&harvester, &extractor, &harvest, config, false, update_id.as_deref())
                    .await?;
            if entities.is_empty() {
                bail!("nothing to download for `{}`", harvest.query);
            }
            let destination = output.unwrap_or_else(|| config.output_dir.clone());
            let downloader = Downloader::new(&settings)
                .context("building download client")?
                .with_cancellation(cancel);
            let sink = |progress: ByteProgress| {
                if let Some(total) = progress.total {
                    engine_debug!("{}: {} / {total} bytes", progress.file_name, progress.bytes);
                }
            };

            let mut written = Vec::new();
            for entity in &entities {
                let paths = downloader
                    .download(entity, &destination, &sink)
                    .await
                    .with_context(|| format!("downloading {}", entity.update_id()))?;
                written.extend(paths);
            }
            print_json(&written)
        }
    }
}

async fn extract(
    harvester: &Harvester,
    extractor: &Extractor,
    harvest: &HarvestArgs,
    config: &AppConfig,
    lenient: bool,
    only: Option<&str>,
) -> anyhow::Result<Vec<CatalogEntity>> {
    let report = harvester
        .harvest(&harvest.query, harvest.options(config))
        .await
        .with_context(|| format!("harvesting `{}`", harvest.query))?;
    let records: Vec<_> = report
        .records
        .into_iter()
        .filter(|record| only.is_none_or(|id| record.update_id == id))
        .collect();
    engine_info!("Extracting details for {} records", records.len());

    if lenient {
        return Ok(extractor.details_many_lenient(&records).await);
    }
    let mut entities = Vec::with_capacity(records.len());
    for (record, result) in records.iter().zip(extractor.details_many(&records).await) {
        let entity = result.with_context(|| format!("extracting {}", record.update_id))?;
        entities.push(entity);
    }
    Ok(entities)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("writing JSON output")?;
    writeln!(stdout)?;
    Ok(())
}
