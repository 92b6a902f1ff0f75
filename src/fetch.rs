use crate::catalog::{self, RemoteFile};
use crate::config::AnsConfig;
use crate::error::{EtlError, Result};
use crate::http;
use crate::paths::DataPaths;
use crate::period::Period;
use metrics::counter;
use reqwest::{Client, Url};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

/// How many of the most recent discovered periods get downloaded per run.
pub const RECENT_PERIODS: usize = 3;

fn part_path(destination: &Path) -> PathBuf {
    let mut os = destination.as_os_str().to_owned();
    os.push(".part");
    PathBuf::from(os)
}

/// Streams `url` into `destination + ".part"` and renames into place only
/// after the full body arrived. The final path therefore never holds a
/// partial download; a stale `.part` may remain after a failure and is
/// overwritten by a retrying caller.
pub async fn download_to(client: &Client, url: &Url, destination: &Path) -> Result<()> {
    let download_err = |e: reqwest::Error| EtlError::Download {
        url: url.to_string(),
        message: e.to_string(),
    };

    let mut response = client.get(url.clone()).send().await.map_err(download_err)?;
    if let Err(e) = response.error_for_status_ref() {
        return Err(download_err(e));
    }

    let part = part_path(destination);
    let mut file = tokio::fs::File::create(&part).await?;
    while let Some(chunk) = response.chunk().await.map_err(download_err)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&part, destination).await?;
    Ok(())
}

/// Downloads the registry report once; an existing local copy is reused.
pub async fn download_registry_if_missing(cfg: &AnsConfig, paths: &DataPaths) -> Result<PathBuf> {
    let destination = paths.registry_file(&cfg.registry_file_name);
    if destination.exists() {
        return Ok(destination);
    }

    fs::create_dir_all(paths.raw_dir())?;
    let url = format!("{}/{}", cfg.registry_base_url.trim_end_matches('/'), cfg.registry_file_name);
    let url = catalog::parse_url(&url)?;

    info!(url = %url, "downloading operator registry");
    let client = http::download_client(cfg)?;
    download_to(&client, &url, &destination).await?;
    Ok(destination)
}

/// Download stage: browse the catalog, group files by period, and fetch every
/// file of the 3 most recent periods into `raw/`. An empty catalog yields an
/// empty result, not an error.
#[instrument(skip(cfg, paths))]
pub async fn run_download(cfg: &AnsConfig, paths: &DataPaths) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(paths.raw_dir())?;

    let listing_client = http::listing_client(cfg)?;
    let download_client = http::download_client(cfg)?;

    let years = catalog::list_year_directories(&listing_client, &cfg.base_url).await?;
    if years.is_empty() {
        warn!("no year directories found in base listing");
        return Ok(Vec::new());
    }

    let mut by_period: BTreeMap<Period, Vec<RemoteFile>> = BTreeMap::new();
    for dir in &years {
        for file in catalog::list_files_for_year(&listing_client, dir).await? {
            by_period.entry(file.period).or_default().push(file);
        }
    }

    let selected: Vec<Period> = by_period.keys().rev().take(RECENT_PERIODS).copied().collect();
    info!(periods = ?selected.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
          "selected most recent periods");

    let mut downloaded = Vec::new();
    for period in &selected {
        for file in &by_period[period] {
            let destination = paths.raw_dir().join(&file.name);
            download_to(&download_client, &file.url, &destination).await?;
            counter!("ans_files_downloaded_total").increment(1);
            info!(file = %file.name, period = %period, "downloaded");
            println!("⬇️  {} ({})", file.name, period);
            downloaded.push(destination);
        }
    }

    Ok(downloaded)
}
