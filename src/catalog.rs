use crate::error::{EtlError, Result};
use crate::period::{extract_period, Period};
use reqwest::{Client, Url};
use tracing::{debug, instrument};

/// A downloadable quarterly statement discovered in a year listing. Transient:
/// produced here, consumed immediately by the fetcher.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub url: Url,
    pub name: String,
    pub period: Period,
}

/// A year directory (`2023/`) found in the base listing.
#[derive(Debug, Clone)]
pub struct YearDirectory {
    pub url: Url,
    pub year: i32,
}

pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|_| EtlError::InvalidUrl(url.to_string()))
}

fn join_url(base: &Url, link: &str) -> Result<Url> {
    base.join(link).map_err(|_| EtlError::InvalidUrl(format!("{} + {}", base, link)))
}

/// Extracts `href="..."` targets with a permissive line scan, one per line.
/// The regulator's listing pages carry no markup guarantee, so this stays a
/// substring scan rather than a structural HTML parse.
pub fn extract_links(html: &str) -> Vec<String> {
    let mut links = Vec::new();
    for line in html.lines() {
        if !line.contains("href") {
            continue;
        }
        if let Some(pos) = line.find("href=\"") {
            let start = pos + 6;
            if let Some(len) = line[start..].find('"') {
                links.push(line[start..start + len].to_string());
            }
        }
    }
    links
}

/// A directory entry is a year directory when its name (minus the trailing
/// slash) is a 4-digit numeral.
pub fn is_year_directory(name: &str) -> bool {
    name.len() == 4 && name.chars().all(|c| c.is_ascii_digit())
}

async fn fetch_listing(client: &Client, url: &Url) -> Result<String> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Fetches the base listing and returns the year directories it links to.
#[instrument(skip(client))]
pub async fn list_year_directories(client: &Client, base_url: &str) -> Result<Vec<YearDirectory>> {
    let base = parse_url(base_url)?;
    let html = fetch_listing(client, &base).await?;

    let mut years = Vec::new();
    for link in extract_links(&html) {
        let Some(name) = link.strip_suffix('/') else { continue };
        if !is_year_directory(name) {
            continue;
        }
        let year: i32 = name.parse().map_err(|_| EtlError::InvalidUrl(link.clone()))?;
        years.push(YearDirectory { url: join_url(&base, &link)?, year });
    }
    debug!(count = years.len(), "year directories discovered");
    Ok(years)
}

/// Fetches one year's listing and returns its data files, each resolved to a
/// period (entries whose period cannot be inferred are dropped).
#[instrument(skip(client), fields(year = dir.year))]
pub async fn list_files_for_year(client: &Client, dir: &YearDirectory) -> Result<Vec<RemoteFile>> {
    let html = fetch_listing(client, &dir.url).await?;

    let mut files = Vec::new();
    for link in extract_links(&html) {
        if link.ends_with('/') {
            continue;
        }
        let Some(period) = extract_period(&link, dir.year) else { continue };
        files.push(RemoteFile { url: join_url(&dir.url, &link)?, name: link, period });
    }
    debug!(count = files.len(), "data files resolved");
    Ok(files)
}
