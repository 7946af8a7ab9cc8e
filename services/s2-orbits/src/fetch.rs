//! Downloads of ESA acquisition plans and Copernicus catalog indexes.
//!
//! Both sources are plain HTML pages; links are pulled out with a regex
//! rather than a full HTML parser.

use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use coverage::CoverageError;
use futures::StreamExt;
use regex::Regex;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::progress;

/// Host of the ESA mission pages; acquisition links are site-relative.
pub const ESA_BASE_URL: &str = "https://sentinel.esa.int";

/// Current and archived acquisition plan pages, relative to [`ESA_BASE_URL`].
pub const ACQUISITION_PAGES: [&str; 2] = [
    "/web/sentinel/missions/sentinel-2/acquisition-plans",
    "/web/sentinel/missions/sentinel-2/acquisition-plans/archive",
];

/// Archived S2B plans for 2017, not linked from the archive page.
pub const UNLISTED_ARCHIVE_URL: &str =
    "https://sentinel.esa.int/documents/247904/3216744/Sentinel-2B-Acquisition-Plans-2017.zip";

/// Roots of the Copernicus catalog directory listings.
pub const CATALOGUE_ROOTS: [&str; 2] = [
    "https://scihub.copernicus.eu/catalogueview/S2A",
    "https://scihub.copernicus.eu/catalogueview/S2B",
];

const ANCHOR_PATTERN: &str = r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#;
const TAG_PATTERN: &str = r"(?s)<[^>]*>";
const PARENT_DIRECTORY: &str = "Parent Directory";

/// An anchor of an HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    /// Visible text with nested tags stripped
    pub text: String,
}

/// Every anchor with an `href`, in document order.
pub fn parse_links(html: &str) -> Result<Vec<Link>> {
    let anchor = Regex::new(ANCHOR_PATTERN).context("invalid anchor pattern")?;
    let tag = Regex::new(TAG_PATTERN).context("invalid tag pattern")?;

    Ok(anchor
        .captures_iter(html)
        .map(|caps| Link {
            href: caps[1].trim().replace("&amp;", "&"),
            text: tag.replace_all(&caps[2], "").trim().to_string(),
        })
        .collect())
}

/// Absolute URLs of the `.kml` and `.zip` files linked from a plan page.
pub fn acquisition_links(html: &str, base_url: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for link in parse_links(html)? {
        if PlanKind::of(&link.href).is_none() {
            continue;
        }
        let url = resolve_url(base_url, &link.href);
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    Ok(urls)
}

/// Hrefs listed after the single "Parent Directory" link of a directory index.
pub fn listing_children(html: &str) -> Result<Vec<String>> {
    let links = parse_links(html)?;
    let parents: Vec<usize> = links
        .iter()
        .enumerate()
        .filter(|(_, link)| link.text == PARENT_DIRECTORY)
        .map(|(i, _)| i)
        .collect();

    match parents.as_slice() {
        [index] => Ok(links[index + 1..].iter().map(|l| l.href.clone()).collect()),
        [] => bail!("directory listing has no '{}' link", PARENT_DIRECTORY),
        _ => bail!("directory listing has {} '{}' links", parents.len(), PARENT_DIRECTORY),
    }
}

/// Resolve an href against the page it appeared on.
pub fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if href.starts_with('/') {
        return format!("{}{}", origin(base_url), href);
    }
    match base_url.rfind('/') {
        Some(i) if i + 1 > origin(base_url).len() => format!("{}{}", &base_url[..=i], href),
        _ => format!("{}/{}", base_url.trim_end_matches('/'), href),
    }
}

/// Scheme and host part of a URL.
fn origin(url: &str) -> &str {
    let start = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[start..].find('/') {
        Some(i) => &url[..start + i],
        None => url,
    }
}

/// Child URL in a directory listing; listings link children relative to the directory.
pub fn child_url(dir_url: &str, leaf: &str) -> String {
    format!("{}/{}", dir_url.trim_end_matches('/'), leaf)
}

/// Last path segment of a URL, without query or fragment.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() || name.contains(':') {
        return None;
    }
    Some(name.to_string())
}

/// Write every file member of a zip archive into `out_dir`, dropping member
/// directories. Returns the written paths in archive order.
pub fn extract_zip_flat(bytes: &[u8], out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("invalid zip archive")?;
    let mut written = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .with_context(|| format!("reading zip member {}", index))?;
        if member.is_dir() {
            continue;
        }

        let Some(name) = Path::new(member.name()).file_name().map(|n| n.to_os_string()) else {
            warn!(member = %member.name(), "Skipping zip member without a file name");
            continue;
        };

        let mut content = Vec::with_capacity(member.size() as usize);
        member
            .read_to_end(&mut content)
            .with_context(|| format!("extracting {}", member.name()))?;

        let path = out_dir.join(name);
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// What a plan link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanKind {
    Kml,
    Zip,
}

impl PlanKind {
    fn of(url: &str) -> Option<Self> {
        let name = file_name_from_url(url)?.to_ascii_lowercase();
        if name.ends_with(".kml") {
            Some(Self::Kml)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// HTTP client for the plan and catalog downloads.
///
/// Every listing request and file download first checks `cancel`, so an
/// interrupt stops the crawl between requests.
pub struct Fetcher {
    client: Client,
    show_progress: bool,
    cancel: Arc<AtomicBool>,
}

impl Fetcher {
    pub fn new(show_progress: bool, cancel: Arc<AtomicBool>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("s2-orbits/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            show_progress,
            cancel,
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(CoverageError::Cancelled.into());
        }
        Ok(())
    }

    /// Links of every current and archived plan, plus the unlisted 2017 archive.
    pub async fn acquisition_urls(&self) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        for page in ACQUISITION_PAGES {
            self.check_cancelled()?;
            let page_url = format!("{}{}", ESA_BASE_URL, page);
            let html = self.get_text(&page_url).await?;
            let links = acquisition_links(&html, &page_url)?;
            info!(page = %page_url, links = links.len(), "Found acquisition plan links");
            urls.extend(links);
        }

        if !urls.iter().any(|u| u == UNLISTED_ARCHIVE_URL) {
            urls.push(UNLISTED_ARCHIVE_URL.to_string());
        }
        Ok(urls)
    }

    /// Download every acquisition plan into `out_dir`, unpacking zips flat.
    pub async fn fetch_acquisitions(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("creating {}", out_dir.display()))?;

        let urls = self.acquisition_urls().await?;
        let pb = progress::bar(urls.len() as u64, "acquisition plans", self.show_progress);
        let mut written = Vec::new();

        for url in &urls {
            self.check_cancelled()?;
            match PlanKind::of(url) {
                Some(PlanKind::Kml) => {
                    let path = out_dir.join(required_file_name(url)?);
                    self.download_to(url, &path).await?;
                    written.push(path);
                }
                Some(PlanKind::Zip) => {
                    let bytes = self.get_bytes(url).await?;
                    let dir = out_dir.to_path_buf();
                    let members =
                        tokio::task::spawn_blocking(move || extract_zip_flat(&bytes, &dir))
                            .await
                            .context("zip extraction panicked")?
                            .with_context(|| format!("unpacking {}", url))?;
                    info!(url = %url, files = members.len(), "Unpacked plan archive");
                    written.extend(members);
                }
                None => bail!("URL must end in .kml or .zip: {}", url),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(written)
    }

    /// Every `.csv` leaf below a catalog root, depth first in listing order.
    pub async fn catalog_urls(&self, root: &str) -> Result<Vec<String>> {
        let mut csvs = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![root.to_string()];

        while let Some(dir) = pending.pop() {
            if !visited.insert(dir.trim_end_matches('/').to_string()) {
                continue;
            }

            self.check_cancelled()?;
            let html = self.get_text(&dir).await?;
            let children =
                listing_children(&html).with_context(|| format!("parsing listing {}", dir))?;
            debug!(dir = %dir, children = children.len(), "Listed catalog directory");

            let mut subdirs = Vec::new();
            for leaf in children {
                let url = child_url(&dir, &leaf);
                if leaf.to_ascii_lowercase().ends_with(".csv") {
                    csvs.push(url);
                } else {
                    subdirs.push(url);
                }
            }
            pending.extend(subdirs.into_iter().rev());
        }
        Ok(csvs)
    }

    /// Download the S2A and S2B catalog indexes into `out_dir`.
    pub async fn fetch_catalog(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .with_context(|| format!("creating {}", out_dir.display()))?;

        info!("Finding all catalog CSV urls, this may take a while");
        let mut urls = Vec::new();
        for root in CATALOGUE_ROOTS {
            let found = self.catalog_urls(root).await?;
            info!(root = %root, csvs = found.len(), "Crawled catalog listing");
            urls.extend(found);
        }

        let pb = progress::bar(urls.len() as u64, "catalog files", self.show_progress);
        let mut written = Vec::with_capacity(urls.len());
        for url in &urls {
            self.check_cancelled()?;
            let path = out_dir.join(required_file_name(url)?);
            self.download_to(url, &path).await?;
            written.push(path);
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(written)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} for {}", status, url);
        }
        Ok(response)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .with_context(|| format!("reading page {}", url))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .with_context(|| format!("reading body of {}", url))?;
        Ok(bytes.to_vec())
    }

    /// Stream a response body to `path` through a `.part` file.
    async fn download_to(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self.get(url).await?;
        let partial = path.with_extension(match path.extension() {
            Some(ext) => format!("{}.part", ext.to_string_lossy()),
            None => "part".to_string(),
        });

        let mut file = tokio::fs::File::create(&partial)
            .await
            .context("Failed to open output file")?;
        let mut stream = response.bytes_stream();
        let mut size = 0u64;

        while let Some(chunk) = stream.next().await {
            self.check_cancelled()?;
            let chunk = chunk.context("Error reading response chunk")?;
            file.write_all(&chunk)
                .await
                .context("Error writing to file")?;
            size += chunk.len() as u64;
        }
        file.flush().await.context("Error flushing file")?;
        drop(file);

        tokio::fs::rename(&partial, path)
            .await
            .with_context(|| format!("moving download into {}", path.display()))?;
        debug!(url = %url, path = %path.display(), size, "Downloaded");
        Ok(size)
    }
}

fn required_file_name(url: &str) -> Result<String> {
    file_name_from_url(url).with_context(|| format!("URL has no file name: {}", url))
}
