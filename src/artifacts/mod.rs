//! On-disk crawl artifacts
//!
//! Layout under the configured artifacts directory:
//!
//! ```text
//! crawls/<crawl_id>/page_0000.json     one per fetched page
//! crawls/<crawl_id>/summary.json
//! businesses/<business_id>/page_0000.json   one per page of the website crawl
//! businesses/<business_id>/summary.json
//! ```
//!
//! Page files are the durable evidence the resume supervisor counts. Every
//! file is written to a temporary name and renamed into place, so a crash
//! never leaves a half-written `page_*` file behind.

use crate::crawler::{CrawledPage, PageSink, SiteSummary};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PAGE_PREFIX: &str = "page_";
const SUMMARY_FILE: &str = "summary.json";

/// Errors from reading or writing artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File-system store for crawl and business artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one discovery crawl's artifacts
    pub fn crawl_dir(&self, crawl_id: &str) -> PathBuf {
        self.root.join("crawls").join(crawl_id)
    }

    /// Directory holding one business's website crawl artifacts
    pub fn business_dir(&self, business_id: i64) -> PathBuf {
        self.root.join("businesses").join(business_id.to_string())
    }

    pub fn page_path(&self, crawl_id: &str, index: usize) -> PathBuf {
        page_file(&self.crawl_dir(crawl_id), index)
    }

    pub fn business_page_path(&self, business_id: i64, index: usize) -> PathBuf {
        page_file(&self.business_dir(business_id), index)
    }

    /// Writes one page artifact for a discovery crawl
    pub fn write_page(
        &self,
        crawl_id: &str,
        index: usize,
        page: &CrawledPage,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.page_path(crawl_id, index);
        write_json(&path, page)?;
        Ok(path)
    }

    /// Counts the page artifacts present for a crawl
    ///
    /// A crawl with no directory has zero pages.
    pub fn count_pages(&self, crawl_id: &str) -> Result<u32, ArtifactError> {
        Ok(page_files(&self.crawl_dir(crawl_id))?.len() as u32)
    }

    /// Reads every page artifact of a crawl, in index order
    pub fn read_pages(&self, crawl_id: &str) -> Result<Vec<CrawledPage>, ArtifactError> {
        read_page_files(&self.crawl_dir(crawl_id))
    }

    /// Reads the page artifacts of a business's latest website crawl
    pub fn read_business_pages(&self, business_id: i64) -> Result<Vec<CrawledPage>, ArtifactError> {
        read_page_files(&self.business_dir(business_id))
    }

    /// Removes a business's page artifacts before its website is crawled again
    pub fn clear_business_pages(&self, business_id: i64) -> Result<(), ArtifactError> {
        for path in page_files(&self.business_dir(business_id))? {
            fs::remove_file(&path).map_err(io_error(&path))?;
        }
        Ok(())
    }

    pub fn write_crawl_summary(
        &self,
        crawl_id: &str,
        summary: &SiteSummary,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.crawl_dir(crawl_id).join(SUMMARY_FILE);
        write_json(&path, summary)?;
        Ok(path)
    }

    pub fn write_business_summary(
        &self,
        business_id: i64,
        summary: &SiteSummary,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.business_dir(business_id).join(SUMMARY_FILE);
        write_json(&path, summary)?;
        Ok(path)
    }

    pub fn read_business_summary(
        &self,
        business_id: i64,
    ) -> Result<Option<SiteSummary>, ArtifactError> {
        let path = self.business_dir(business_id).join(SUMMARY_FILE);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }
}

fn page_file(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}{:04}.json", PAGE_PREFIX, index))
}

/// Sorted list of `page_*.json` files in a directory
///
/// A missing directory has no pages.
fn page_files(dir: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir)(e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(io_error(dir))?.path();
        let is_page = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(PAGE_PREFIX) && n.ends_with(".json"))
            .unwrap_or(false);
        if is_page {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn read_page_files(dir: &Path) -> Result<Vec<CrawledPage>, ArtifactError> {
    page_files(dir)?.iter().map(|path| read_json(path)).collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let body = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let body = fs::read(path).map_err(io_error(path))?;
    serde_json::from_slice(&body).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Page sink that writes each page to disk as it arrives
///
/// Discovery crawl indices continue across seeds so one crawl's pages never
/// overwrite each other.
pub struct PageArtifactSink {
    dir: PathBuf,
    next_index: usize,
}

impl PageArtifactSink {
    /// Writes into `crawls/<crawl_id>/`, numbering from `first_index`
    pub fn for_crawl(store: &ArtifactStore, crawl_id: &str, first_index: usize) -> Self {
        Self {
            dir: store.crawl_dir(crawl_id),
            next_index: first_index,
        }
    }

    /// Writes into `businesses/<business_id>/`, numbering from zero
    pub fn for_business(store: &ArtifactStore, business_id: i64) -> Self {
        Self {
            dir: store.business_dir(business_id),
            next_index: 0,
        }
    }

    /// Number of pages written so far, including any before `first_index`
    pub fn written(&self) -> usize {
        self.next_index
    }
}

impl PageSink for PageArtifactSink {
    fn accept(&mut self, page: &CrawledPage) -> crate::Result<()> {
        write_json(&page_file(&self.dir, self.next_index), page)?;
        self.next_index += 1;
        Ok(())
    }
}
