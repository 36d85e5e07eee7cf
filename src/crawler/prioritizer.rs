//! Link prioritization and deduplication for a single site crawl
//!
//! Candidate links are qualified against the target host, deduplicated by
//! their normalized key, scored with the priority table and ordered
//! best-first. Ties keep discovery order. The visited set is borrowed so one
//! set can span every target of a multi-seed crawl.

use crate::config::PriorityTable;
use crate::url::{dedup_key_for, qualify_link};
use std::collections::HashSet;
use url::{Position, Url};

/// A qualified link with its priority score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLink {
    pub url: Url,
    pub score: u32,
}

/// Dedup keys of every URL visited or queued during one crawl
#[derive(Debug, Clone, Default)]
pub struct VisitedUrls {
    keys: HashSet<String>,
}

impl VisitedUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a URL
    ///
    /// Returns false if an equivalent URL was already recorded, or if the URL
    /// has no dedup key.
    pub fn insert(&mut self, url: &Url) -> bool {
        match dedup_key_for(url) {
            Ok(key) => self.keys.insert(key),
            Err(_) => false,
        }
    }

    pub fn contains(&self, url: &Url) -> bool {
        dedup_key_for(url)
            .map(|key| self.keys.contains(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Frontier builder for one target site
pub struct Prioritizer<'a> {
    target: Url,
    table: &'a PriorityTable,
    visited: &'a mut VisitedUrls,
}

impl<'a> Prioritizer<'a> {
    /// Creates a prioritizer for links on the target's host
    pub fn new(target: Url, table: &'a PriorityTable, visited: &'a mut VisitedUrls) -> Self {
        Self {
            target,
            table,
            visited,
        }
    }

    /// Records a URL as visited
    ///
    /// Returns false if an equivalent URL was already seen.
    pub fn mark_seen(&mut self, url: &Url) -> bool {
        self.visited.insert(url)
    }

    /// Turns raw links into the ordered, capped frontier
    ///
    /// # Steps
    ///
    /// 1. Parse and qualify each link (scheme, host, assets, non-content paths)
    /// 2. Drop links whose dedup key is already seen, and mark the rest seen
    /// 3. Score against the priority table
    /// 4. Stable sort by score descending and keep at most `limit`
    pub fn prioritize(&mut self, links: &[String], limit: usize) -> Vec<ScoredLink> {
        let mut candidates = Vec::new();

        for link in links {
            let url = match Url::parse(link) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping unparseable link {}: {}", link, e);
                    continue;
                }
            };

            if let Err(reason) = qualify_link(&url, &self.target) {
                tracing::debug!("Skipping link {}: {:?}", link, reason);
                continue;
            }

            if !self.mark_seen(&url) {
                continue;
            }

            // Path and query only; the host is shared by every candidate
            let score = self.table.score(&url[Position::BeforePath..]);
            candidates.push(ScoredLink { url, score });
        }

        // sort_by is stable
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates.truncate(limit);
        candidates
    }
}
