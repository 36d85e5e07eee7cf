//! Pipeline stages and the stage-chaining decision
//!
//! Every business walks the same forward chain:
//! `discovery → website_crawl → web_search → enrich → translate`.
//! `next_action` is the single place that decides what follows a finished stage.

use crate::state::BusinessStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One pipeline step for a single business
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    WebsiteCrawl,
    WebSearch,
    Enrich,
    Translate,
}

impl Stage {
    /// The stage that follows this one, None at the end of the chain
    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::Discovery => Some(Self::WebsiteCrawl),
            Self::WebsiteCrawl => Some(Self::WebSearch),
            Self::WebSearch => Some(Self::Enrich),
            Self::Enrich => Some(Self::Translate),
            Self::Translate => None,
        }
    }

    /// The business status this stage works toward
    ///
    /// A finished stage moves the business at most one step toward it.
    /// Discovery creates businesses at `pending`; translation leaves status alone.
    pub fn target_status(&self) -> Option<BusinessStatus> {
        match self {
            Self::Discovery | Self::Translate => None,
            Self::WebsiteCrawl => Some(BusinessStatus::Researching),
            Self::WebSearch => Some(BusinessStatus::Researched),
            Self::Enrich => Some(BusinessStatus::Enriched),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::WebsiteCrawl => "website_crawl",
            Self::WebSearch => "web_search",
            Self::Enrich => "enrich",
            Self::Translate => "translate",
        }
    }

    pub fn all() -> [Stage; 5] {
        [
            Self::Discovery,
            Self::WebsiteCrawl,
            Self::WebSearch,
            Self::Enrich,
            Self::Translate,
        ]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage finished, when it did not error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage did its work
    Completed,
    /// The source answered permanently with nothing (404, non-HTML)
    Empty,
    /// The business has no website; the crawl was skipped
    NoWebsite,
    /// Discovery matched a business that already exists
    Duplicate,
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Empty => "empty",
            Self::NoWebsite => "no_website",
            Self::Duplicate => "duplicate",
        }
    }

    /// Whether this outcome lets the business status move forward
    pub fn advances_status(&self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestrator does after a stage finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Queue this stage for the same business
    Enqueue(Stage),
    /// The chain is finished for this business
    Done,
    /// Leave the business alone; another pipeline run owns it
    Stop,
}

/// Maps a finished stage and its outcome to the next step
///
/// | Outcome | Next |
/// |---------|------|
/// | duplicate | stop |
/// | completed, empty, no_website | following stage, or done after translate |
///
/// An inapplicable stage (`no_website`) is not a failure: the chain skips
/// straight to the stage after it.
pub fn next_action(stage: Stage, outcome: StageOutcome) -> NextAction {
    if outcome == StageOutcome::Duplicate {
        return NextAction::Stop;
    }

    match stage.next() {
        Some(next) => NextAction::Enqueue(next),
        None => NextAction::Done,
    }
}
