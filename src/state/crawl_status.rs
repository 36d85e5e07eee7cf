//! Lifecycle states of a discovery crawl
//!
//! This module defines the states a DiscoveryCrawl record moves through and the
//! transitions that are legal between them.
use std::fmt;

/// Represents the current state of a discovery crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlStatus {
    // ===== Active States =====
    /// Pages are being fetched from the seed URLs
    Crawling,

    /// The fetch phase finished; extraction has not started
    Crawled,

    /// Business extraction from the fetched pages is running
    Processing,

    // ===== Terminal States =====
    /// Extraction finished and counters were recorded
    Completed,

    /// The crawl was abandoned with an error
    Failed,
}

impl CrawlStatus {
    /// Returns true if this is a terminal state (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Checks whether the forward lifecycle allows moving from `self` to `next`
    ///
    /// | From | Legal successors |
    /// |------|------------------|
    /// | crawling | crawled, failed |
    /// | crawled | processing |
    /// | processing | completed, failed |
    /// | completed, failed | none |
    pub fn can_transition_to(&self, next: CrawlStatus) -> bool {
        matches!(
            (self, next),
            (Self::Crawling, Self::Crawled)
                | (Self::Crawling, Self::Failed)
                | (Self::Crawled, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }

    /// Checks whether crash recovery may roll `self` back to `target`
    ///
    /// Only an interrupted extraction run is rolled back (processing → crawled),
    /// so that extraction can be queued again from a clean starting point.
    pub fn can_recover_to(&self, target: CrawlStatus) -> bool {
        matches!((self, target), (Self::Processing, Self::Crawled))
    }

    /// Position along the lifecycle; both terminal states share the last slot
    fn progress(&self) -> u8 {
        match self {
            Self::Crawling => 0,
            Self::Crawled => 1,
            Self::Processing => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Classifies a requested transition against the status actually stored
    ///
    /// A record that already reached `next`, or moved past it, makes the
    /// request stale: a concurrent task got there first. Anything else that
    /// the lifecycle does not allow is invalid.
    pub fn check_transition(&self, next: CrawlStatus, recovery: bool) -> TransitionCheck {
        let allowed = if recovery {
            self.can_recover_to(next)
        } else {
            self.can_transition_to(next)
        };

        if allowed {
            TransitionCheck::Apply
        } else if *self == next
            || (self.is_terminal() && (next.is_terminal() || recovery))
            || (!self.is_terminal() && !recovery && self.progress() > next.progress())
        {
            TransitionCheck::Stale
        } else {
            TransitionCheck::Invalid
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Crawling => "crawling",
            Self::Crawled => "crawled",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "crawling" => Some(Self::Crawling),
            "crawled" => Some(Self::Crawled),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible crawl statuses
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Crawling,
            Self::Crawled,
            Self::Processing,
            Self::Completed,
            Self::Failed,
        ]
    }

    /// Returns the statuses that the resume supervisor must reconcile
    pub fn incomplete_states() -> [Self; 3] {
        [Self::Crawling, Self::Crawled, Self::Processing]
    }
}

/// Result of checking a requested lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// The transition is legal from the stored status
    Apply,
    /// The record is already at or past the requested status
    Stale,
    /// The lifecycle forbids the transition
    Invalid,
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
