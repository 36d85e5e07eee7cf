use std::fmt;

/// Coarse pipeline status of a business
///
/// The forward chain is `pending → researching → researched → enriched → verified`.
/// `failed` absorbs a business whose stage exhausted its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusinessStatus {
    Pending,
    Researching,
    Researched,
    Enriched,
    Verified,
    Failed,
}

impl BusinessStatus {
    /// Position in the forward chain, None for the absorbing failed state
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Researching => Some(1),
            Self::Researched => Some(2),
            Self::Enriched => Some(3),
            Self::Verified => Some(4),
            Self::Failed => None,
        }
    }

    /// The status one step further along the chain
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Researching),
            Self::Researching => Some(Self::Researched),
            Self::Researched => Some(Self::Enriched),
            Self::Enriched => Some(Self::Verified),
            Self::Verified | Self::Failed => None,
        }
    }

    /// Returns the single forward step a stage targeting `target` may apply
    ///
    /// A business already at or beyond `target` stays where it is, and a failed
    /// business never moves.
    pub fn step_toward(&self, target: BusinessStatus) -> Option<Self> {
        match (self.rank(), target.rank()) {
            (Some(current), Some(goal)) if current < goal => self.next(),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Researching => "researching",
            Self::Researched => "researched",
            Self::Enriched => "enriched",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "researching" => Some(Self::Researching),
            "researched" => Some(Self::Researched),
            "enriched" => Some(Self::Enriched),
            "verified" => Some(Self::Verified),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Researching,
            Self::Researched,
            Self::Enriched,
            Self::Verified,
            Self::Failed,
        ]
    }
}

impl fmt::Display for BusinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
