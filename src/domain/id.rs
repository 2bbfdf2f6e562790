//! Issue identifier schemes and slug derivation
//!
//! Two ID schemes coexist:
//! - Flat IDs: `t-{7-char-hash}` (e.g., `t-7f2b4c1`), used for generic
//!   standalone issues. The hash is derived from title + creation timestamp.
//! - Scoped IDs: `{p|m|t}{n}-{slug}` (e.g., `p1-user-auth`, `m2-backend`),
//!   used for plan/milestone/task hierarchy members. The counter `n` is
//!   scope-local and derived by scanning sibling directory entries at
//!   allocation time, never from process state.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Directory names that never count as issue entries when scanning a scope
pub const RESERVED_DIRS: &[&str] = &["done", "backlog", "archive", "artifacts", "ralph"];

/// Maximum slug length in characters
pub const SLUG_MAX_LEN: usize = 40;

/// Fallback slug for titles that reduce to nothing (e.g., all punctuation)
pub const FALLBACK_SLUG: &str = "untitled";

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid issue ID format: expected 't-{{7-char-hash}}' or '{{p|m|t}}{{n}}-{{slug}}', got '{0}'")]
    InvalidId(String),

    #[error("Invalid counter in ID: {0}")]
    InvalidCounter(String),
}

/// Hierarchy level of a scoped ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Plan,
    Milestone,
    Task,
}

impl Level {
    /// Returns the single-character ID prefix for this level
    pub fn prefix(&self) -> char {
        match self {
            Level::Plan => 'p',
            Level::Milestone => 'm',
            Level::Task => 't',
        }
    }

    /// Parses a level from its ID prefix character
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            'p' => Some(Level::Plan),
            'm' => Some(Level::Milestone),
            't' => Some(Level::Task),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Plan => "plan",
            Level::Milestone => "milestone",
            Level::Task => "task",
        };
        write!(f, "{}", name)
    }
}

/// Derives a slug from a title: lowercase, non-alphanumerics collapsed to
/// single hyphens, edge hyphens trimmed, capped at [`SLUG_MAX_LEN`] chars.
///
/// May return an empty string; callers fall back to [`FALLBACK_SLUG`].
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_hyphen = true; // suppress leading hyphen

    for c in title.chars() {
        if slug.len() >= SLUG_MAX_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }

    slug.trim_matches('-').to_string()
}

/// Generates a 7-character hash from title, timestamp, and retry attempt
fn generate_hash(title: &str, timestamp: DateTime<FixedOffset>, attempt: u32) -> String {
    let input = format!(
        "{}{}{}",
        title,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        attempt
    );
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// An issue identifier, flat or scoped
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IssueId {
    /// Flat ID for generic standalone issues: `t-{7-char-hash}`
    Flat { hash: String },

    /// Scoped ID for hierarchy members: `{p|m|t}{n}-{slug}`
    Scoped { level: Level, seq: u32, slug: String },
}

impl IssueId {
    /// Creates a new flat ID from title and timestamp.
    ///
    /// `attempt` salts the hash so collisions against the known-ID set can
    /// be retried deterministically.
    pub fn new_flat(title: &str, timestamp: DateTime<FixedOffset>, attempt: u32) -> Self {
        IssueId::Flat {
            hash: generate_hash(title, timestamp, attempt),
        }
    }

    /// Creates a scoped ID from level, counter, and title.
    ///
    /// A title that slugifies to nothing falls back to [`FALLBACK_SLUG`].
    pub fn new_scoped(level: Level, seq: u32, title: &str) -> Self {
        let slug = slugify(title);
        let slug = if slug.is_empty() {
            FALLBACK_SLUG.to_string()
        } else {
            slug
        };
        IssueId::Scoped { level, seq, slug }
    }

    /// Returns true if this is a flat (hash-suffixed) ID
    pub fn is_flat(&self) -> bool {
        matches!(self, IssueId::Flat { .. })
    }

    /// Returns true if this is a scoped (counter + slug) ID
    pub fn is_scoped(&self) -> bool {
        matches!(self, IssueId::Scoped { .. })
    }

    /// Returns the hierarchy level for scoped IDs
    pub fn level(&self) -> Option<Level> {
        match self {
            IssueId::Flat { .. } => None,
            IssueId::Scoped { level, .. } => Some(*level),
        }
    }

    /// Returns the scope-local counter for scoped IDs
    pub fn seq(&self) -> Option<u32> {
        match self {
            IssueId::Flat { .. } => None,
            IssueId::Scoped { seq, .. } => Some(*seq),
        }
    }

    /// Returns a copy with the counter bumped by one (collision handling)
    pub fn bump_seq(&self) -> Option<IssueId> {
        match self {
            IssueId::Flat { .. } => None,
            IssueId::Scoped { level, seq, slug } => Some(IssueId::Scoped {
                level: *level,
                seq: seq + 1,
                slug: slug.clone(),
            }),
        }
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueId::Flat { hash } => write!(f, "t-{}", hash),
            IssueId::Scoped { level, seq, slug } => {
                write!(f, "{}{}-{}", level.prefix(), seq, slug)
            }
        }
    }
}

impl FromStr for IssueId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        // Flat IDs have the dash immediately after the type prefix: t-{hex}
        if let Some(hash) = s.strip_prefix("t-") {
            if hash.len() == 7 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Ok(IssueId::Flat {
                    hash: hash.to_string(),
                });
            }
            return Err(IdError::InvalidId(s.to_string()));
        }

        // Scoped IDs: {p|m|t}{n}-{slug}
        let level = s
            .chars()
            .next()
            .and_then(Level::from_prefix)
            .ok_or_else(|| IdError::InvalidId(s.to_string()))?;

        let rest = &s[1..];
        let dash = rest
            .find('-')
            .ok_or_else(|| IdError::InvalidId(s.to_string()))?;

        let (counter, slug) = rest.split_at(dash);
        let slug = &slug[1..];

        if counter.is_empty() || slug.is_empty() {
            return Err(IdError::InvalidId(s.to_string()));
        }

        let seq: u32 = counter
            .parse()
            .map_err(|_| IdError::InvalidCounter(counter.to_string()))?;

        if !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(IdError::InvalidId(s.to_string()));
        }

        Ok(IssueId::Scoped {
            level,
            seq,
            slug: slug.to_string(),
        })
    }
}

impl TryFrom<String> for IssueId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IssueId> for String {
    fn from(id: IssueId) -> Self {
        id.to_string()
    }
}
