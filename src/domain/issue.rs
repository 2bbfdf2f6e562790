//! Issue domain model
//!
//! Issues are stored as markdown files with a YAML frontmatter header.
//! The ID is never written into the header; it is carried by the file or
//! directory name. `parent` is likewise derived from storage location.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::{IssueId, Level};

/// Timestamp rendering: microsecond precision with an explicit UTC offset,
/// e.g. `2026-08-31T14:03:12.123456+00:00`.
pub mod ts {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

    pub fn to_string(dt: &DateTime<FixedOffset>) -> String {
        dt.format(FORMAT).to_string()
    }

    pub fn parse(s: &str) -> chrono::ParseResult<DateTime<FixedOffset>> {
        DateTime::parse_from_str(s.trim(), FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(s.trim()))
    }

    pub fn serialize<S>(dt: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&to_string(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Same format, for optional timestamps
    pub mod opt {
        use super::*;

        pub fn serialize<S>(
            dt: &Option<DateTime<FixedOffset>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => serializer.serialize_some(&to_string(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(
            deserializer: D,
        ) -> Result<Option<DateTime<FixedOffset>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s: Option<String> = Option::deserialize(deserializer)?;
            match s {
                Some(s) => parse(&s).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

/// Returns the current time with a fixed UTC offset
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

/// Status of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not yet started
    #[default]
    Open,

    /// Actively being worked on
    Active,

    /// Finished; terminal, there is no reopen
    Closed,
}

impl Status {
    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Closed)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Status::Open)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Open => write!(f, "open"),
            Status::Active => write!(f, "active"),
            Status::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" | "todo" => Ok(Status::Open),
            "active" | "in_progress" | "in-progress" => Ok(Status::Active),
            "closed" | "done" | "complete" | "completed" => Ok(Status::Closed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Kind of an issue
///
/// Generic standalone issues are `Task` with a flat ID; plans, milestones,
/// and hierarchy tasks carry scoped IDs and form a strict three-level tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    #[default]
    Task,
    Plan,
    Milestone,
}

impl Kind {
    /// Returns the hierarchy level this kind occupies
    pub fn level(&self) -> Level {
        match self {
            Kind::Plan => Level::Plan,
            Kind::Milestone => Level::Milestone,
            Kind::Task => Level::Task,
        }
    }
}

impl std::str::FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task" => Ok(Kind::Task),
            "plan" => Ok(Kind::Plan),
            "milestone" => Ok(Kind::Milestone),
            _ => Err(format!("Unknown kind: {}", s)),
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Task => write!(f, "task"),
            Kind::Plan => write!(f, "plan"),
            Kind::Milestone => write!(f, "milestone"),
        }
    }
}

/// Lowest priority value (backlog); 0 is critical
pub const PRIORITY_MAX: u8 = 4;

/// Default priority for new issues
pub const PRIORITY_DEFAULT: u8 = 2;

/// An issue: the single entity type of the store
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Unique identifier, immutable after creation
    pub id: IssueId,

    /// Human-readable title, non-empty
    pub title: String,

    /// Current status
    pub status: Status,

    /// Priority, 0 (critical) to 4 (backlog)
    pub priority: u8,

    /// Kind tag
    pub kind: Kind,

    /// Optional assignee
    pub assignee: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<FixedOffset>,

    /// Closing timestamp, set when status becomes closed
    pub closed_at: Option<DateTime<FixedOffset>>,

    /// Optional reason recorded at close time
    pub close_reason: Option<String>,

    /// IDs that must reach `closed` before this issue is unblocked.
    ///
    /// The header key is `blocks` for historical reasons, but the list is
    /// consumed as "blocked-by": entries are this issue's blockers.
    pub blocks: Vec<IssueId>,

    /// Optional scope statement (plans only)
    pub scope: Option<String>,

    /// Optional acceptance criteria (plans only)
    pub acceptance: Option<String>,

    /// Owning issue, derived from storage location; never serialized
    pub parent: Option<IssueId>,

    /// Markdown body (everything after the frontmatter)
    pub body: String,
}

impl Issue {
    /// Creates a new open issue with defaults
    pub fn new(id: IssueId, kind: Kind, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: Status::Open,
            priority: PRIORITY_DEFAULT,
            kind,
            assignee: None,
            created_at: now(),
            closed_at: None,
            close_reason: None,
            blocks: Vec::new(),
            scope: None,
            acceptance: None,
            parent: None,
            body: String::new(),
        }
    }

    /// Transitions to active
    pub fn activate(&mut self) {
        if self.status == Status::Open {
            self.status = Status::Active;
        }
    }

    /// Transitions to closed, stamping `closed_at` and the reason.
    ///
    /// Idempotent: an already-closed issue keeps its original stamp.
    pub fn close(&mut self, reason: Option<String>) {
        if !self.status.is_closed() {
            self.status = Status::Closed;
            self.closed_at = Some(now());
            self.close_reason = reason;
        }
    }

    /// Adds a blocker if not already present; returns true if added
    pub fn add_blocker(&mut self, blocker: IssueId) -> bool {
        if self.blocks.contains(&blocker) {
            false
        } else {
            self.blocks.push(blocker);
            true
        }
    }

    /// Removes a blocker; returns true if it was present
    pub fn remove_blocker(&mut self, blocker: &IssueId) -> bool {
        let before = self.blocks.len();
        self.blocks.retain(|b| b != blocker);
        self.blocks.len() != before
    }

    /// Readiness: open, and every blocker is closed.
    ///
    /// Computed over the live status map on demand; never cached, since any
    /// blocker's status can change independently.
    pub fn is_ready(&self, statuses: &HashMap<IssueId, Status>) -> bool {
        self.status.is_open()
            && self.blocks.iter().all(|b| {
                statuses
                    .get(b)
                    .map(|s| s.is_closed())
                    .unwrap_or(false)
            })
    }

    /// Display-only blocked flag: any direct blocker is open or active.
    ///
    /// No transitive closure: a blocker that is itself blocked is simply
    /// not closed, which is enough here.
    pub fn is_blocked_display(&self, statuses: &HashMap<IssueId, Status>) -> bool {
        self.blocks.iter().any(|b| {
            matches!(
                statuses.get(b),
                Some(Status::Open) | Some(Status::Active)
            )
        })
    }

    /// Seeds the body with the named sections this kind carries
    pub fn seed_body(&mut self) {
        self.body = match self.kind {
            Kind::Plan => "## Scope\n\n## Progress\n\n## Decision Log\n".to_string(),
            Kind::Milestone | Kind::Task if self.id.is_scoped() => "## Progress\n".to_string(),
            _ => String::new(),
        };
    }

    /// A short one-line summary for listings
    pub fn summary_line(&self) -> String {
        format!("{}\t{}\tP{}\t{}", self.id, self.status, self.priority, self.title)
    }
}

/// The frontmatter header of an issue file.
///
/// Field order here is the stable on-disk key order. Absent optionals are
/// omitted entirely; no empty placeholders are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueFrontmatter {
    pub title: String,
    pub status: Status,
    pub priority: u8,
    pub kind: Kind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(with = "ts")]
    pub created_at: DateTime<FixedOffset>,

    #[serde(default, with = "ts::opt", skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<FixedOffset>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<IssueId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance: Option<String>,
}

impl From<&Issue> for IssueFrontmatter {
    fn from(issue: &Issue) -> Self {
        Self {
            title: issue.title.clone(),
            status: issue.status,
            priority: issue.priority,
            kind: issue.kind,
            assignee: issue.assignee.clone(),
            created_at: issue.created_at,
            closed_at: issue.closed_at,
            close_reason: issue.close_reason.clone(),
            blocks: issue.blocks.clone(),
            scope: issue.scope.clone(),
            acceptance: issue.acceptance.clone(),
        }
    }
}

impl IssueFrontmatter {
    /// Assembles a full issue from header plus the parts the header omits
    pub fn into_issue(self, id: IssueId, parent: Option<IssueId>, body: String) -> Issue {
        Issue {
            id,
            title: self.title,
            status: self.status,
            priority: self.priority,
            kind: self.kind,
            assignee: self.assignee,
            created_at: self.created_at,
            closed_at: self.closed_at,
            close_reason: self.close_reason,
            blocks: self.blocks,
            scope: self.scope,
            acceptance: self.acceptance,
            parent,
            body,
        }
    }
}

/// Renders a timestamp for display (seconds precision)
pub fn display_time(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
