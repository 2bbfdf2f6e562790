//! Issue document format
//!
//! Each issue is a markdown file: a YAML frontmatter header between `---`
//! delimiters, then a free-text body. The header carries the fixed fields
//! in stable order with absent optionals omitted; the body is opaque except
//! for the section-append primitive below.

use thiserror::Error;

use crate::domain::{Issue, IssueFrontmatter};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Missing frontmatter (file must start with ---)")]
    MissingFrontmatter,

    #[error("Missing frontmatter end delimiter (---)")]
    UnterminatedFrontmatter,

    #[error("Failed to parse frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Renders an issue to its on-disk document form
pub fn render(issue: &Issue) -> Result<String, DocumentError> {
    let yaml = serde_yaml::to_string(&IssueFrontmatter::from(issue))?;

    let mut content = String::new();
    content.push_str("---\n");
    content.push_str(&yaml);
    content.push_str("---\n");
    content.push_str(&issue.body);

    if !content.ends_with('\n') {
        content.push('\n');
    }

    Ok(content)
}

/// Parses a document into its header and body.
///
/// The body is returned byte-for-byte as stored, minus the closing
/// delimiter line; re-rendering an unmodified issue must not churn it.
pub fn parse(content: &str) -> Result<(IssueFrontmatter, String), DocumentError> {
    let rest = content
        .strip_prefix("---\n")
        .ok_or(DocumentError::MissingFrontmatter)?;

    let (yaml, body) = match rest.find("\n---\n") {
        Some(end) => (&rest[..end + 1], &rest[end + 5..]),
        None => match rest.strip_suffix("\n---") {
            // header-only file with an empty body
            Some(yaml) => (yaml, ""),
            None => return Err(DocumentError::UnterminatedFrontmatter),
        },
    };

    let fm: IssueFrontmatter = serde_yaml::from_str(yaml)?;
    Ok((fm, body.to_string()))
}

/// Returns the byte offset where the body starts (just past the closing
/// delimiter line), without parsing the header.
///
/// Section-append re-writes the body region only, so even hand-edited
/// header formatting survives untouched.
pub fn body_offset(content: &str) -> Result<usize, DocumentError> {
    let rest = content
        .strip_prefix("---\n")
        .ok_or(DocumentError::MissingFrontmatter)?;

    match rest.find("\n---\n") {
        Some(end) => Ok(4 + end + 5),
        None if rest.ends_with("\n---") => Ok(content.len()),
        None => Err(DocumentError::UnterminatedFrontmatter),
    }
}

/// A markdown heading found in a body
struct Heading {
    /// Byte offset of the start of the heading line
    offset: usize,
    /// Number of leading `#` characters
    level: usize,
    /// Heading text, trimmed
    text: String,
}

fn headings(body: &str) -> Vec<Heading> {
    let mut found = Vec::new();
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        let hashes = trimmed.chars().take_while(|&c| c == '#').count();

        if (1..=6).contains(&hashes) {
            let after = &trimmed[hashes..];
            if after.is_empty() || after.starts_with(' ') {
                found.push(Heading {
                    offset,
                    level: hashes,
                    text: after.trim().to_string(),
                });
            }
        }

        offset += line.len();
    }

    found
}

/// Appends `content` to the named section of `body`.
///
/// The insertion point is just before the next heading at equal-or-higher
/// level (or end-of-text). Every byte outside the inserted region is
/// preserved exactly. If the heading is absent, a new level-2 section is
/// appended at the end.
pub fn append_to_section(body: &str, heading: &str, content: &str) -> String {
    let all = headings(body);
    let target = all.iter().position(|h| h.text == heading.trim());

    let Some(pos) = target else {
        // no such section yet
        let mut out = body.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("## {}\n\n{}", heading.trim(), content));
        if !out.ends_with('\n') {
            out.push('\n');
        }
        return out;
    };

    let level = all[pos].level;
    let boundary = all[pos + 1..]
        .iter()
        .find(|h| h.level <= level)
        .map(|h| h.offset)
        .unwrap_or(body.len());

    let mut out = String::with_capacity(body.len() + content.len() + 2);
    out.push_str(&body[..boundary]);

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(content);
    if !out.ends_with('\n') {
        out.push('\n');
    }

    out.push_str(&body[boundary..]);
    out
}
