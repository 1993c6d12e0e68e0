//! Resolve category/tag display names into catalog identifiers.
//!
//! Classification is best-effort: a post goes live with whatever
//! identifiers could be resolved, falling back to existing catalog entries
//! when creation fails.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, warn};
use trendpost_util_error::FmtCompact as _;

use crate::LOG_TARGET;

/// Longest internal name the catalog accepts.
pub const ENTRY_NAME_MAX_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationKind {
    Category,
    Tag,
}

impl ClassificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassificationKind::Category => "category",
            ClassificationKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ClassificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Internal identifier, what posts reference.
    pub name: String,
    pub display_name: String,
    pub slug: String,
}

/// Remote list/create store of categories or tags.
#[async_trait::async_trait]
pub trait Catalog {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn list(&self, kind: ClassificationKind) -> Result<Vec<CatalogEntry>, Self::Error>;

    /// Create `entry`, returning the identifier the catalog assigned.
    async fn create(
        &self,
        kind: ClassificationKind,
        entry: &CatalogEntry,
    ) -> Result<String, Self::Error>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// Lowercase, runs of non-alphanumerics collapsed into `-`, trimmed.
///
/// Non-ASCII letters are kept, so CJK names have a meaningful slug.
pub fn normalize_slug(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    let mut pending_dash = false;

    for c in display_name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() {
        "default".to_owned()
    } else {
        out
    }
}

/// Internal name for a new entry.
///
/// ASCII slugs are used as-is. Anything with non-ASCII characters gets a
/// short hash of the display name appended (or used alone when no ASCII is
/// left), so distinct names do not collapse onto the same identifier.
pub fn entry_name(kind: ClassificationKind, display_name: &str, slug: &str) -> String {
    let mut ascii = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c.is_ascii_alphanumeric() {
            ascii.push(c.to_ascii_lowercase());
        } else if !ascii.is_empty() && !ascii.ends_with('-') {
            ascii.push('-');
        }
    }

    if slug.is_ascii() && !ascii.is_empty() {
        ascii.truncate(ENTRY_NAME_MAX_LEN);
        return ascii.trim_end_matches('-').to_owned();
    }

    let hash = blake3::hash(display_name.as_bytes());
    let hex = data_encoding::HEXLOWER.encode(&hash.as_bytes()[..4]);
    let stem = if ascii.trim_end_matches('-').is_empty() {
        kind.as_str().to_owned()
    } else {
        ascii.truncate(ENTRY_NAME_MAX_LEN - hex.len() - 1);
        ascii.trim_end_matches('-').to_owned()
    };

    format!("{stem}-{hex}")
}

/// Trim, drop blanks and exact duplicates, keep first-seen order.
pub fn dedup_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .iter()
        .map(|n| n.as_ref().trim())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_string()))
        .map(str::to_owned)
        .collect()
}

fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn find_match<'e>(
    entries: &'e [CatalogEntry],
    display_name: &str,
    slug: &str,
) -> Option<&'e CatalogEntry> {
    entries
        .iter()
        .find(|e| e.display_name == display_name)
        .or_else(|| {
            entries
                .iter()
                .find(|e| !e.slug.trim().is_empty() && normalize_slug(&e.slug) == slug)
        })
}

/// Resolve `names` of one `kind` to catalog identifiers, creating missing
/// entries.
///
/// Never fails: listing errors yield an empty snapshot and a failed
/// creation falls back to the first entry the catalog already has. Names
/// that end up on the same identifier are reported once.
pub async fn resolve<C, S>(catalog: &C, kind: ClassificationKind, names: &[S]) -> Vec<String>
where
    C: Catalog + ?Sized,
    S: AsRef<str>,
{
    let wanted = dedup_names(names);
    if wanted.is_empty() {
        return vec![];
    }

    let mut snapshot = match catalog.list(kind).await {
        Ok(entries) => entries,
        Err(err) => {
            warn!(target: LOG_TARGET, %kind, err = %err.fmt_compact(), "Could not list catalog, treating it as empty");
            vec![]
        }
    };

    let mut ids = Vec::with_capacity(wanted.len());
    for display_name in wanted {
        let slug = normalize_slug(&display_name);

        if let Some(entry) = find_match(&snapshot, &display_name, &slug) {
            debug!(target: LOG_TARGET, %kind, %display_name, id = %entry.name, "Matched existing entry");
            ids.push(entry.name.clone());
            continue;
        }

        let proposal = CatalogEntry {
            name: entry_name(kind, &display_name, &slug),
            display_name,
            slug,
        };

        match catalog.create(kind, &proposal).await {
            Ok(id) => {
                info!(target: LOG_TARGET, %kind, display_name = %proposal.display_name, %id, "Created catalog entry");
                ids.push(id.clone());
                snapshot.push(CatalogEntry { name: id, ..proposal });
            }
            Err(err) => {
                let fallback = snapshot.first().map(|e| e.name.clone());
                warn!(
                    target: LOG_TARGET,
                    %kind,
                    display_name = %proposal.display_name,
                    err = %err.fmt_compact(),
                    fallback = ?fallback,
                    "Could not create catalog entry"
                );
                ids.extend(fallback);
            }
        }
    }

    dedup_ids(ids)
}

pub async fn resolve_classification<C, S>(catalog: &C, categories: &[S], tags: &[S]) -> Classification
where
    C: Catalog + ?Sized,
    S: AsRef<str>,
{
    Classification {
        categories: resolve(catalog, ClassificationKind::Category, categories).await,
        tags: resolve(catalog, ClassificationKind::Tag, tags).await,
    }
}
