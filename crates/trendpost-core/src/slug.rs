//! Post identifiers: `github-trending-<date>-<name>`.
//!
//! The identifier is a pure function of the repository name and the
//! discovery date. Re-running a publish for the same item yields the same
//! identifier; two different items that normalize to the same name on the
//! same day collide, and no disambiguating suffix is added.

use time::macros::{offset, time};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::item::format_date;

pub const SLUG_PREFIX: &str = "github-trending";
pub const SLUG_CONNECTOR: char = '-';
/// Budget for the name segment before the overall cap is considered.
pub const SLUG_NAME_BUDGET: usize = 30;
/// Hard cap on the whole identifier.
pub const SLUG_MAX_LEN: usize = 60;

/// Timezone the blog publishes in.
pub const TARGET_OFFSET: UtcOffset = offset!(+8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSlug {
    pub slug: String,
    /// Reference date shifted into [`TARGET_OFFSET`].
    pub local_date: Date,
}

/// Calendar date of `date`'s UTC midnight as seen from [`TARGET_OFFSET`].
pub fn local_date(date: Date) -> Date {
    date.midnight()
        .assume_utc()
        .to_offset(TARGET_OFFSET)
        .date()
}

/// Scheduled publish moment: 08:00 local time on `local_date`.
pub fn publish_time(local_date: Date) -> OffsetDateTime {
    local_date.with_time(time!(08:00)).assume_offset(TARGET_OFFSET)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '/' | '\\' | '_' | '-')
}

/// Lowercase ASCII letters and digits, separator runs collapsed into a single
/// [`SLUG_CONNECTOR`], everything else dropped.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_connector = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_connector && !out.is_empty() {
                out.push(SLUG_CONNECTOR);
            }
            pending_connector = false;
            out.push(c.to_ascii_lowercase());
        } else if is_separator(c) {
            pending_connector = true;
        }
    }

    out
}

/// Cut an ASCII slug segment to `max` bytes without leaving a dangling
/// connector.
fn cut_segment(segment: &str, max: usize) -> &str {
    let cut = if segment.len() <= max {
        segment
    } else {
        &segment[..max]
    };
    cut.trim_end_matches(SLUG_CONNECTOR)
}

pub fn post_slug(name: &str, date: Date) -> PostSlug {
    let local_date = local_date(date);
    let fixed = format!("{SLUG_PREFIX}{SLUG_CONNECTOR}{}", format_date(local_date));

    let normalized = normalize_name(name);
    let mut name_segment = cut_segment(&normalized, SLUG_NAME_BUDGET);

    let with_name_len = fixed.len() + 1 + name_segment.len();
    if SLUG_MAX_LEN < with_name_len {
        let room = SLUG_MAX_LEN.saturating_sub(fixed.len() + 1);
        name_segment = cut_segment(name_segment, room);
    }

    let slug = if name_segment.is_empty() {
        fixed
    } else {
        format!("{fixed}{SLUG_CONNECTOR}{name_segment}")
    };

    PostSlug { slug, local_date }
}
