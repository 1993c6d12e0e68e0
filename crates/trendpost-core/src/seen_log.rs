use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use time::Date;
use tracing::{debug, info, warn};

use crate::LOG_TARGET;
use crate::csv;
use crate::dedup::SeenStore;
use crate::item::{CandidateItem, format_date};

pub const SEEN_LOG_HEADER: [&str; 3] = ["name", "url", "processed_date"];

#[derive(Debug, Snafu)]
pub enum SeenLogError {
    #[snafu(display("Failed to read seen-log {}", path.display()))]
    Read { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to append to seen-log {}", path.display()))]
    Append { path: PathBuf, source: io::Error },
}

pub type SeenLogResult<T> = std::result::Result<T, SeenLogError>;

/// Append-only CSV record of every item the collector ever handed
/// downstream. It is the only dedup state; it is read whole on open.
#[derive(Debug)]
pub struct SeenLog {
    path: PathBuf,
    urls: BTreeSet<String>,
    /// File is missing or blank, the next append starts with the header.
    write_header: bool,
    /// Last line was cut short (e.g. crash mid-write), start a fresh one.
    needs_newline: bool,
}

impl SeenLog {
    /// Open the log at `path`; a missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>) -> SeenLogResult<Self> {
        let path = path.into();

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err).context(ReadSnafu { path }),
        };

        let rows = csv::parse_rows(&text);
        let (url_col, data) = match rows.first() {
            Some(first) if is_header(first) => {
                let url_col = first
                    .iter()
                    .position(|c| c.trim().eq_ignore_ascii_case(SEEN_LOG_HEADER[1]))
                    .unwrap_or(1);
                (url_col, &rows[1..])
            }
            // Headerless log, every row is data.
            _ => (1, &rows[..]),
        };

        let mut urls = BTreeSet::new();
        for (line, row) in data.iter().enumerate() {
            match row.get(url_col).map(|u| u.trim()) {
                Some(url) if !url.is_empty() => {
                    urls.insert(url.to_owned());
                }
                _ => {
                    warn!(target: LOG_TARGET, path = %path.display(), line, "Skipping seen-log row without url");
                }
            }
        }

        debug!(target: LOG_TARGET, path = %path.display(), seen = urls.len(), "Loaded seen-log");

        Ok(Self {
            needs_newline: !text.is_empty() && !text.ends_with('\n'),
            write_header: text.trim().is_empty(),
            path,
            urls,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Durably append one row.
    ///
    /// The row is flushed and fsynced before this returns; only then is the
    /// url added to the in-memory set.
    pub fn append(&mut self, name: &str, url: &str, processed_date: Date) -> SeenLogResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(AppendSnafu { path: &self.path })?;

        let mut buf = Vec::new();
        if self.needs_newline {
            buf.push(b'\n');
        }
        if self.write_header {
            csv::write_row(&mut buf, &SEEN_LOG_HEADER).context(AppendSnafu { path: &self.path })?;
        }
        let date = format_date(processed_date);
        csv::write_row(&mut buf, &[name, url, date.as_str()]).context(AppendSnafu { path: &self.path })?;

        file.write_all(&buf)
            .and_then(|()| file.sync_all())
            .context(AppendSnafu { path: &self.path })?;

        self.needs_newline = false;
        self.write_header = false;
        self.urls.insert(url.to_owned());

        info!(target: LOG_TARGET, %url, path = %self.path.display(), "Recorded item in seen-log");
        Ok(())
    }
}

fn is_header(row: &[String]) -> bool {
    row.first()
        .is_some_and(|c| c.trim().eq_ignore_ascii_case(SEEN_LOG_HEADER[0]))
}

impl SeenStore for SeenLog {
    type Error = SeenLogError;

    fn is_seen(&self, identity: &str) -> bool {
        self.contains(identity)
    }

    fn record(&mut self, item: &CandidateItem, processed_date: Date) -> SeenLogResult<()> {
        self.append(&item.name, item.identity(), processed_date)
    }
}
