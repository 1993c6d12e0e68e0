//! JSON files the stages hand to each other.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! reader never sees a half-written record.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::LOG_TARGET;

#[derive(Debug, Snafu)]
pub enum HandoffError {
    #[snafu(display("Handoff file {} does not exist", path.display()))]
    Missing { path: PathBuf },
    #[snafu(display("Failed to read handoff file {}", path.display()))]
    Read { path: PathBuf, source: io::Error },
    #[snafu(display("Handoff file {} is malformed", path.display()))]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("Failed to encode handoff record"))]
    Encode { source: serde_json::Error },
    #[snafu(display("Failed to write handoff file {}", path.display()))]
    Write { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to remove handoff file {}", path.display()))]
    Remove { path: PathBuf, source: io::Error },
}

pub type HandoffResult<T> = std::result::Result<T, HandoffError>;

pub fn read_json<T>(path: &Path) -> HandoffResult<T>
where
    T: DeserializeOwned,
{
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return MissingSnafu { path }.fail();
        }
        Err(err) => return Err(err).context(ReadSnafu { path }),
    };

    serde_json::from_str(&content).context(MalformedSnafu { path })
}

pub fn write_json<T>(path: &Path, value: &T) -> HandoffResult<()>
where
    T: Serialize,
{
    let mut encoded = serde_json::to_string_pretty(value).context(EncodeSnafu)?;
    encoded.push('\n');

    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, encoded).context(WriteSnafu { path: &tmp_path })?;
    std::fs::rename(&tmp_path, path).context(WriteSnafu { path })?;

    debug!(target: LOG_TARGET, path = %path.display(), "Wrote handoff file");
    Ok(())
}

/// Remove a handoff file left over from an earlier run.
///
/// Returns whether there was anything to remove.
pub fn remove_stale(path: &Path) -> HandoffResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).context(RemoveSnafu { path }),
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
