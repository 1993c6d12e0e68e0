use std::{error, fmt};

/// Renders an error together with its whole `source()` chain on one line,
/// `outer: middle: inner`, which is what we want in structured log fields.
pub struct FmtCompactError<'e, E>(pub &'e E);

impl<'e, E> fmt::Display for FmtCompactError<'e, E>
where
    E: error::Error,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut error = Some(self.0 as &dyn error::Error);

        while let Some(err) = error {
            f.write_fmt(format_args!("{err}"))?;
            error = err.source();
            if error.is_some() {
                f.write_str(": ")?;
            }
        }

        Ok(())
    }
}

pub trait FmtCompact {
    type Report: fmt::Display;
    fn fmt_compact(self) -> Self::Report;
}

impl<'e, E> FmtCompact for &'e E
where
    E: error::Error,
{
    type Report = FmtCompactError<'e, E>;

    fn fmt_compact(self) -> Self::Report {
        FmtCompactError(self)
    }
}
