use std::fmt;

pub struct FmtOption<'r, O>(pub Option<&'r O>);

impl<O> fmt::Display for FmtOption<'_, O>
where
    O: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(o) => o.fmt(f),
            None => f.write_str("-"),
        }
    }
}

pub trait AsFmtOption {
    type Fmt: fmt::Display;
    fn fmt_option(self) -> Self::Fmt;
}

impl<'e, O> AsFmtOption for &'e Option<O>
where
    O: fmt::Display,
{
    type Fmt = FmtOption<'e, O>;

    fn fmt_option(self) -> Self::Fmt {
        FmtOption(self.as_ref())
    }
}

/// Take at most `max_chars` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Like [`truncate_chars`], but marks the cut with `...` so log readers
/// can tell an excerpt from the full text.
pub fn excerpt(s: &str, max_chars: usize) -> String {
    let cut = truncate_chars(s, max_chars);
    if cut.len() < s.len() {
        format!("{cut}...")
    } else {
        cut.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_option_uses_dash_for_none() {
        let some: Option<String> = Some("1.2k".into());
        let none: Option<String> = None;
        assert_eq!(some.fmt_option().to_string(), "1.2k");
        assert_eq!(none.fmt_option().to_string(), "-");
    }

    #[test]
    fn truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("开源项目推荐", 4), "开源项目");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn excerpt_marks_cut() {
        assert_eq!(excerpt("gateway timeout", 7), "gateway...");
        assert_eq!(excerpt("ok", 7), "ok");
    }
}
