//! Escape-sequence stripping for terminal output.

use std::borrow::Cow;

use regex::Regex;
use std::sync::LazyLock;

/// Matches ANSI escape sequences: CSI sequences `\x1b[...X`, OSC sequences
/// `\x1b]...ST` and two-byte charset selections such as `\x1b(B`.
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[()][A-B0-2]")
        .expect("ANSI regex must compile")
});

/// Remove ANSI escape sequences from a single line.
///
/// Applied per line: an unterminated OSC sequence must not swallow the
/// newline that separates section lines.
///
/// Returns the input unchanged (borrowed) when it contains no escape byte,
/// which is the overwhelmingly common case for log files.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    if !line.contains('\x1b') {
        return Cow::Borrowed(line);
    }
    ANSI_RE.replace_all(line, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(strip_ansi("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn strips_csi_and_osc() {
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[0m"), "ok");
        assert_eq!(strip_ansi("\x1b]0;title\x07body"), "body");
        assert_eq!(strip_ansi("\x1b[?25lhidden"), "hidden");
    }
}
