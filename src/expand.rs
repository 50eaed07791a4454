//! `$$` expansion.

use regex::{NoExpand, Regex};
use std::sync::LazyLock;

static PID_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$").expect("marker pattern is valid"));

/// Replace every `$$` in `line` with `pid`, scanning left to right.
///
/// Matches do not overlap, so `$$$$` yields the pid twice and `$$$` yields the
/// pid followed by a single `$`.
pub fn expand(line: &str, pid: u32) -> String {
    PID_MARKER
        .replace_all(line, NoExpand(&pid.to_string()))
        .into_owned()
}

/// Expand using the pid of the running shell.
pub fn expand_current(line: &str) -> String {
    expand(line, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_is_unchanged() {
        assert_eq!(expand("echo hello world", 1234), "echo hello world");
        assert_eq!(expand("cost is $5", 1234), "cost is $5");
        assert_eq!(expand("", 1234), "");
    }

    #[test]
    fn test_single_marker() {
        assert_eq!(expand("pid$$", 1234), "pid1234");
        assert_eq!(expand("$$", 7), "7");
    }

    #[test]
    fn test_adjacent_markers() {
        assert_eq!(expand("a$$$$b", 1234), "a12341234b");
        assert_eq!(expand("$$$", 1234), "1234$");
    }

    #[test]
    fn test_markers_in_several_words() {
        assert_eq!(
            expand("touch f$$ > log$$.txt", 42),
            "touch f42 > log42.txt"
        );
    }

    #[test]
    fn test_current_pid() {
        let expected = format!("x{}", std::process::id());
        assert_eq!(expand_current("x$$"), expected);
    }
}
