//! ANSI escape handling for tool output shown in the terminal UI

use regex::Regex;
use std::sync::LazyLock;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-Z\\-_]").expect("valid regex")
});

/// Remove escape sequences and carriage returns so raw tool output does not
/// corrupt the rendered log
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").replace('\r', "")
}
