//! Traceback parsing.
//!
//! Captured failure output is scanned for frame lines of the form
//! `File "<path>", line <n>, in <scope>`; everything else is ignored.

use regex::Regex;
use std::sync::LazyLock;

use crate::locate::ErrorLocation;

static FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "(.+?)", line (\d+),"#).unwrap());

/// Every frame in `output`, outermost first as printed.
pub fn parse_traceback(output: &str) -> Vec<ErrorLocation> {
    FRAME
        .captures_iter(output)
        .filter_map(|caps| {
            let line = caps[2].parse().ok()?;
            Some(ErrorLocation::new(&caps[1], line))
        })
        .collect()
}
