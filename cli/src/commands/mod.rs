//! CLI command implementations.

pub mod check;
pub mod config;
pub mod free;
pub mod profiles;
pub mod run;

/// Shorten `s` to at most `max` characters for table output.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
