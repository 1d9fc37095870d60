//! Environment prerequisite checks.

use std::path::Path;

use crate::domain::{PrereqKind, Prerequisite};
use crate::error::{Error, Result};

/// Check that every prerequisite exists with the right kind.
///
/// Relative paths are resolved against `base_dir`. All missing entries are
/// reported together.
pub fn check_prerequisites(prereqs: &[Prerequisite], base_dir: &Path) -> Result<()> {
    let missing: Vec<Prerequisite> = prereqs
        .iter()
        .filter(|p| !is_satisfied(p, base_dir))
        .cloned()
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    for prereq in &missing {
        tracing::warn!(path = %prereq.path.display(), kind = %prereq.kind, "Missing prerequisite");
    }
    Err(Error::MissingPrerequisites(missing))
}

fn is_satisfied(prereq: &Prerequisite, base_dir: &Path) -> bool {
    let path = base_dir.join(&prereq.path);
    match prereq.kind {
        PrereqKind::Directory => path.is_dir(),
        PrereqKind::File => path.is_file(),
    }
}
