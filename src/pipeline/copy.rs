//! Vendor assets copied into the theme.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;

use super::{PipelineError, settle};
use crate::error::CopyError;
use crate::paths::{self, VendorCopy};
use crate::Context;

impl PipelineError for CopyError {
    fn title(&self) -> &'static str {
        "Copy Error"
    }
}

/// Runs every copy job in parallel. A failing job is reported on its own and
/// doesn't affect the others.
pub fn run(ctx: &Context) -> Result<(), CopyError> {
    let jobs = ctx.paths.vendor_copies();
    let results: Vec<_> = jobs.par_iter().map(|job| (job, copy(ctx.root(), job))).collect();

    let mut errors = Vec::new();
    for (job, result) in results {
        match result {
            Ok(count) => tracing::debug!(job = job.name, "copied {count} files"),
            Err(e) => errors.push(e),
        }
    }

    settle(ctx, errors)
}

/// Copies the files matched by a single job, returning their count.
pub fn copy(root: &Utf8Path, job: &VendorCopy) -> Result<usize, CopyError> {
    let files = paths::expand(root, &[&job.source])?;
    let dest = root.join(&job.dest);

    for file in &files {
        let target = dest.join(destination(&job.base, file, job.flatten));

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| CopyError::Copy(file.clone(), e))?;
        }
        fs::copy(root.join(file), &target).map_err(|e| CopyError::Copy(file.clone(), e))?;
    }

    Ok(files.len())
}

/// Path of a copied file relative to the job's destination.
fn destination(base: &Utf8Path, file: &Utf8Path, flatten: bool) -> Utf8PathBuf {
    match (flatten, file.strip_prefix(base)) {
        (false, Ok(rel)) => rel.to_path_buf(),
        _ => Utf8PathBuf::from(file.file_name().unwrap_or(file.as_str())),
    }
}
