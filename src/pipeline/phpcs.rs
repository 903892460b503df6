//! WordPress coding standards for the theme's PHP, checked by `phpcs` and
//! fixed by `phpcbf`, both installed by composer into `wpcs/`.

use std::process::Command;


use super::PipelineError;
use crate::Context;
use crate::error::PhpcsError;
use crate::notice::Notification;
use crate::paths;

pub const TITLE: &str = "PHP CodeSniffer";
pub const PHPCS: &str = "wpcs/vendor/bin/phpcs";
pub const PHPCBF: &str = "wpcs/vendor/bin/phpcbf";
pub const STANDARD: &str = "--standard=./ruleset.xml";

impl PipelineError for PhpcsError {
    fn title(&self) -> &'static str {
        TITLE
    }
}

/// Reports coding standard violations.
pub fn sniff(ctx: &Context) -> Result<(), PhpcsError> {
    sniffer(ctx, PHPCS, &[STANDARD, "-s"])
}

/// Fixes what can be fixed automatically. Warnings are left alone.
pub fn beautify(ctx: &Context) -> Result<(), PhpcsError> {
    sniffer(ctx, PHPCBF, &[STANDARD, "--warning-severity=0"])
}

fn sniffer(ctx: &Context, binary: &str, args: &[&str]) -> Result<(), PhpcsError> {
    let root = ctx.root();
    let files = paths::expand(root, &ctx.paths.phpcs)?;

    if files.is_empty() {
        tracing::info!("no PHP files to check");
        return Ok(());
    }

    let binary = root.join(binary);
    let output = Command::new(&binary)
        .current_dir(root)
        .args(args)
        .args(&files)
        .output()
        .map_err(|e| PhpcsError::Spawn(binary.clone(), e))?;

    let report = String::from_utf8_lossy(&output.stdout);
    for line in report.lines().filter(|line| !line.trim().is_empty()) {
        tracing::info!("{line}");
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("{} reported problems in {} files", binary, files.len()),
            stderr => stderr.to_string(),
        };
        ctx.notify(Notification::warning(TITLE, message));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildMode;
    use crate::pipeline::fixture::Project;

    #[test]
    fn test_missing_sniffer() {
        let project = Project::new(BuildMode::Development, &[("index.php", "<?php")]);
        assert!(matches!(sniff(&project.ctx), Err(PhpcsError::Spawn(..))));
        assert!(matches!(beautify(&project.ctx), Err(PhpcsError::Spawn(..))));
    }

    #[test]
    fn test_nothing_to_sniff() {
        let project = Project::new(BuildMode::Development, &[("wpcs/vendor/a.php", "<?php")]);
        sniff(&project.ctx).unwrap();
        assert!(project.notes.take().is_empty());
    }
}
