//! Removal of generated artifacts.

use camino::Utf8PathBuf;

use super::PipelineError;
use crate::Context;
use crate::error::CleanError;
use crate::io::remove_if_exists;

impl PipelineError for CleanError {
    fn title(&self) -> &'static str {
        "Clean Error"
    }
}

/// Removes the script bundle and its source map.
pub fn scripts(ctx: &Context) -> Result<(), CleanError> {
    remove(ctx, [ctx.paths.bundle(), ctx.paths.bundle_map()])
}

/// Removes the compiled stylesheet and its source map.
pub fn styles(ctx: &Context) -> Result<(), CleanError> {
    remove(ctx, [ctx.paths.stylesheet(), ctx.paths.stylesheet_map()])
}

fn remove(ctx: &Context, targets: [Utf8PathBuf; 2]) -> Result<(), CleanError> {
    for target in targets {
        let path = ctx.path(&target);
        if remove_if_exists(&path).map_err(|e| CleanError::Remove(path.clone(), e))? {
            tracing::debug!("removed {target}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildMode;
    use crate::pipeline::fixture::Project;

    #[test]
    fn test_clean_scripts_only() {
        let project = Project::new(BuildMode::Development, &[]);
        project.theme_file("assets/javascript/foundation.js", "");
        project.theme_file("assets/javascript/foundation.js.map", "");
        project.theme_file("assets/javascript/custom/app.js", "");
        project.theme_file("assets/stylesheets/foundation.css", "");

        scripts(&project.ctx).unwrap();

        let paths = &project.ctx.paths;
        assert!(!project.root.join(paths.bundle()).exists());
        assert!(!project.root.join(paths.bundle_map()).exists());
        assert!(project.root.join(paths.javascripts()).join("custom/app.js").exists());
        assert!(project.root.join(paths.stylesheet()).exists());
    }

    #[test]
    fn test_clean_is_idempotent() {
        let project = Project::new(BuildMode::Development, &[]);
        project.theme_file("assets/stylesheets/foundation.css", "");

        styles(&project.ctx).unwrap();
        styles(&project.ctx).unwrap();
        assert!(!project.root.join(project.ctx.paths.stylesheet()).exists());
    }
}
