//! Named tasks and the order between them.

use crate::engine::TaskGraph;
use crate::error::GraphError;
use crate::pipeline::{clean, copy, guard, lint, package, phpcs, scripts, styles};
use crate::Context;

pub const CLEAN_JAVASCRIPT: &str = "clean:javascript";
pub const CLEAN_CSS: &str = "clean:css";
pub const CLEAN: &str = "clean";
pub const COPY: &str = "copy";
pub const SASS: &str = "sass";
pub const JAVASCRIPT: &str = "javascript";
pub const LINT: &str = "lint";
pub const BUILD: &str = "build";
pub const PACKAGE: &str = "package";
pub const PHPCS: &str = "phpcs";
pub const PHPCBF: &str = "phpcbf";

/// Rerun when a stylesheet source changes.
pub const STYLE_CHAIN: &[&str] = &[CLEAN_CSS, SASS];

/// Rerun when one of the theme's own scripts changes.
pub const SCRIPT_CHAIN: &[&str] = &[CLEAN_JAVASCRIPT, JAVASCRIPT, LINT];

pub(crate) fn graph() -> Result<TaskGraph<Context>, GraphError> {
    let mut graph = TaskGraph::new();

    graph.add_task(CLEAN_JAVASCRIPT, &[], guard(clean::scripts))?;
    graph.add_task(CLEAN_CSS, &[], guard(clean::styles))?;
    graph.add_group(CLEAN, &[CLEAN_JAVASCRIPT, CLEAN_CSS])?;

    graph.add_task(COPY, &[CLEAN], guard(copy::run))?;

    graph.add_task(SASS, &[COPY], guard(styles::run))?;
    graph.add_task(JAVASCRIPT, &[COPY], guard(scripts::run))?;
    graph.add_task(LINT, &[COPY], guard(lint::run))?;
    graph.add_group(BUILD, &[SASS, JAVASCRIPT, LINT])?;

    graph.add_task(PACKAGE, &[BUILD], guard(package::run))?;

    graph.add_task(PHPCS, &[], guard(phpcs::sniff))?;
    graph.add_task(PHPCBF, &[], guard(phpcs::beautify))?;

    Ok(graph)
}
