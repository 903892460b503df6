//! Asset pipelines run by the tasks.
//!
//! Every pipeline returns its own error type. Wrapped in [`guard`] the error
//! is reported as a notification and the task is recorded as failed. Failed
//! tasks still release their dependents, so a broken stylesheet never takes
//! down the rest of the build or the watcher.

pub mod clean;
pub mod copy;
pub mod lint;
pub mod package;
pub mod phpcs;
pub mod scripts;
pub mod styles;

use std::fmt::Display;

use crate::Context;
use crate::notice::Notification;

/// A pipeline error which knows the title it's reported under.
pub trait PipelineError: Display {
    fn title(&self) -> &'static str;
}

/// Wraps a pipeline into a task action which reports errors as
/// notifications before failing the task.
pub fn guard<F, E>(pipeline: F) -> impl Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static
where
    F: Fn(&Context) -> Result<(), E> + Send + Sync + 'static,
    E: PipelineError,
{
    move |ctx| {
        pipeline(ctx).map_err(|e| {
            ctx.notify(Notification::error(e.title(), e.to_string()));
            anyhow::anyhow!("{}", e.title())
        })
    }
}

/// Reports all but the last of several independent errors, the last one is
/// returned to fail the task.
pub(crate) fn settle<E: PipelineError>(ctx: &Context, mut errors: Vec<E>) -> Result<(), E> {
    let Some(last) = errors.pop() else {
        return Ok(());
    };
    for e in errors {
        ctx.notify(Notification::error(e.title(), e.to_string()));
    }
    Err(last)
}

#[cfg(test)]
pub(crate) mod fixture {
    //! A throwaway theme project on disk.

    use std::fs;
    use std::sync::Arc;

    use camino::{Utf8Path, Utf8PathBuf};

    use super::lint::{Finding, Linter};
    use super::scripts::ScriptTool;
    use crate::error::{LintError, ScriptError};
    use crate::notice::Recorder;
    use crate::paths::PathRegistry;
    use crate::theme::Theme;
    use crate::{BuildMode, Config, Context, Tools};

    pub(crate) const THEME: &str = "jointswp";

    /// Returns scripts unchanged, minifies by joining trimmed lines.
    pub(crate) struct Passthrough;

    impl ScriptTool for Passthrough {
        fn transpile(&self, file: &Utf8Path, code: &str) -> Result<String, ScriptError> {
            if code.contains("syntax error") {
                return Err(ScriptError::Transpile(file.to_owned(), "Unexpected token".into()));
            }
            Ok(code.to_string())
        }

        fn minify(&self, code: &str) -> Result<String, ScriptError> {
            Ok(code.lines().map(str::trim).collect())
        }
    }

    /// Reports every line containing `debugger`.
    pub(crate) struct NoDebugger;

    impl Linter for NoDebugger {
        fn lint(&self, file: &Utf8Path) -> Result<Vec<Finding>, LintError> {
            let code = fs::read_to_string(file)?;
            Ok(code
                .lines()
                .enumerate()
                .filter(|(_, line)| line.contains("debugger"))
                .map(|(i, line)| Finding {
                    line: i + 1,
                    column: line.find("debugger").unwrap_or(0) + 1,
                    reason: "Forgotten 'debugger' statement?".into(),
                })
                .collect())
        }
    }

    pub(crate) struct Project {
        _dir: tempfile::TempDir,
        pub root: Utf8PathBuf,
        pub ctx: Context,
        pub notes: Arc<Recorder>,
    }

    impl Project {
        pub(crate) fn new(mode: BuildMode, files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

            for (path, content) in files {
                write(&root, path, content);
            }
            fs::create_dir_all(root.join("src").join(THEME)).unwrap();

            let config = Config {
                root: root.clone(),
                mode,
                ..Config::default()
            };
            let tools = Tools {
                scripts: Arc::new(Passthrough),
                linter: Arc::new(NoDebugger),
            };
            let notes = Arc::new(Recorder::default());
            let paths = PathRegistry::new(&Theme::new(THEME));
            let ctx = Context::new(config, paths, tools, notes.clone());

            Self {
                _dir: dir,
                root,
                ctx,
                notes,
            }
        }

        /// Writes a file relative to the theme directory.
        pub(crate) fn theme_file(&self, path: &str, content: &str) {
            write(&self.root, &format!("src/{THEME}/{path}"), content);
        }

        pub(crate) fn read(&self, path: impl AsRef<Utf8Path>) -> String {
            fs::read_to_string(self.root.join(path)).unwrap()
        }
    }

    fn write(root: &Utf8Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}
