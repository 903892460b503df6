//! Advisory lint of the theme's own scripts.
//!
//! Findings are reported per file and never fail the build. A linter that
//! can't run, for example because of a broken `.jshintrc`, fails the task
//! after the findings of every other file have been reported.

use std::process::Command;
use std::sync::LazyLock;

use camino::Utf8Path;
use rayon::prelude::*;
use regex::Regex;

use super::{PipelineError, settle};
use crate::error::LintError;
use crate::notice::Notification;
use crate::{Context, paths};

pub const TITLE: &str = "JSHint";

/// `file:line:column: reason`, as printed by the unix reporter.
static UNIX_REPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>.+):(?P<line>\d+):(?P<column>\d+): (?P<reason>.*)$")
        .expect("Error compiling the lint report pattern")
});

impl PipelineError for LintError {
    fn title(&self) -> &'static str {
        TITLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

pub trait Linter: Send + Sync {
    fn lint(&self, file: &Utf8Path) -> Result<Vec<Finding>, LintError>;
}

/// Runs the `jshint` binary with the project's `.jshintrc`.
#[derive(Debug, Clone)]
pub struct Jshint {
    binary: String,
}

impl Jshint {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Linter for Jshint {
    fn lint(&self, file: &Utf8Path) -> Result<Vec<Finding>, LintError> {
        let output = Command::new(&self.binary)
            .arg("--reporter=unix")
            .arg(file)
            .output()
            .map_err(|e| LintError::Spawn(self.binary.clone(), e))?;

        interpret(
            output.status.success(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        )
        .map_err(|msg| LintError::Report(file.to_owned(), msg))
    }
}

/// Findings from a linter run. jshint exits non-zero whenever it reports
/// something, so only a failed run without findings but with a message on
/// stderr counts as an error.
fn interpret(success: bool, stdout: &str, stderr: &str) -> Result<Vec<Finding>, String> {
    let findings = parse(stdout);
    match stderr.trim() {
        msg if !success && findings.is_empty() && !msg.is_empty() => Err(msg.to_string()),
        _ => Ok(findings),
    }
}

/// Parses the unix reporter format, skipping the summary lines.
pub fn parse(report: &str) -> Vec<Finding> {
    report
        .lines()
        .filter_map(|line| UNIX_REPORT.captures(line))
        .filter_map(|caps| {
            Some(Finding {
                line: caps["line"].parse().ok()?,
                column: caps["column"].parse().ok()?,
                reason: caps["reason"].to_string(),
            })
        })
        .collect()
}

/// Formats the findings of a single file into a notification body.
pub fn describe(file: &str, findings: &[Finding]) -> String {
    let mut text = format!("{file} ({} errors)", findings.len());
    for f in findings {
        text.push_str(&format!("\n({}:{}) {}", f.line, f.column, f.reason));
    }
    text
}

pub fn run(ctx: &Context) -> Result<(), LintError> {
    let files = paths::expand(ctx.root(), &[ctx.paths.custom_scripts()])?;
    let linter = &ctx.tools.linter;

    let results: Vec<_> = files
        .par_iter()
        .map(|file| (file, linter.lint(&ctx.path(file))))
        .collect();

    let mut errors = Vec::new();
    for (file, findings) in results {
        match findings {
            Ok(findings) if findings.is_empty() => {}
            Ok(findings) => {
                let name = file.file_name().unwrap_or(file.as_str());
                ctx.notify(Notification::warning(TITLE, describe(name, &findings)));
            }
            Err(e) => errors.push(e),
        }
    }

    settle(ctx, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildMode;
    use crate::notice::Level;
    use std::sync::Arc;

    use crate::pipeline::fixture::{NoDebugger, Project};

    #[test]
    fn test_parse_unix_report() {
        let report = "\
src/t/assets/javascript/custom/app.js:3:5: Missing semicolon.
src/t/assets/javascript/custom/app.js:10:1: 'foo' is not defined.

2 errors
";
        assert_eq!(
            parse(report),
            vec![
                Finding {
                    line: 3,
                    column: 5,
                    reason: "Missing semicolon.".into()
                },
                Finding {
                    line: 10,
                    column: 1,
                    reason: "'foo' is not defined.".into()
                },
            ]
        );
    }

    #[test]
    fn test_describe() {
        let findings = parse("app.js:3:5: Missing semicolon.\n");
        assert_eq!(
            describe("app.js", &findings),
            "app.js (1 errors)\n(3:5) Missing semicolon."
        );
    }

    #[test]
    fn test_findings_are_advisory() {
        let project = Project::new(BuildMode::Development, &[]);
        project.theme_file("assets/javascript/custom/app.js", "init();\ndebugger;\n");
        project.theme_file("assets/javascript/custom/clean.js", "init();\n");

        run(&project.ctx).unwrap();

        let notes = project.notes.take();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, Level::Warning);
        assert_eq!(notes[0].title, "JSHint");
        assert!(notes[0].message.starts_with("app.js (1 errors)\n(2:1)"));
    }

    #[test]
    fn test_interpret_exit_status() {
        let report = "app.js:1:9: Missing semicolon.\n\n1 error\n";
        assert_eq!(interpret(false, report, "").unwrap().len(), 1);
        assert!(interpret(true, "", "").unwrap().is_empty());
        assert!(interpret(false, "", "").unwrap().is_empty());
        assert_eq!(
            interpret(false, "", "ERROR: Can't parse config file: .jshintrc\n"),
            Err("ERROR: Can't parse config file: .jshintrc".to_string())
        );
    }

    /// Fails on files named `broken.js`, otherwise behaves like [`NoDebugger`].
    struct Unreadable;

    impl Linter for Unreadable {
        fn lint(&self, file: &Utf8Path) -> Result<Vec<Finding>, LintError> {
            match file.file_name() {
                Some("broken.js") => Err(LintError::Report(file.to_owned(), "bad config".into())),
                _ => NoDebugger.lint(file),
            }
        }
    }

    #[test]
    fn test_linter_failure_keeps_other_findings() {
        let mut project = Project::new(BuildMode::Development, &[]);
        project.ctx.tools.linter = Arc::new(Unreadable);
        project.theme_file("assets/javascript/custom/a.js", "debugger;\n");
        project.theme_file("assets/javascript/custom/broken.js", "init();\n");
        project.theme_file("assets/javascript/custom/c.js", "init();\ndebugger;\n");

        let err = run(&project.ctx).unwrap_err();
        assert!(matches!(err, LintError::Report(file, _) if file.ends_with("broken.js")));

        let notes = project.notes.take();
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|note| note.level == Level::Warning));
        assert!(notes[0].message.starts_with("a.js"));
        assert!(notes[1].message.starts_with("c.js"));
    }

    #[test]
    fn test_missing_linter() {
        let project = Project::new(BuildMode::Development, &[]);
        project.theme_file("assets/javascript/custom/app.js", "init();\n");

        let linter = Jshint::new("themesmith-missing-jshint");
        let file = project.root.join(project.ctx.paths.javascripts()).join("custom/app.js");
        assert!(matches!(linter.lint(&file), Err(LintError::Spawn(..))));
    }
}
