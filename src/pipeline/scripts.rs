//! Script bundle.
//!
//! Every script in the registry's order is transpiled to ES2015, the results
//! are concatenated into a single bundle and, in production, minified. The
//! concatenation preserves order and guards each file with `;` so a script
//! missing its trailing semicolon can't merge into the next one.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use parcel_sourcemap::{OriginalLocation, SourceMap};
use rayon::prelude::*;

use super::PipelineError;
use crate::error::ScriptError;
use crate::io::{as_overhead, write_artifact};
use crate::paths::{self, BUNDLE};
use crate::{Context, Reload};

/// Inserted between concatenated scripts.
pub const SEPARATOR: &str = "\n;\n";

impl PipelineError for ScriptError {
    fn title(&self) -> &'static str {
        match self {
            ScriptError::Minify(_) => "Uglify JS Error",
            _ => "Babel Error",
        }
    }
}

/// External JavaScript compiler.
pub trait ScriptTool: Send + Sync {
    /// Transpiles a single script down to ES2015.
    fn transpile(&self, file: &Utf8Path, code: &str) -> Result<String, ScriptError>;

    fn minify(&self, code: &str) -> Result<String, ScriptError>;
}

/// Runs the `esbuild` binary, passing code through stdin and stdout.
#[derive(Debug, Clone)]
pub struct Esbuild {
    binary: String,
}

impl Esbuild {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn exec(
        &self,
        args: &[String],
        input: &str,
        fail: impl FnOnce(String) -> ScriptError,
    ) -> Result<String, ScriptError> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScriptError::Spawn(self.binary.clone(), e))?;

        // esbuild reads all of stdin before writing anything
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(fail(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

impl ScriptTool for Esbuild {
    fn transpile(&self, file: &Utf8Path, code: &str) -> Result<String, ScriptError> {
        let args = [
            "--loader=js".to_string(),
            "--target=es2015".to_string(),
            "--log-level=error".to_string(),
            format!("--sourcefile={file}"),
        ];
        self.exec(&args, code, |msg| ScriptError::Transpile(file.to_owned(), msg))
    }

    fn minify(&self, code: &str) -> Result<String, ScriptError> {
        let args = ["--loader=js", "--minify", "--log-level=error"].map(String::from);
        self.exec(&args, code, ScriptError::Minify)
    }
}

/// A transpiled script, named relative to the project root.
#[derive(Debug, Clone)]
pub struct Source {
    pub path: Utf8PathBuf,
    /// Script as read from disk, embedded in the source map.
    pub original: String,
    /// Transpiled code, concatenated into the bundle.
    pub code: String,
}

#[derive(Debug)]
pub struct Bundle {
    pub code: String,
    pub map: Option<String>,
}

pub fn run(ctx: &Context) -> Result<(), ScriptError> {
    let s = Instant::now();
    let root = ctx.root();
    let files = paths::expand(root, &ctx.paths.javascript)?;

    if files.is_empty() {
        tracing::warn!("no scripts found, skipping {BUNDLE}");
        return Ok(());
    }

    let tool = &ctx.tools.scripts;
    let sources = files
        .par_iter()
        .map(|path| -> Result<Source, ScriptError> {
            let original = fs::read_to_string(root.join(path))?;
            let code = tool.transpile(path, &original)?;
            Ok(Source {
                path: path.clone(),
                original,
                code,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mode = ctx.config.mode;
    let bundle = concat(&sources, mode.source_maps())?;

    let code = match bundle.map {
        Some(map) => {
            write_artifact(&ctx.path(ctx.paths.bundle_map()), map)?;
            format!("{}\n//# sourceMappingURL={BUNDLE}.map\n", bundle.code)
        }
        None if mode.minify() => tool.minify(&bundle.code)?,
        None => bundle.code,
    };

    write_artifact(&ctx.path(ctx.paths.bundle()), code)?;
    tracing::info!(
        "bundled {} scripts into {} {}",
        sources.len(),
        ctx.paths.bundle(),
        as_overhead(s)
    );

    ctx.reload(Reload::Page);
    Ok(())
}

/// Concatenates scripts in the given order. With `map` set, every line of the
/// bundle is mapped back to a line of the script as it was read, clamped to
/// its last line when transpiling added lines.
pub fn concat(sources: &[Source], map: bool) -> Result<Bundle, ScriptError> {
    let mut code = String::new();
    let mut sm = map.then(|| SourceMap::new("/"));
    let mut line = 0;

    for (i, source) in sources.iter().enumerate() {
        if i > 0 {
            code.push_str(SEPARATOR);
            line += 2;
        }

        if let Some(sm) = sm.as_mut() {
            let index = sm.add_source(source.path.as_str());
            sm.set_source_content(index as usize, &source.original)
                .map_err(|e| ScriptError::SourceMap(format!("{e:?}")))?;

            let last = (source.original.lines().count() as u32).saturating_sub(1);
            for generated in 0..source.code.lines().count() as u32 {
                sm.add_mapping(
                    line + generated,
                    0,
                    Some(OriginalLocation {
                        original_line: generated.min(last),
                        original_column: 0,
                        source: index,
                        name: None,
                    }),
                );
            }
        }

        code.push_str(&source.code);
        line += source.code.matches('\n').count() as u32;
    }

    let map = match sm {
        Some(mut sm) => Some(
            sm.to_json(None)
                .map_err(|e| ScriptError::SourceMap(format!("{e:?}")))?,
        ),
        None => None,
    };

    Ok(Bundle { code, map })
}
