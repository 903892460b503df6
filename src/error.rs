use camino::Utf8PathBuf;
#[cfg(feature = "live")]
use std::sync::mpsc::RecvError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Couldn't resolve the active theme.\n{0}")]
    Theme(#[from] ThemeError),

    #[error("Invalid task graph.\n{0}")]
    Graph(#[from] GraphError),

    #[cfg(feature = "live")]
    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("Couldn't list themes in '{0}': {1}")]
    Io(Utf8PathBuf, std::io::Error),

    #[error("No theme found in '{0}'")]
    NotFound(Utf8PathBuf),

    #[error("Found multiple themes in '{0}': {1}. Pick one with --theme.")]
    Ambiguous(Utf8PathBuf, String),

    #[error("Theme '{0}' doesn't exist in '{1}'")]
    Missing(String, Utf8PathBuf),

    #[error("Theme directory name isn't valid UTF-8: {0}")]
    NonUtf8(String),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task '{0}' is already registered")]
    Duplicate(&'static str),

    #[error("Task '{0}' depends on unknown task '{1}'")]
    UnknownDependency(&'static str, String),

    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Cycle detected at task '{0}'")]
    Cycle(&'static str),
}

/// Errors that can occur when expanding glob lists.
#[derive(Debug, Error)]
pub enum GlobError {
    #[error("Couldn't compile glob pattern.\n{0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Couldn't walk directory.\n{0}")]
    Walk(#[from] walkdir::Error),
}

/// Errors that can occur when compiling stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Sass(#[from] Box<grass::Error>),

    #[error("Invalid browser list: {0}")]
    Browsers(String),

    #[error("CSS transform error: {0}")]
    Css(String),

    #[error("Source map error: {0}")]
    SourceMap(String),
}

/// Errors that can occur when bundling scripts.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("Couldn't run '{0}': {1}")]
    Spawn(String, std::io::Error),

    #[error("{0}: {1}")]
    Transpile(Utf8PathBuf, String),

    #[error("{0}")]
    Minify(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Source map error: {0}")]
    SourceMap(String),
}

#[derive(Debug, Error)]
pub enum LintError {
    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't run '{0}': {1}")]
    Spawn(String, std::io::Error),

    #[error("Couldn't lint '{0}': {1}")]
    Report(Utf8PathBuf, String),
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("Couldn't copy '{0}': {1}")]
    Copy(Utf8PathBuf, std::io::Error),
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("Couldn't remove '{0}': {1}")]
    Remove(Utf8PathBuf, std::io::Error),
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Couldn't read the manifest '{0}': {1}")]
    ManifestRead(Utf8PathBuf, std::io::Error),

    #[error("Invalid manifest '{0}': {1}")]
    ManifestParse(Utf8PathBuf, serde_json::Error),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Error)]
pub enum PhpcsError {
    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error("Couldn't run '{0}': {1}")]
    Spawn(Utf8PathBuf, std::io::Error),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Recv(#[from] RecvError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Couldn't resolve watch path '{0}': {1}")]
    Resolve(String, anyhow::Error),

    #[error("Couldn't inject the live reload snippet into '{0}': {1}")]
    Snippet(Utf8PathBuf, std::io::Error),
}
