#![forbid(unsafe_code)]
//! Asset pipeline for WordPress themes built on Foundation.
//!
//! A [`Project`] resolves the active theme, computes its paths and registers
//! a fixed task graph:
//!
//! ```text
//! clean:javascript ─┐
//!                   ├─ clean ── copy ─┬─ sass ───────┐
//! clean:css ────────┘                 ├─ javascript ─┼─ build ── package
//!                                     └─ lint ───────┘
//! ```
//!
//! Every arrow is a barrier: a task starts only once all of its
//! prerequisites have completed. A failing pipeline is reported through a
//! [`Notifier`] and marked failed in the [`Report`], its dependents still run.

mod engine;
mod error;
mod io;
#[cfg(feature = "live")]
mod live;
pub mod notice;
pub mod paths;
pub mod pipeline;
pub mod tasks;
pub mod theme;

use std::sync::mpsc::Sender;
use std::sync::{Arc, OnceLock};

use camino::{Utf8Path, Utf8PathBuf};

pub use crate::engine::{Action, Outcome, Report, TaskExecution, TaskGraph};
pub use crate::error::*;
use crate::notice::{ConsoleNotifier, Notification, Notifier};
use crate::paths::PathRegistry;
use crate::pipeline::lint::{Jshint, Linter};
use crate::pipeline::scripts::{Esbuild, ScriptTool};
use crate::theme::Theme;

/// Controls minification and source maps for every pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Readable output with source maps written next to each artifact.
    #[default]
    Development,
    /// Minified output, no source maps.
    Production,
}

impl BuildMode {
    pub fn minify(self) -> bool {
        matches!(self, BuildMode::Production)
    }

    pub fn source_maps(self) -> bool {
        matches!(self, BuildMode::Development)
    }
}

/// Immutable configuration of a single run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root, containing `package.json` and `src/<theme>/`.
    pub root: Utf8PathBuf,
    pub mode: BuildMode,
    /// Explicit theme name, required when `src/` holds several themes.
    pub theme: Option<String>,
    /// URL of the local development server running the WordPress site.
    pub proxy: String,
    /// Preferred port of the live reload websocket, any free port is used
    /// when it's taken.
    pub live_port: u16,
    /// Port of the HTTP server delivering the live reload client.
    pub http_port: u16,
    pub esbuild: String,
    pub jshint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
            mode: BuildMode::default(),
            theme: None,
            proxy: String::from("http://lucifer.local"),
            live_port: 1337,
            http_port: 3000,
            esbuild: String::from("esbuild"),
            jshint: String::from("jshint"),
        }
    }
}

/// External programs used by the script pipelines.
#[derive(Clone)]
pub struct Tools {
    pub scripts: Arc<dyn ScriptTool>,
    pub linter: Arc<dyn Linter>,
}

impl Tools {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scripts: Arc::new(Esbuild::new(&config.esbuild)),
            linter: Arc::new(Jshint::new(&config.jshint)),
        }
    }
}

/// Changed assets pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reload {
    /// Stylesheets which can be swapped without reloading the page.
    Css(Vec<Utf8PathBuf>),
    /// Anything else, the page has to be reloaded.
    Page,
}

/// Everything a task can see while running.
pub struct Context {
    pub config: Config,
    pub paths: PathRegistry,
    pub tools: Tools,
    notifier: Arc<dyn Notifier>,
    reload: OnceLock<Sender<Reload>>,
}

impl Context {
    pub fn new(config: Config, paths: PathRegistry, tools: Tools, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            paths,
            tools,
            notifier,
            reload: OnceLock::new(),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.config.root
    }

    /// Resolve a project relative path against the project root.
    pub fn path(&self, rel: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        self.config.root.join(rel)
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Push a change to connected browsers. Does nothing until a dev server
    /// is running.
    pub fn reload(&self, reload: Reload) {
        if let Some(sender) = self.reload.get() {
            // The dev server lives as long as the process.
            let _ = sender.send(reload);
        }
    }

    #[cfg(feature = "live")]
    pub(crate) fn attach_reload(&self, sender: Sender<Reload>) -> bool {
        self.reload.set(sender).is_ok()
    }
}

/// A theme project with its task graph.
pub struct Project {
    ctx: Context,
    graph: TaskGraph<Context>,
}

impl Project {
    /// Open the project described by `config`, reporting to the console.
    ///
    /// Fails when no single theme can be selected.
    pub fn open(config: Config) -> Result<Self, Error> {
        let tools = Tools::from_config(&config);
        Self::with(config, tools, Arc::new(ConsoleNotifier))
    }

    pub fn with(config: Config, tools: Tools, notifier: Arc<dyn Notifier>) -> Result<Self, Error> {
        let theme: Theme = theme::resolve(&config.root, config.theme.as_deref())?;
        tracing::info!(theme = %theme, mode = ?config.mode, "opened project");

        let paths = PathRegistry::new(&theme);
        let graph = tasks::graph()?;

        Ok(Self {
            ctx: Context::new(config, paths, tools, notifier),
            graph,
        })
    }

    /// Run a task after all of its prerequisites.
    pub fn run(&self, task: &str) -> Result<Report, Error> {
        Ok(self.graph.run(&self.ctx, &[task])?)
    }

    /// Run the given tasks in order, skipping their prerequisites.
    pub fn run_only(&self, tasks: &[&str]) -> Result<Report, Error> {
        Ok(self.graph.run_sequence(&self.ctx, tasks)?)
    }

    /// Build, start the dev server and rebuild on changes until the process
    /// is terminated.
    #[cfg(feature = "live")]
    pub fn watch(&self) -> Result<(), Error> {
        self.run(tasks::BUILD)?;

        let _server = live::DevServer::start(&self.ctx)?;
        live::watch(&self.ctx, &self.graph)?;

        Ok(())
    }
}
