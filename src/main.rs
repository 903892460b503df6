use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use console::style;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use themesmith::{BuildMode, Config, Project, tasks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Task {
    /// Build, serve and rebuild on changes
    Default,
    Build,
    Clean,
    #[value(name = "clean:css")]
    CleanCss,
    #[value(name = "clean:javascript")]
    CleanJavascript,
    Copy,
    Sass,
    Javascript,
    Lint,
    /// Build and zip the theme into packaged/
    Package,
    /// Check PHP against the WordPress coding standards
    Phpcs,
    /// Fix PHP coding standard violations
    Phpcbf,
}

impl Task {
    fn name(self) -> &'static str {
        match self {
            Task::Default => "default",
            Task::Build => tasks::BUILD,
            Task::Clean => tasks::CLEAN,
            Task::CleanCss => tasks::CLEAN_CSS,
            Task::CleanJavascript => tasks::CLEAN_JAVASCRIPT,
            Task::Copy => tasks::COPY,
            Task::Sass => tasks::SASS,
            Task::Javascript => tasks::JAVASCRIPT,
            Task::Lint => tasks::LINT,
            Task::Package => tasks::PACKAGE,
            Task::Phpcs => tasks::PHPCS,
            Task::Phpcbf => tasks::PHPCBF,
        }
    }

    /// Whether the task runs after its prerequisites or on its own.
    fn with_prerequisites(self) -> bool {
        matches!(self, Task::Build | Task::Clean | Task::Package)
    }
}

#[derive(Parser)]
#[command(name = "themesmith", version)]
#[command(about = "Builds the assets of a Foundation based WordPress theme")]
#[command(long_about = "Builds the assets of a Foundation based WordPress theme.\n\n\
    Errors in a pipeline are reported and the remaining tasks still run. \
    The exit status is non-zero when any task failed.")]
struct Cli {
    /// Task to run
    #[arg(value_enum, default_value_t = Task::Default)]
    task: Task,

    /// Minify output and skip source maps
    #[arg(long)]
    production: bool,

    /// Project root containing package.json and src/
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    /// Theme to build, required when src/ holds more than one
    #[arg(long)]
    theme: Option<String>,

    /// Address of the local WordPress site
    #[arg(long, env = "THEMESMITH_PROXY", default_value = "http://lucifer.local")]
    proxy: String,

    /// Preferred port of the live reload websocket
    #[arg(long, default_value_t = 1337)]
    live_port: u16,

    /// Port of the live reload HTTP server
    #[arg(long, default_value_t = 3000)]
    http_port: u16,

    #[arg(long, env = "THEMESMITH_ESBUILD", default_value = "esbuild")]
    esbuild: String,

    #[arg(long, env = "THEMESMITH_JSHINT", default_value = "jshint")]
    jshint: String,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            root: self.root.clone(),
            mode: match self.production {
                true => BuildMode::Production,
                false => BuildMode::Development,
            },
            theme: self.theme.clone(),
            proxy: self.proxy.clone(),
            live_port: self.live_port,
            http_port: self.http_port,
            esbuild: self.esbuild.clone(),
            jshint: self.jshint.clone(),
        }
    }
}

fn init_logging() {
    let indicatif = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "themesmith=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif.get_stderr_writer()))
        .with(indicatif)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let project = Project::open(cli.config())?;

    let report = match cli.task {
        #[cfg(feature = "live")]
        Task::Default => {
            project.watch()?;
            return Ok(true);
        }
        #[cfg(not(feature = "live"))]
        Task::Default => project.run(tasks::BUILD)?,
        task if task.with_prerequisites() => project.run(task.name())?,
        task => project.run_only(&[task.name()])?,
    };

    Ok(report.is_success())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{} {e:#}", style("error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
