//! File paths to the theme's assets.
//!
//! All globs are relative to the project root and rooted in the active theme.
//! Patterns starting with `!` exclude whatever they match.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::GlobError;
use crate::theme::{SOURCE_DIR, Theme};

pub const STYLESHEET: &str = "foundation.css";
pub const BUNDLE: &str = "foundation.js";

/// Options matching the conventions of shell globs: `*` stays within one path
/// segment and dotfiles are only matched by patterns naming them.
pub(crate) const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Foundation components concatenated into the bundle, in load order.
const FOUNDATION_COMPONENTS: [&str; 19] = [
    "abide",
    "accordion",
    "accordionMenu",
    "drilldown",
    "dropdown",
    "dropdownMenu",
    "equalizer",
    "interchange",
    "magellan",
    "offcanvas",
    "orbit",
    "responsiveMenu",
    "responsiveToggle",
    "reveal",
    "slider",
    "sticky",
    "tabs",
    "toggler",
    "tooltip",
];

/// A vendor asset tree copied into the theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorCopy {
    pub name: &'static str,
    /// Static part of the source glob, used as base for non-flat copies.
    pub base: Utf8PathBuf,
    /// Source glob, relative to the project root.
    pub source: String,
    pub dest: Utf8PathBuf,
    /// Discard the directory structure below `base`.
    pub flatten: bool,
}

/// Globs and paths for a single theme. Computed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRegistry {
    theme: Theme,
    /// Include paths for the SCSS compiler.
    pub sass: Vec<String>,
    /// Scripts concatenated into the bundle; order is significant.
    pub javascript: Vec<String>,
    /// PHP sources checked by the code sniffer.
    pub phpcs: Vec<String>,
    /// Files shipped in the packaged archive.
    pub package: Vec<String>,
}

impl PathRegistry {
    pub fn new(theme: &Theme) -> Self {
        let base = format!("{SOURCE_DIR}/{theme}");
        let components = format!("{base}/assets/components");

        let sass = vec![
            format!("{components}/foundation-sites/scss"),
            format!("{components}/motion-ui/src"),
            format!("{components}/fontawesome/scss"),
        ];

        let mut javascript = vec![
            format!("{components}/what-input/what-input.js"),
            format!("{components}/foundation-sites/js/foundation.core.js"),
            format!("{components}/foundation-sites/js/foundation.util.*.js"),
        ];
        javascript.extend(
            FOUNDATION_COMPONENTS
                .iter()
                .map(|name| format!("{components}/foundation-sites/js/foundation.{name}.js")),
        );
        javascript.push(format!("{components}/motion-ui/motion-ui.js"));
        javascript.push(format!("{base}/assets/javascript/custom/*.js"));

        let phpcs = ["**/*.php", "!wpcs", "!wpcs/**"]
            .map(String::from)
            .to_vec();

        let package = [
            "**/*",
            "!**/node_modules/**",
            "!**/components/**",
            "!**/scss/**",
            "!**/bower.json",
            "!**/gulpfile.js",
            "!**/package.json",
            "!**/composer.json",
            "!**/composer.lock",
            "!**/ruleset.xml",
            "!**/packaged/*",
        ]
        .map(String::from)
        .to_vec();

        Self {
            theme: theme.clone(),
            sass,
            javascript,
            phpcs,
            package,
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn theme_dir(&self) -> Utf8PathBuf {
        Utf8Path::new(SOURCE_DIR).join(self.theme.as_str())
    }

    pub fn assets(&self) -> Utf8PathBuf {
        self.theme_dir().join("assets")
    }

    pub fn scss_entry(&self) -> Utf8PathBuf {
        self.assets().join("scss/foundation.scss")
    }

    pub fn stylesheets(&self) -> Utf8PathBuf {
        self.assets().join("stylesheets")
    }

    pub fn stylesheet(&self) -> Utf8PathBuf {
        self.stylesheets().join(STYLESHEET)
    }

    pub fn stylesheet_map(&self) -> Utf8PathBuf {
        self.stylesheets().join(format!("{STYLESHEET}.map"))
    }

    pub fn javascripts(&self) -> Utf8PathBuf {
        self.assets().join("javascript")
    }

    pub fn bundle(&self) -> Utf8PathBuf {
        self.javascripts().join(BUNDLE)
    }

    pub fn bundle_map(&self) -> Utf8PathBuf {
        self.javascripts().join(format!("{BUNDLE}.map"))
    }

    /// The project's own scripts, the only ones checked by the linter.
    pub fn custom_scripts(&self) -> String {
        format!("{}/custom/*.js", self.javascripts())
    }

    pub fn footer(&self) -> Utf8PathBuf {
        self.theme_dir().join("footer.php")
    }

    pub fn watch_styles(&self) -> String {
        format!("{}/scss/**/*.scss", self.assets())
    }

    pub fn watch_scripts(&self) -> String {
        format!("{}/custom/**/*.js", self.javascripts())
    }

    /// Files that trigger a full page reload in the browser when changed.
    pub fn watch_reload(&self) -> Vec<String> {
        let images = self.assets().join("images");
        vec![
            "**/*.php".to_string(),
            format!("{images}/**/*.png"),
            format!("{images}/**/*.jpg"),
            format!("{images}/**/*.gif"),
        ]
    }

    pub fn vendor_copies(&self) -> Vec<VendorCopy> {
        let components = self.assets().join("components");
        let vendor = self.javascripts().join("vendor");

        let motion = components.join("motion-ui");
        let input = components.join("what-input");
        let fonts = components.join("fontawesome/fonts");

        vec![
            VendorCopy {
                name: "motion-ui",
                source: format!("{motion}/**/*.*"),
                base: motion,
                dest: vendor.join("motion-ui"),
                flatten: true,
            },
            VendorCopy {
                name: "what-input",
                source: format!("{input}/**/*.*"),
                base: input,
                dest: vendor.join("what-input"),
                flatten: true,
            },
            VendorCopy {
                name: "fontawesome",
                source: format!("{fonts}/**/*.*"),
                base: fonts,
                dest: self.assets().join("fonts"),
                flatten: false,
            },
        ]
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn excluded(exclude: &[Pattern], rel: &Utf8Path) -> bool {
    exclude.iter().any(|p| p.matches_with(rel.as_str(), MATCH))
}

/// Static directory prefix of a pattern, the part before the first wildcard.
fn static_base(pattern: &str) -> Utf8PathBuf {
    Utf8Path::new(pattern)
        .components()
        .take_while(|c| !is_glob(c.as_str()))
        .collect()
}

/// Expands an ordered glob list into existing files under `root`, returned
/// relative to `root`.
///
/// Patterns are expanded in list order, each pattern's matches in path order.
/// A file matched by several patterns keeps its first position. Patterns
/// starting with `!` exclude matches, and directories excluded as a whole
/// are never entered. Hidden directories are skipped.
pub fn expand<S: AsRef<str>>(root: &Utf8Path, patterns: &[S]) -> Result<Vec<Utf8PathBuf>, GlobError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for pattern in patterns {
        match pattern.as_ref().strip_prefix('!') {
            Some(negated) => exclude.push(Pattern::new(negated)?),
            None => include.push(pattern.as_ref()),
        }
    }

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in include {
        let compiled = Pattern::new(pattern)?;
        let base = root.join(static_base(pattern));
        let mut matched = false;

        if base.exists() {
            let walker = WalkDir::new(&base)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    if entry.depth() == 0 || !entry.file_type().is_dir() {
                        return true;
                    }
                    if entry.file_name().to_string_lossy().starts_with('.') {
                        return false;
                    }
                    // a directory is pruned when everything below it is excluded
                    match Utf8Path::from_path(entry.path()).and_then(|p| p.strip_prefix(root).ok()) {
                        Some(rel) => !excluded(&exclude, &rel.join("_")),
                        None => true,
                    }
                });

            for entry in walker {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = Utf8PathBuf::try_from(entry.into_path())?;
                let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                if !compiled.matches_with(rel.as_str(), MATCH) {
                    continue;
                }

                matched = true;
                if !excluded(&exclude, &rel) && seen.insert(rel.clone()) {
                    files.push(rel);
                }
            }
        }

        if !matched && !is_glob(pattern) {
            tracing::warn!(path = pattern, "file not found, skipping");
        }
    }

    Ok(files)
}
