//! SCSS to CSS.
//!
//! The entry stylesheet is compiled by `grass` with the vendor include paths,
//! then handed to `lightningcss` for vendor prefixes. lightningcss only adds
//! prefixes in its optimizing pass, so that pass runs in both modes and may
//! merge rules or shorten values. Development output stays pretty printed
//! and gets a source map, production output is printed minified.
//!
//! The source map points into the CSS produced by `grass`, which is
//! embedded in the map under the entry's name with a `.css` extension.

use std::time::Instant;

use camino::Utf8Path;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use super::PipelineError;
use crate::error::StyleError;
use crate::io::{as_overhead, write_artifact};
use crate::paths::{PathRegistry, STYLESHEET};
use crate::{BuildMode, Context, Reload};

/// Browsers the prefixed output has to support.
pub const BROWSERS: [&str; 3] = ["last 2 versions", "ie >= 9", "Android >= 2.3"];

impl PipelineError for StyleError {
    fn title(&self) -> &'static str {
        "Sass Error"
    }
}

/// A compiled stylesheet and its optional source map.
#[derive(Debug)]
pub struct Compiled {
    pub css: String,
    pub map: Option<String>,
}

pub fn run(ctx: &Context) -> Result<(), StyleError> {
    let s = Instant::now();
    let compiled = compile(ctx.root(), &ctx.paths, ctx.config.mode)?;

    let target = ctx.path(ctx.paths.stylesheet());
    let mut css = compiled.css;

    if let Some(map) = compiled.map {
        write_artifact(&ctx.path(ctx.paths.stylesheet_map()), map)?;
        css.push_str(&format!("\n/*# sourceMappingURL={STYLESHEET}.map */\n"));
    }

    write_artifact(&target, css)?;
    tracing::info!("compiled {} {}", ctx.paths.stylesheet(), as_overhead(s));

    ctx.reload(Reload::Css(vec![ctx.paths.stylesheet()]));
    Ok(())
}

/// Compiles the theme's entry stylesheet.
pub fn compile(root: &Utf8Path, paths: &PathRegistry, mode: BuildMode) -> Result<Compiled, StyleError> {
    let entry = root.join(paths.scss_entry());
    let load_paths: Vec<_> = paths.sass.iter().map(|path| root.join(path)).collect();

    let options = grass::Options::default()
        .load_paths(&load_paths)
        .style(grass::OutputStyle::Expanded);

    let css = grass::from_path(&entry, &options)?;
    postprocess(&css, paths.scss_entry().with_extension("css").as_str(), mode)
}

/// Adds vendor prefixes, minifies in production and produces a source map in
/// development. `filename` names the intermediate `css`.
fn postprocess(css: &str, filename: &str, mode: BuildMode) -> Result<Compiled, StyleError> {
    let browsers = Browsers::from_browserslist(BROWSERS)
        .map_err(|e| StyleError::Browsers(e.to_string()))?;
    let targets = Targets {
        browsers,
        ..Targets::default()
    };

    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };
    let mut sheet = StyleSheet::parse(css, options).map_err(|e| StyleError::Css(e.to_string()))?;

    sheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    let mut map = match mode.source_maps() {
        true => {
            let mut map = SourceMap::new("/");
            let source = map.add_source(filename);
            map.set_source_content(source as usize, css)
                .map_err(|e| StyleError::SourceMap(format!("{e:?}")))?;
            Some(map)
        }
        false => None,
    };

    let result = sheet
        .to_css(PrinterOptions {
            minify: mode.minify(),
            source_map: map.as_mut(),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    let map = match map {
        Some(mut map) => Some(
            map.to_json(None)
                .map_err(|e| StyleError::SourceMap(format!("{e:?}")))?,
        ),
        None => None,
    };

    Ok(Compiled {
        css: result.code,
        map,
    })
}
