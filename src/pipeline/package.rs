//! Distributable theme archive.
//!
//! The archive lands in `packaged/<name>_<YYYY-MM-DD_HH-MM>.zip`, with the
//! name taken from `package.json`. Two runs within the same minute write the
//! same archive, the later one wins.

use std::fs::{self, File};
use std::io;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use super::PipelineError;
use crate::Context;
use crate::error::PackageError;
use crate::io::as_overhead;
use crate::notice::Notification;
use crate::paths::{self, PathRegistry};

pub const MANIFEST: &str = "package.json";
pub const OUTPUT_DIR: &str = "packaged";

const TIMESTAMP: &str = "%Y-%m-%d_%H-%M";

impl PipelineError for PackageError {
    fn title(&self) -> &'static str {
        "Package Error"
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
}

pub fn archive_name(name: &str, time: NaiveDateTime) -> String {
    format!("{name}_{}.zip", time.format(TIMESTAMP))
}

pub fn run(ctx: &Context) -> Result<(), PackageError> {
    let s = Instant::now();
    let archive = package(ctx.root(), &ctx.paths, Local::now().naive_local())?;

    tracing::info!("packaged {archive} {}", as_overhead(s));
    ctx.notify(Notification::info("Package", format!("Created {archive}")));
    Ok(())
}

/// Writes the archive for the project at `root`, returning its path relative
/// to the root.
pub fn package(
    root: &Utf8Path,
    paths: &PathRegistry,
    time: NaiveDateTime,
) -> Result<Utf8PathBuf, PackageError> {
    let manifest = root.join(MANIFEST);
    let text = fs::read_to_string(&manifest)
        .map_err(|e| PackageError::ManifestRead(manifest.clone(), e))?;
    let Manifest { name } = serde_json::from_str(&text)
        .map_err(|e| PackageError::ManifestParse(manifest.clone(), e))?;

    // selected before the archive exists, so it never contains itself
    let files = paths::expand(root, &paths.package)?;

    let archive = Utf8Path::new(OUTPUT_DIR).join(archive_name(&name, time));
    let path = root.join(&archive);
    fs::create_dir_all(root.join(OUTPUT_DIR))?;

    let mut zip = ZipWriter::new(File::create(&path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for rel in &files {
        let entry: Vec<_> = rel.components().map(|c| c.as_str()).collect();
        zip.start_file(entry.join("/"), options)?;
        io::copy(&mut File::open(root.join(rel))?, &mut zip)?;
    }

    zip.finish()?;
    tracing::debug!("archived {} files", files.len());

    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BuildMode;
    use crate::pipeline::fixture::Project;
    use chrono::NaiveDate;

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(hour, min, 42)
            .unwrap()
    }

    fn project() -> Project {
        Project::new(
            BuildMode::Production,
            &[
                ("package.json", r#"{ "name": "jointswp", "version": "4.0.0" }"#),
                ("style.css", "/* Theme Name: JointsWP */"),
                ("gulpfile.js", ""),
                ("node_modules/gulp/index.js", ""),
            ],
        )
    }

    fn entries(path: &Utf8Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<_> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name("jointswp", at(7, 5)), "jointswp_2024-03-09_07-05.zip");
    }

    #[test]
    fn test_package_contents() {
        let project = project();
        project.theme_file("footer.php", "<?php wp_footer(); ?>");
        project.theme_file("assets/scss/foundation.scss", "");
        project.theme_file("assets/stylesheets/foundation.css", "");

        let archive = package(&project.root, &project.ctx.paths, at(7, 5)).unwrap();
        assert_eq!(archive, "packaged/jointswp_2024-03-09_07-05.zip");

        assert_eq!(
            entries(&project.root.join(&archive)),
            [
                "src/jointswp/assets/stylesheets/foundation.css",
                "src/jointswp/footer.php",
                "style.css",
            ]
        );
    }

    #[test]
    fn test_same_minute_overwrites() {
        let project = project();

        package(&project.root, &project.ctx.paths, at(7, 5)).unwrap();
        package(&project.root, &project.ctx.paths, at(7, 5)).unwrap();
        let later = package(&project.root, &project.ctx.paths, at(7, 6)).unwrap();

        assert_eq!(fs::read_dir(project.root.join(OUTPUT_DIR)).unwrap().count(), 2);
        assert_eq!(entries(&project.root.join(later)), ["style.css"]);
    }

    #[test]
    fn test_missing_manifest() {
        let project = Project::new(BuildMode::Production, &[]);
        assert!(matches!(
            package(&project.root, &project.ctx.paths, at(0, 0)),
            Err(PackageError::ManifestRead(..))
        ));
    }
}
