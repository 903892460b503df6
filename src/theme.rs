//! Selection of the single active theme.
//!
//! A project keeps its themes under `src/<theme>/`. Every path used by the
//! build is rooted in the active theme, so it has to be known before any task
//! is registered. The selection is validated once at startup and never
//! changes afterwards.

use std::fmt::{Display, Formatter};
use std::fs;

use camino::Utf8Path;

use crate::error::ThemeError;

/// Name of the directory containing all themes, relative to the project root.
pub const SOURCE_DIR: &str = "src";

/// Identifier of the active theme, i.e. the name of a directory under `src/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Theme(String);

impl Theme {
    #[cfg(test)]
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the active theme for the project at `root`.
///
/// With an explicit `choice` the theme only has to exist. Without one the
/// `src/` directory must contain exactly one theme directory; several
/// candidates are rejected instead of silently picking the first.
pub fn resolve(root: &Utf8Path, choice: Option<&str>) -> Result<Theme, ThemeError> {
    let base = root.join(SOURCE_DIR);
    let candidates = candidates(&base)?;

    if let Some(choice) = choice {
        return match candidates.iter().any(|name| name == choice) {
            true => Ok(Theme(choice.to_string())),
            false => Err(ThemeError::Missing(choice.to_string(), base)),
        };
    }

    match candidates.as_slice() {
        [] => Err(ThemeError::NotFound(base)),
        [only] => Ok(Theme(only.clone())),
        many => Err(ThemeError::Ambiguous(base, many.join(", "))),
    }
}

/// Lists theme directories in name order, skipping files and hidden entries.
fn candidates(base: &Utf8Path) -> Result<Vec<String>, ThemeError> {
    let entries = fs::read_dir(base).map_err(|e| ThemeError::Io(base.to_owned(), e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ThemeError::Io(base.to_owned(), e))?;
        let kind = entry
            .file_type()
            .map_err(|e| ThemeError::Io(base.to_owned(), e))?;

        if !kind.is_dir() {
            continue;
        }

        let name = entry
            .file_name()
            .into_string()
            .map_err(|name| ThemeError::NonUtf8(name.to_string_lossy().into_owned()))?;

        if !name.starts_with('.') {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn project(themes: &[&str]) -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join(SOURCE_DIR)).unwrap();
        for theme in themes {
            fs::create_dir_all(root.join(SOURCE_DIR).join(theme)).unwrap();
        }
        (dir, root)
    }

    #[test]
    fn test_single_theme() {
        let (_dir, root) = project(&["jointswp"]);
        fs::write(root.join("src/README.md"), "").unwrap();
        fs::create_dir_all(root.join("src/.git")).unwrap();

        let theme = resolve(&root, None).unwrap();
        assert_eq!(theme.as_str(), "jointswp");
    }

    #[test]
    fn test_no_theme_is_fatal() {
        let (_dir, root) = project(&[]);
        assert!(matches!(resolve(&root, None), Err(ThemeError::NotFound(_))));
    }

    #[test]
    fn test_missing_src_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        assert!(matches!(resolve(&root, None), Err(ThemeError::Io(..))));
    }

    #[test]
    fn test_ambiguous_themes() {
        let (_dir, root) = project(&["zeta", "alpha"]);
        match resolve(&root, None) {
            Err(ThemeError::Ambiguous(_, list)) => assert_eq!(list, "alpha, zeta"),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_choice() {
        let (_dir, root) = project(&["zeta", "alpha"]);
        assert_eq!(resolve(&root, Some("zeta")).unwrap().as_str(), "zeta");
        assert!(matches!(
            resolve(&root, Some("beta")),
            Err(ThemeError::Missing(..))
        ));
    }
}
