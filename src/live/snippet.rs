//! The live reload `<script>` tag in the theme's footer.

use std::fs;
use std::io;

use camino::Utf8Path;

const OPEN: &str = "<!-- themesmith:live -->";
const CLOSE: &str = "<!-- /themesmith:live -->";

/// Markup loading the live reload client from the dev server on `port`.
pub fn markup(port: u16) -> String {
    format!(
        "{OPEN}<script>document.write(\"<script async src='//\" + location.hostname + \":{port}/__live/client.js'><\\/script>\");</script>{CLOSE}\n"
    )
}

/// Returns `text` with `snippet` placed right before the closing body tag,
/// or at the end when there's none. A snippet from an earlier run is replaced.
pub fn with_snippet(text: &str, snippet: &str) -> String {
    let mut text = without_snippet(text);
    match text.rfind("</body>") {
        Some(i) => text.insert_str(i, snippet),
        None => text.push_str(snippet),
    }
    text
}

pub fn without_snippet(text: &str) -> String {
    let mut text = text.to_string();
    while let Some(start) = text.find(OPEN) {
        let Some(len) = text[start..].find(CLOSE) else {
            break;
        };
        let mut end = start + len + CLOSE.len();
        if text[end..].starts_with('\n') {
            end += 1;
        }
        text.replace_range(start..end, "");
    }
    text
}

/// Injects the snippet into `file`. Returns false if there's no such file.
pub fn inject(file: &Utf8Path, snippet: &str) -> io::Result<bool> {
    let text = match fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    fs::write(file, with_snippet(&text, snippet))?;
    Ok(true)
}

pub fn remove(file: &Utf8Path) -> io::Result<()> {
    let text = fs::read_to_string(file)?;
    let clean = without_snippet(&text);
    if clean != text {
        fs::write(file, clean)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOTER: &str = "<?php wp_footer(); ?>\n</body>\n</html>\n";

    #[test]
    fn test_inject_before_body() {
        let snippet = markup(3000);
        let text = with_snippet(FOOTER, &snippet);

        assert!(text.starts_with("<?php wp_footer(); ?>\n<!-- themesmith:live -->"));
        assert!(text.contains(":3000/__live/client.js"));
        assert!(text.ends_with("<!-- /themesmith:live -->\n</body>\n</html>\n"));
    }

    #[test]
    fn test_inject_is_idempotent() {
        let once = with_snippet(FOOTER, &markup(3000));
        let twice = with_snippet(&once, &markup(3001));

        assert_eq!(twice.matches(OPEN).count(), 1);
        assert!(twice.contains(":3001/"));
        assert_eq!(without_snippet(&twice), FOOTER);
    }

    #[test]
    fn test_append_without_body() {
        let text = with_snippet("<?php // no markup", &markup(3000));
        assert!(text.ends_with(&markup(3000)));
    }

    #[test]
    fn test_inject_and_remove_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = Utf8Path::from_path(dir.path()).unwrap().join("footer.php");

        assert!(!inject(&file, &markup(3000)).unwrap());

        fs::write(&file, FOOTER).unwrap();
        assert!(inject(&file, &markup(3000)).unwrap());
        remove(&file).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), FOOTER);
    }
}
