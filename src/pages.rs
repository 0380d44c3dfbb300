use anyhow::Result;
use html_escape::encode_text;
use natord::compare_ignore_case;
use std::{fs::read_dir, path::Path};

/// Files that have to exist in the serving root for the site to be worth
/// serving at all: the entry page, its stylesheet and its script.
pub static REQUIRED_FILES: [&str; 3] = ["index.html", "styles.css", "script.js"];

pub fn missing_required(root: &Path) -> Vec<&'static str> {
    REQUIRED_FILES
        .iter()
        .filter(|file| !root.join(file).is_file())
        .copied()
        .collect()
}

pub struct Pages {
    names: Vec<String>,
}

impl Pages {
    /// Collects the top-level `*.html` files of the serving root, in natural
    /// case-insensitive order with the entry page first.
    pub fn discover(root: &Path) -> Result<Self> {
        let mut names = vec![];

        for entry in read_dir(root)? {
            let Ok(entry) = entry else { continue };
            let is_file = entry.file_type().is_ok_and(|file_type| file_type.is_file());
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_file && name.to_lowercase().ends_with(".html") {
                names.push(name);
            }
        }

        names.sort_by(|a, b| compare_ignore_case(a, b));

        if let Some(index) = names.iter().position(|name| name == "index.html") {
            let entry_page = names.remove(index);
            names.insert(0, entry_page);
        }

        Ok(Self { names })
    }

    /// Convenience URLs for the banner. The entry page is shown as the bare
    /// root URL.
    pub fn urls(&self, port: u16) -> Vec<String> {
        self.names
            .iter()
            .map(|name| {
                if name == "index.html" {
                    format!("http://localhost:{port}/")
                } else {
                    format!("http://localhost:{port}/{name}")
                }
            })
            .collect()
    }
}

pub fn not_found_html(path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
    <head>
        <title>404 Not Found</title>
        <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    </head>
    <body>
        <h1>404 Not Found</h1>
        <p>No file matches <code>{}</code> in the serving root.</p>
    </body>
</html>
"#,
        encode_text(path),
    )
}
