use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha224};
use similar::{ChangeTag, TextDiff};
use tokio::process::Command;

use super::{Artifact, Renderer};
use crate::error::{AppError, Result};

const DEFAULT_STYLESHEET: &str = r#"
body { margin: 0; padding: 16px; background: #ffffff; }
p { font-family: Georgia, serif; font-size: 22px; line-height: 1.4; max-width: 640px; }
del { color: #b31d28; background: #ffeef0; text-decoration: line-through; }
ins { color: #22863a; background: #e6ffed; text-decoration: none; }
"#;

/// Renders a word-level diff as an HTML page, optionally converted to an
/// image by an external command such as `wkhtmltoimage`.
pub struct HtmlDiffRenderer {
    output_dir: PathBuf,
    image_command: Option<String>,
    stylesheet: String,
}

impl HtmlDiffRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            image_command: None,
            stylesheet: DEFAULT_STYLESHEET.to_string(),
        }
    }

    /// Command invoked as `<command> [args..] <input.html> <output.png>`.
    pub fn with_image_command(mut self, command: Option<String>) -> Self {
        self.image_command = command.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_stylesheet(mut self, stylesheet: Option<String>) -> Self {
        if let Some(css) = stylesheet {
            self.stylesheet = css;
        }
        self
    }

    fn page(&self, old: &str, new: &str) -> String {
        format!(
            r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <style>{}</style>
  </head>
  <body>
    <p>{}</p>
  </body>
</html>
"#,
            self.stylesheet,
            diff_html(old, new)
        )
    }

    async fn convert_to_image(&self, command: &str, html_path: &Path) -> Result<PathBuf> {
        let image_path = html_path.with_extension("png");
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| AppError::Render("empty image command".to_string()))?;

        let output = Command::new(program)
            .args(parts)
            .arg(html_path)
            .arg(&image_path)
            .output()
            .await
            .map_err(|e| AppError::Render(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(AppError::Render(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(image_path)
    }
}

#[async_trait]
impl Renderer for HtmlDiffRenderer {
    async fn render(&self, old: &str, new: &str) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let stem = format!(
            "{}{:x}",
            Utc::now().timestamp(),
            Sha224::digest(new.as_bytes())
        );
        let html_path = self.output_dir.join(format!("{}.html", stem));
        tokio::fs::write(&html_path, self.page(old, new)).await?;
        tracing::debug!("Wrote diff page {}", html_path.display());

        match &self.image_command {
            Some(command) => {
                let image_path = self.convert_to_image(command, &html_path).await?;
                Ok(Artifact::new(image_path))
            }
            None => Ok(Artifact::new(html_path)),
        }
    }
}

/// Inline word diff with removed words in `<del>` and added words in `<ins>`.
pub fn diff_html(old: &str, new: &str) -> String {
    let diff = TextDiff::from_words(old, new);
    let mut out = String::with_capacity(old.len() + new.len());

    for change in diff.iter_all_changes() {
        let text = escape_html(change.value());
        match change.tag() {
            ChangeTag::Equal => out.push_str(&text),
            ChangeTag::Delete => {
                out.push_str("<del>");
                out.push_str(&text);
                out.push_str("</del>");
            }
            ChangeTag::Insert => {
                out.push_str("<ins>");
                out.push_str(&text);
                out.push_str("</ins>");
            }
        }
    }
    out
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
