//! Markdown file to PDF conversion.
//!
//! Header and footer templates use `{{ name }}` placeholders, filled from
//! [`Metadata`]. Page numbers are written as
//! `<span class="page-number"></span>` / `<span class="page-count"></span>`
//! (or `{{ page }}` / `{{ pages }}`) and resolved by the renderer.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::block::Block;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::strip_frontmatter;

pub const PAGE_NUMBER_MARKER: &str = r#"<span class="page-number"></span>"#;
pub const PAGE_COUNT_MARKER: &str = r#"<span class="page-count"></span>"#;

/// Values available to header and footer templates.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub filename: String,
    pub date: String,
    pub datetime: String,
}

impl Metadata {
    /// Extract metadata for `input` using the current local time.
    pub fn extract(input: &Path, markdown: &str) -> Self {
        Self::extract_at(input, markdown, Local::now().naive_local())
    }

    /// Extract metadata for `input` as of `now`.
    ///
    /// The title is the first `# ` heading line, falling back to the file stem.
    pub fn extract_at(input: &Path, markdown: &str, now: NaiveDateTime) -> Self {
        let title = strip_frontmatter(markdown)
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("# "))
            .map(|title| title.trim().to_string())
            .unwrap_or_else(|| {
                input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        Self {
            title,
            filename: input
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            date: now.format("%Y-%m-%d").to_string(),
            datetime: now.format("%Y-%m-%d %H:%M").to_string(),
        }
    }

    /// Look up a placeholder value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "filename" => Some(&self.filename),
            "date" => Some(&self.date),
            "datetime" => Some(&self.datetime),
            _ => None,
        }
    }
}

/// Substitute `{{ name }}` placeholders in a header or footer template.
///
/// Metadata values are HTML-escaped. Unknown names render as nothing and an
/// unclosed `{{` is kept as written.
pub fn render_template(template: &str, metadata: &Metadata) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        match after[..end].trim() {
            "page" => out.push_str(PAGE_NUMBER_MARKER),
            "pages" => out.push_str(PAGE_COUNT_MARKER),
            name => {
                if let Some(value) = metadata.get(name) {
                    out.push_str(&html_escape::encode_text(value));
                } else {
                    log::debug!("unknown template placeholder `{name}`");
                }
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Replace page markers with the paged-media tags of the HTML document.
pub fn convert_page_placeholders(content: &str) -> String {
    content
        .replace(PAGE_NUMBER_MARKER, "<pdf:pagenumber>")
        .replace(PAGE_COUNT_MARKER, "<pdf:pagecount>")
}

/// Output of a conversion before anything is written to disk.
pub struct Conversion {
    pub html: String,
    pub pdf: Vec<u8>,
}

/// Convert markdown text to the HTML document and the PDF.
pub fn convert(markdown: &str, config: &Config, metadata: &Metadata) -> Result<Conversion> {
    config.validate()?;

    let blocks = crate::parse(markdown);
    let html = html_document(&blocks, config, metadata);
    let pdf = render(&blocks, config, metadata)?;

    Ok(Conversion { html, pdf })
}

fn html_document(blocks: &[Block], config: &Config, metadata: &Metadata) -> String {
    let body = crate::html::blocks_to_html(blocks);
    crate::templates::build_html_document(&body, config, metadata)
}

fn render(blocks: &[Block], config: &Config, metadata: &Metadata) -> Result<Vec<u8>> {
    let markup = crate::typst::blocks_to_typst(blocks, config, metadata)?;
    crate::render_pdf(markup)
}

/// Options for [`convert_file`].
#[derive(Debug, Default)]
pub struct ConvertOptions {
    /// Also write the intermediate HTML document here
    pub html_output: Option<PathBuf>,
}

/// Convert the markdown file at `input` and write the PDF to `output`.
pub fn convert_file(
    input: &Path,
    output: &Path,
    config: &Config,
    options: &ConvertOptions,
) -> Result<()> {
    let markdown = fs::read_to_string(input).map_err(|source| Error::Read {
        path: input.to_path_buf(),
        source,
    })?;

    let metadata = Metadata::extract(input, &markdown);
    log::info!("Converting: {} (title: {})", input.display(), metadata.title);

    config.validate()?;
    let blocks = crate::parse(&markdown);
    log::debug!("parsed {} blocks", blocks.len());

    // Written first so it is available when rendering fails
    if let Some(html_path) = &options.html_output {
        let html = html_document(&blocks, config, &metadata);
        write(html_path, html.as_bytes())?;
        log::info!("Wrote HTML: {}", html_path.display());
    }

    let pdf = render(&blocks, config, &metadata)?;
    write(output, &pdf)?;
    log::debug!("wrote {} bytes to {}", pdf.len(), output.display());
    Ok(())
}

fn write(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}
