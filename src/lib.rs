mod block;
pub mod config;
pub mod converter;
mod error;
mod html;
mod parser;
pub mod templates;
mod typst;
pub mod units;

pub use block::{Block, List, ListItem, Span};
pub use config::Config;
pub use converter::{ConvertOptions, Metadata, convert_file};
pub use error::{Error, Result};

use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_library::layout::PagedDocument;
use typst_pdf::PdfOptions;

/// Parse markdown text into a vector of blocks.
pub fn parse(markdown: &str) -> Vec<Block> {
    parser::parse(markdown)
}

/// Convert markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    html::blocks_to_html(&parse(markdown))
}

/// Convert markdown to a complete HTML document with its stylesheet.
pub fn markdown_to_html_document(markdown: &str, config: &Config, metadata: &Metadata) -> String {
    templates::build_html_document(&markdown_to_html(markdown), config, metadata)
}

/// Convert markdown to a Typst document.
pub fn markdown_to_typst(markdown: &str, config: &Config, metadata: &Metadata) -> Result<String> {
    typst::blocks_to_typst(&parse(markdown), config, metadata)
}

/// Convert markdown to PDF bytes using the default config.
pub fn markdown_to_pdf(markdown: &str, metadata: &Metadata) -> Result<Vec<u8>> {
    markdown_to_pdf_with_config(markdown, &Config::default(), metadata)
}

/// Convert markdown to PDF bytes with custom config.
pub fn markdown_to_pdf_with_config(
    markdown: &str,
    config: &Config,
    metadata: &Metadata,
) -> Result<Vec<u8>> {
    config.validate()?;
    render_pdf(markdown_to_typst(markdown, config, metadata)?)
}

/// Compile Typst markup to a paged document.
fn compile_document(markup: String) -> Result<PagedDocument> {
    // Config fonts name installed families
    let font_options = TypstKitFontOptions::new()
        .include_embedded_fonts(true)
        .include_system_fonts(true);

    let engine = TypstEngine::builder()
        .main_file(markup)
        .search_fonts_with(font_options)
        .build();

    let compiled = engine.compile::<PagedDocument>();
    let doc = compiled
        .output
        .map_err(|e| Error::Render(format!("Typst compilation failed: {:?}", e)));
    for warning in &compiled.warnings {
        log::log!(warning_level(&warning.message), "typst: {}", warning.message);
    }
    doc
}

/// Missing fonts are expected: the default family list names platform fonts
/// and Typst falls back to the embedded ones.
fn warning_level(message: &str) -> log::Level {
    if message.starts_with("unknown font family") {
        log::Level::Info
    } else {
        log::Level::Warn
    }
}

/// Render Typst markup to PDF bytes.
pub(crate) fn render_pdf(markup: String) -> Result<Vec<u8>> {
    let doc = compile_document(markup)?;
    log::debug!("laid out {} pages", doc.pages.len());

    typst_pdf::pdf(&doc, &PdfOptions::default())
        .map_err(|e| Error::Render(format!("PDF generation failed: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        Metadata {
            title: "Notes".to_string(),
            filename: "notes.md".to_string(),
            date: "2024-02-29".to_string(),
            datetime: "2024-02-29 23:59".to_string(),
        }
    }

    #[test]
    fn renders_pdf() {
        let md = "# Notes\n\n- [x] one\n- two\n\n> quote\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
        let mut config = Config::default();
        config.header.content = "<i>{{ title }}</i> {{ date }}".to_string();
        config.footer.content = "{{ page }} / {{ pages }}".to_string();

        let pdf = markdown_to_pdf_with_config(md, &config, &metadata()).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_pdf_with_page_break_and_landscape() {
        let mut config = Config::default();
        config.page_size = "A5 landscape".to_string();
        let pdf =
            markdown_to_pdf_with_config("one\n\n---pagebreak---\n\ntwo", &config, &metadata())
                .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn missing_fonts_are_not_warnings() {
        assert_eq!(
            warning_level("unknown font family: segoe ui"),
            log::Level::Info
        );
        assert_eq!(warning_level("unknown variable: x"), log::Level::Warn);
    }

    #[test]
    fn html_document_wraps_body() {
        let doc = markdown_to_html_document("# Notes", &Config::default(), &metadata());
        assert!(doc.contains("<h1>Notes</h1>"));
        assert!(doc.contains("size: A4;"));
    }

    #[test]
    fn invalid_config_is_rejected_before_rendering() {
        let mut config = Config::default();
        config.font.size = "big".to_string();
        assert!(matches!(
            markdown_to_pdf_with_config("x", &config, &metadata()),
            Err(Error::InvalidValue { .. })
        ));
    }
}
