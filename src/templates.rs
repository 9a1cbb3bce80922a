//! HTML document assembly.
//!
//! The header and footer are emitted as hidden `div`s that the `@frame`
//! rules of the stylesheet pull into the page margins.

use html_escape::encode_text;

use crate::config::Config;
use crate::converter::{Metadata, convert_page_placeholders, render_template};

/// Render a header or footer template into HTML, empty when disabled.
pub fn render_frame(template: &str, metadata: &Metadata) -> String {
    if template.is_empty() {
        return String::new();
    }
    convert_page_placeholders(&render_template(template, metadata))
}

/// Build the complete HTML document with its embedded stylesheet.
pub fn build_html_document(body: &str, config: &Config, metadata: &Metadata) -> String {
    let header_html = render_frame(&config.header.content, metadata);
    let footer_html = render_frame(&config.footer.content, metadata);

    let header_div = if header_html.is_empty() {
        String::new()
    } else {
        format!("<div id=\"header_div\">{header_html}</div>")
    };
    let footer_div = if footer_html.is_empty() {
        String::new()
    } else {
        format!("<div id=\"footer_div\">{footer_html}</div>")
    };

    let title = if metadata.title.is_empty() {
        "Document"
    } else {
        metadata.title.as_str()
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
{stylesheet}
    </style>
</head>
<body>
    {header_div}
    {footer_div}
    {body}
</body>
</html>"#,
        title = encode_text(title),
        stylesheet = generate_stylesheet(config),
    )
}

/// Generate the paged-media stylesheet for `config`.
pub fn generate_stylesheet(config: &Config) -> String {
    let margins = &config.margins;
    let font = &config.font;

    format!(
        r#"
@page {{
    size: {page_size};
    margin: {top} {right} {bottom} {left};

    @frame header {{
        -pdf-frame-content: header_div;
        top: 0.5cm;
        margin-left: {left};
        margin-right: {right};
        height: {header_height};
    }}

    @frame footer {{
        -pdf-frame-content: footer_div;
        bottom: 0.5cm;
        margin-left: {left};
        margin-right: {right};
        height: {footer_height};
    }}
}}

/* Frame sources, copied into the page frames */
#header_div {{
    position: absolute;
    top: -1000pt;
}}

#footer_div {{
    position: absolute;
    top: -1000pt;
}}

body {{
    font-family: {family};
    font-size: {size};
    line-height: {line_height};
    color: #1a1a1a;
}}

h1, h2, h3, h4, h5, h6 {{
    margin-top: 1.2em;
    margin-bottom: 0.5em;
    line-height: 1.3;
}}

h1 {{ font-size: 1.8em; }}
h2 {{ font-size: 1.4em; }}
h3 {{ font-size: 1.2em; }}
h4 {{ font-size: 1.1em; }}
h5, h6 {{ font-size: 1em; }}

h1:first-child, h2:first-child, h3:first-child {{
    margin-top: 0;
}}

p {{
    margin-top: 0;
    margin-bottom: 0.8em;
}}

pre {{
    background-color: #f5f5f5;
    padding: 0.8em;
    font-family: "Courier New", Courier, monospace;
    font-size: 0.85em;
    white-space: pre-wrap;
    word-wrap: break-word;
}}

code {{
    font-family: "Courier New", Courier, monospace;
    font-size: 0.9em;
    background-color: #f5f5f5;
    padding: 0.1em 0.3em;
}}

pre code {{
    background: none;
    padding: 0;
}}

blockquote {{
    margin: 1em 0;
    padding-left: 1em;
    border-left: 3px solid #ddd;
    color: #666;
}}

ul, ol {{
    margin: 0.8em 0;
    padding-left: 1.5em;
}}

li {{
    margin-bottom: 0.2em;
}}

a {{
    color: #0066cc;
    text-decoration: none;
}}

img {{
    max-width: 100%;
    height: auto;
}}

table {{
    width: 100%;
    border-collapse: collapse;
    margin: 1em 0;
}}

th, td {{
    padding: 0.4em;
    text-align: left;
    border-bottom: 1px solid #ddd;
}}

th {{
    font-weight: bold;
    background-color: #f5f5f5;
}}

hr {{
    border: none;
    border-top: 1px solid #ddd;
    margin: 1.5em 0;
}}
"#,
        page_size = config.page_size,
        top = margins.top,
        right = margins.right,
        bottom = margins.bottom,
        left = margins.left,
        header_height = config.header.height,
        footer_height = config.footer.height,
        family = font.family,
        size = font.size,
        line_height = font.line_height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        Metadata {
            title: "Q3 <Plan>".to_string(),
            filename: "plan.md".to_string(),
            date: "2024-01-02".to_string(),
            datetime: "2024-01-02 09:30".to_string(),
        }
    }

    #[test]
    fn stylesheet_reflects_config() {
        let mut config = Config::default();
        config.page_size = "Letter".to_string();
        config.margins.top = "3cm".to_string();
        config.header.height = "2cm".to_string();
        config.font.line_height = 1.25;

        let css = generate_stylesheet(&config);
        assert!(css.contains("size: Letter;"));
        assert!(css.contains("margin: 3cm 2cm 2.5cm 2cm;"));
        assert!(css.contains("height: 2cm;"));
        assert!(css.contains("height: 1.5cm;"));
        assert!(css.contains("line-height: 1.25;"));
        assert!(css.contains("font-size: 11pt;"));
    }

    #[test]
    fn default_line_height_formatting() {
        let css = generate_stylesheet(&Config::default());
        assert!(css.contains("line-height: 1.5;"));
    }

    #[test]
    fn document_without_frames() {
        let doc = build_html_document("<p>hi</p>\n", &Config::default(), &metadata());
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<meta charset=\"UTF-8\">"));
        assert!(doc.contains("<title>Q3 &lt;Plan&gt;</title>"));
        assert!(!doc.contains("<div id=\"header_div\">"));
        assert!(!doc.contains("<div id=\"footer_div\">"));
        assert!(doc.contains("<p>hi</p>"));
        assert!(doc.ends_with("</html>"));
    }

    #[test]
    fn document_with_frames() {
        let mut config = Config::default();
        config.header.content = "<b>{{ filename }}</b>".to_string();
        config.footer.content =
            r#"<span class="page-number"></span> / <span class="page-count"></span>"#.to_string();

        let doc = build_html_document("", &config, &metadata());
        assert!(doc.contains("<div id=\"header_div\"><b>plan.md</b></div>"));
        assert!(doc.contains("<div id=\"footer_div\"><pdf:pagenumber> / <pdf:pagecount></div>"));

        let header = doc.find("header_div\">").unwrap();
        let footer = doc.find("footer_div\">").unwrap();
        assert!(header < footer);
    }

    #[test]
    fn empty_title_falls_back() {
        let mut meta = metadata();
        meta.title.clear();
        let doc = build_html_document("", &Config::default(), &meta);
        assert!(doc.contains("<title>Document</title>"));
    }
}
