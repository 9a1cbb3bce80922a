use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::block::{Block, List, Span};

/// Convert blocks to an HTML fragment for the document body
pub fn blocks_to_html(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        emit_block(block, &mut out);
    }
    out
}

fn emit_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { level, content } => {
            out.push_str(&format!("<h{level}>"));
            spans_to_html(content, out);
            out.push_str(&format!("</h{level}>\n"));
        }
        Block::Paragraph { content } => {
            out.push_str("<p>");
            spans_to_html(content, out);
            out.push_str("</p>\n");
        }
        Block::CodeBlock { language, content } => {
            out.push_str("<pre><code");
            if let Some(lang) = language {
                out.push_str(" class=\"language-");
                out.push_str(&encode_double_quoted_attribute(lang));
                out.push('"');
            }
            out.push('>');
            out.push_str(&encode_text(content));
            out.push_str("</code></pre>\n");
        }
        Block::List(list) => list_to_html(list, out),
        Block::Table { headers, rows } => table_to_html(headers, rows, out),
        Block::BlockQuote(inner) => {
            out.push_str("<blockquote>\n");
            for block in inner {
                emit_block(block, out);
            }
            out.push_str("</blockquote>\n");
        }
        Block::Html(html) => {
            out.push_str(html);
            if !html.ends_with('\n') {
                out.push('\n');
            }
        }
        Block::Rule => out.push_str("<hr />\n"),
        Block::PageBreak => out.push_str("<pdf:nextpage />\n"),
    }
}

fn spans_to_html(spans: &[Span], out: &mut String) {
    for span in spans {
        span_to_html(span, out);
    }
}

fn span_to_html(span: &Span, out: &mut String) {
    match span {
        Span::Text(text) => out.push_str(&encode_text(text)),
        Span::Bold(inner) => wrap("strong", inner, out),
        Span::Italic(inner) => wrap("em", inner, out),
        Span::Strikethrough(inner) => wrap("del", inner, out),
        Span::Code(text) => {
            out.push_str("<code>");
            out.push_str(&encode_text(text));
            out.push_str("</code>");
        }
        Span::Link { url, content } => {
            out.push_str("<a href=\"");
            out.push_str(&encode_double_quoted_attribute(url));
            out.push_str("\">");
            spans_to_html(content, out);
            out.push_str("</a>");
        }
        Span::Image { url, alt } => {
            out.push_str("<img src=\"");
            out.push_str(&encode_double_quoted_attribute(url));
            out.push_str("\" alt=\"");
            out.push_str(&encode_double_quoted_attribute(alt));
            out.push_str("\" />");
        }
        Span::Html(html) => out.push_str(html),
        Span::LineBreak => out.push_str("<br />\n"),
    }
}

fn wrap(tag: &str, inner: &[Span], out: &mut String) {
    out.push_str(&format!("<{tag}>"));
    spans_to_html(inner, out);
    out.push_str(&format!("</{tag}>"));
}

fn list_to_html(list: &List, out: &mut String) {
    match list.start {
        Some(1) => out.push_str("<ol>\n"),
        Some(start) => out.push_str(&format!("<ol start=\"{start}\">\n")),
        None => out.push_str("<ul>\n"),
    }

    for item in &list.items {
        out.push_str("<li>");
        match item.checked {
            Some(true) => out.push_str("<input type=\"checkbox\" disabled checked /> "),
            Some(false) => out.push_str("<input type=\"checkbox\" disabled /> "),
            None => {}
        }
        spans_to_html(&item.content, out);
        if !item.blocks.is_empty() {
            out.push('\n');
            for block in &item.blocks {
                emit_block(block, out);
            }
        }
        if let Some(ref nested) = item.nested {
            out.push('\n');
            list_to_html(nested, out);
        }
        out.push_str("</li>\n");
    }

    out.push_str(if list.ordered() { "</ol>\n" } else { "</ul>\n" });
}

fn table_to_html(headers: &[Vec<Span>], rows: &[Vec<Vec<Span>>], out: &mut String) {
    out.push_str("<table>\n");

    if !headers.is_empty() {
        out.push_str("<thead>\n<tr>");
        for cell in headers {
            out.push_str("<th>");
            spans_to_html(cell, out);
            out.push_str("</th>");
        }
        out.push_str("</tr>\n</thead>\n");
    }

    if !rows.is_empty() {
        out.push_str("<tbody>\n");
        for row in rows {
            out.push_str("<tr>");
            for cell in row {
                out.push_str("<td>");
                spans_to_html(cell, out);
                out.push_str("</td>");
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n");
    }

    out.push_str("</table>\n");
}

#[cfg(test)]
mod tests {
    use crate::markdown_to_html;

    #[test]
    fn heading_and_paragraph() {
        assert_eq!(
            markdown_to_html("# Title\n\nSome text."),
            "<h1>Title</h1>\n<p>Some text.</p>\n"
        );
    }

    #[test]
    fn inline_formatting() {
        assert_eq!(
            markdown_to_html("**b** *i* ~~s~~ `c`"),
            "<p><strong>b</strong> <em>i</em> <del>s</del> <code>c</code></p>\n"
        );
    }

    #[test]
    fn escapes_text() {
        assert_eq!(
            markdown_to_html("a &lt; b & `<x>`"),
            "<p>a &lt; b &amp; <code>&lt;x&gt;</code></p>\n"
        );
    }

    #[test]
    fn link_and_image() {
        assert_eq!(
            markdown_to_html("[go](https://a.b/?q=1&r=2) ![alt](i.png)"),
            "<p><a href=\"https://a.b/?q=1&amp;r=2\">go</a> <img src=\"i.png\" alt=\"alt\" /></p>\n"
        );
    }

    #[test]
    fn code_block_with_language() {
        assert_eq!(
            markdown_to_html("```rust\nif a < b {}\n```"),
            "<pre><code class=\"language-rust\">if a &lt; b {}\n</code></pre>\n"
        );
    }

    #[test]
    fn lists() {
        assert_eq!(
            markdown_to_html("- one\n  - two"),
            "<ul>\n<li>one\n<ul>\n<li>two</li>\n</ul>\n</li>\n</ul>\n"
        );
        assert_eq!(
            markdown_to_html("2. two\n3. three"),
            "<ol start=\"2\">\n<li>two</li>\n<li>three</li>\n</ol>\n"
        );
    }

    #[test]
    fn list_item_with_code_block() {
        assert_eq!(
            markdown_to_html("- item one\n\n  ```\n  code\n  ```\n\n- item two"),
            "<ul>\n<li>item one\n<pre><code>code\n</code></pre>\n</li>\n<li>item two</li>\n</ul>\n"
        );
    }

    #[test]
    fn task_list() {
        assert_eq!(
            markdown_to_html("- [x] done"),
            "<ul>\n<li><input type=\"checkbox\" disabled checked /> done</li>\n</ul>\n"
        );
    }

    #[test]
    fn table() {
        assert_eq!(
            markdown_to_html("| A |\n|---|\n| 1 |"),
            "<table>\n<thead>\n<tr><th>A</th></tr>\n</thead>\n<tbody>\n<tr><td>1</td></tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn blockquote_and_rule() {
        assert_eq!(
            markdown_to_html("> quoted\n\n---\n\nafter"),
            "<blockquote>\n<p>quoted</p>\n</blockquote>\n<hr />\n<p>after</p>\n"
        );
    }

    #[test]
    fn raw_html_passes_through() {
        assert_eq!(
            markdown_to_html("text <kbd>Ctrl</kbd>"),
            "<p>text <kbd>Ctrl</kbd></p>\n"
        );
    }

    #[test]
    fn page_break() {
        assert_eq!(
            markdown_to_html("---pagebreak---"),
            "<pdf:nextpage />\n"
        );
    }
}
