use crate::block::{Block, List, Span};
use crate::config::Config;
use crate::converter::{Metadata, PAGE_COUNT_MARKER, PAGE_NUMBER_MARKER, render_template};
use crate::error::Result;
use crate::units::{Length, format_pt};

/// Offset of the header and footer frames from the page edge.
const FRAME_OFFSET: Length = Length::mm(5.0);

const PAGE_NUMBER: &str = "#{context counter(page).display()}";
const PAGE_COUNT: &str = "#{context counter(page).final().first()}";

/// Largest blocks still kept on one page. Anything taller than a page inside
/// `#block(breakable: false)` would run off its bottom edge.
const MAX_UNBROKEN_LIST_ITEMS: usize = 5;
const MAX_UNBROKEN_CODE_LINES: usize = 30;
const MAX_UNBROKEN_TABLE_ROWS: usize = 15;

/// Families the renderer cannot resolve; Typst falls back on its own.
const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "ui-serif",
    "ui-sans-serif",
    "ui-monospace",
    "-apple-system",
    "blinkmacsystemfont",
];

/// Convert blocks to a complete Typst document for `config`
pub fn blocks_to_typst(blocks: &[Block], config: &Config, metadata: &Metadata) -> Result<String> {
    let mut out = preamble(config, metadata)?;
    out.push_str(&body_to_typst(blocks));
    Ok(out)
}

/// Page, text and paragraph set rules.
pub fn preamble(config: &Config, metadata: &Metadata) -> Result<String> {
    let geometry = config.geometry()?;
    let mut out = String::new();

    out.push_str(&format!(
        "#set page(\n  width: {},\n  height: {},\n  margin: (top: {}, bottom: {}, left: {}, right: {}),\n",
        geometry.size.width,
        geometry.size.height,
        geometry.top,
        geometry.bottom,
        geometry.left,
        geometry.right,
    ));
    if !config.header.content.is_empty() {
        let ascent = geometry.top.to_pt() - FRAME_OFFSET.to_pt() - geometry.header_height.to_pt();
        out.push_str(&format!(
            "  header: [{}],\n  header-ascent: {},\n",
            frame_to_typst(&render_template(&config.header.content, metadata)),
            format_pt(ascent.max(0.0)),
        ));
    }
    if !config.footer.content.is_empty() {
        let descent =
            geometry.bottom.to_pt() - FRAME_OFFSET.to_pt() - geometry.footer_height.to_pt();
        out.push_str(&format!(
            "  footer: [{}],\n  footer-descent: {},\n",
            frame_to_typst(&render_template(&config.footer.content, metadata)),
            format_pt(descent.max(0.0)),
        ));
    }
    out.push_str(")\n");

    let fonts = font_families(&config.font.family);
    out.push_str("#set text(");
    match fonts.as_slice() {
        [] => {}
        [single] => out.push_str(&format!("font: {}, ", typst_string(single))),
        many => {
            let list: Vec<String> = many.iter().map(|f| typst_string(f)).collect();
            out.push_str(&format!("font: ({}), ", list.join(", ")));
        }
    }
    out.push_str(&format!("size: {})\n", geometry.font_size));

    let leading = ((config.font.line_height - 1.0).max(0.0) * 100.0).round() / 100.0;
    out.push_str(&format!(
        "#set par(leading: {leading}em, linebreaks: \"optimized\")\n\n"
    ));

    Ok(out)
}

/// Named families from a CSS font-family list.
fn font_families(css: &str) -> Vec<String> {
    css.split(',')
        .map(|f| f.trim().trim_matches(|c: char| c == '"' || c == '\'').trim())
        .filter(|f| !f.is_empty() && !GENERIC_FAMILIES.contains(&f.to_ascii_lowercase().as_str()))
        .map(str::to_string)
        .collect()
}

fn typst_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Convert a rendered header/footer HTML snippet to Typst content.
///
/// Tags are dropped except for line breaks and page markers; a
/// `text-align` style anywhere in the snippet aligns the whole frame.
pub fn frame_to_typst(html: &str) -> String {
    let mut out = String::new();
    let mut rest = html;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix(PAGE_NUMBER_MARKER) {
            out.push_str(PAGE_NUMBER);
            rest = after;
        } else if let Some(after) = rest.strip_prefix(PAGE_COUNT_MARKER) {
            out.push_str(PAGE_COUNT);
            rest = after;
        } else if rest.starts_with('<') {
            let Some(end) = rest.find('>') else {
                escape_text(rest, &mut out);
                break;
            };
            let tag = rest[1..end].trim().trim_end_matches('/').trim();
            let name = tag
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            match name.as_str() {
                "br" => out.push_str("#linebreak()"),
                "pdf:pagenumber" => out.push_str(PAGE_NUMBER),
                "pdf:pagecount" => out.push_str(PAGE_COUNT),
                _ => {}
            }
            rest = &rest[end + 1..];
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let decoded = html_escape::decode_html_entities(&rest[..end]);
            let collapsed: Vec<&str> = decoded.split_whitespace().collect();
            let mut text = collapsed.join(" ");
            if decoded.starts_with(char::is_whitespace) && !out.is_empty() {
                text.insert(0, ' ');
            }
            if decoded.ends_with(char::is_whitespace) && !collapsed.is_empty() {
                text.push(' ');
            }
            escape_text(&text, &mut out);
            rest = &rest[end..];
        }
    }

    let out = out.trim().to_string();
    match frame_alignment(html) {
        Some(align) => format!("#align({align})[{out}]"),
        None => out,
    }
}

fn frame_alignment(html: &str) -> Option<&'static str> {
    let compact: String = html
        .to_ascii_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    ["center", "right", "left"]
        .into_iter()
        .find(|align| compact.contains(&format!("text-align:{align}")))
}

/// Convert blocks to Typst markup
pub fn body_to_typst(blocks: &[Block]) -> String {
    let mut out = String::new();

    let mut i = 0;
    while i < blocks.len() {
        let block = &blocks[i];

        match block {
            Block::Heading { .. } => {
                // Keep heading with following content using a block that prevents breaks
                out.push_str("#block(breakable: false)[\n");
                emit_heading(block, &mut out);

                // Include the next block if it exists (to keep heading with first content)
                if let Some(next) = blocks.get(i + 1).filter(|b| keep_together(b)) {
                    i += 1;
                    emit_block(next, &mut out);
                }
                out.push_str("]\n\n");
            }
            Block::PageBreak => {
                // Only valid outside of containers
                out.push_str("#pagebreak()\n\n");
            }
            _ => {
                emit_block(block, &mut out);
            }
        }

        i += 1;
    }

    out
}

/// Whether `block` is small enough to be placed without a page break.
fn keep_together(block: &Block) -> bool {
    match block {
        Block::CodeBlock { content, .. } => content.lines().count() <= MAX_UNBROKEN_CODE_LINES,
        Block::List(list) => {
            list.count_items() <= MAX_UNBROKEN_LIST_ITEMS
                && list
                    .items
                    .iter()
                    .all(|item| item.blocks.iter().all(keep_together))
        }
        Block::Table { rows, .. } => rows.len() <= MAX_UNBROKEN_TABLE_ROWS,
        Block::BlockQuote(inner) => inner.iter().all(keep_together),
        Block::PageBreak => false,
        _ => true,
    }
}

fn emit_heading(block: &Block, out: &mut String) {
    if let Block::Heading { level, content } = block {
        for _ in 0..*level {
            out.push('=');
        }
        out.push(' ');
        spans_to_typst(content, out);
        out.push('\n');
        out.push('\n');
    }
}

fn emit_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { .. } => {
            emit_heading(block, out);
        }
        Block::Paragraph { content } => {
            spans_to_typst(content, out);
            out.push('\n');
            out.push('\n');
        }
        Block::CodeBlock { language, content } => {
            // Keep short code blocks together
            let fence = "`".repeat(longest_backtick_run(content).max(2) + 1);
            let unbroken = keep_together(block);
            if unbroken {
                out.push_str("#block(breakable: false)[\n");
            }
            out.push_str(&fence);
            if let Some(lang) = language {
                out.push_str(lang);
            }
            out.push('\n');
            out.push_str(content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&fence);
            out.push('\n');
            if unbroken {
                out.push_str("]\n");
            }
            out.push('\n');
        }
        Block::List(list) => {
            // Wrap list to keep together when small, allow breaks when large
            if keep_together(block) {
                out.push_str("#block(breakable: false)[\n");
                list_to_typst(list, 0, out);
                out.push_str("]\n\n");
            } else {
                list_to_typst(list, 0, out);
                out.push('\n');
            }
        }
        Block::Table { headers, rows } => {
            // Keep short tables together
            if keep_together(block) {
                out.push_str("#block(breakable: false)[\n");
                table_to_typst(headers, rows, out);
                out.push_str("]\n\n");
            } else {
                table_to_typst(headers, rows, out);
                out.push('\n');
            }
        }
        Block::BlockQuote(inner) => {
            out.push_str("#quote(block: true)[\n");
            for block in inner {
                emit_block(block, out);
            }
            out.push_str("]\n\n");
        }
        Block::Html(html) => {
            log::debug!("dropping raw HTML block from PDF: {}", html.trim());
        }
        Block::Rule => {
            out.push_str("#line(length: 100%)\n\n");
        }
        Block::PageBreak => {}
    }
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}

fn spans_to_typst(spans: &[Span], out: &mut String) {
    for span in spans {
        span_to_typst(span, out);
    }
}

fn escape_text(text: &str, out: &mut String) {
    // Escape special Typst characters
    for ch in text.chars() {
        match ch {
            '#' | '*' | '_' | '@' | '$' | '\\' | '`' | '<' | '>' | '[' | ']' | '/' | '~' | '='
            | '-' | '+' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

fn span_to_typst(span: &Span, out: &mut String) {
    match span {
        Span::Text(text) => escape_text(text, out),
        Span::Bold(inner) => {
            out.push('*');
            spans_to_typst(inner, out);
            out.push('*');
        }
        Span::Italic(inner) => {
            out.push('_');
            spans_to_typst(inner, out);
            out.push('_');
        }
        Span::Strikethrough(inner) => {
            out.push_str("#strike[");
            spans_to_typst(inner, out);
            out.push(']');
        }
        Span::Code(text) => {
            // Raw text cannot escape backticks
            if text.contains('`') {
                out.push_str("#raw(");
                out.push_str(&typst_string(text));
                out.push(')');
            } else {
                out.push('`');
                out.push_str(text);
                out.push('`');
            }
        }
        Span::Link { url, content } => {
            out.push_str("#link(");
            out.push_str(&typst_string(url));
            out.push_str(")[");
            spans_to_typst(content, out);
            out.push(']');
        }
        Span::Image { url, alt } => {
            // Images are not embedded; show what they are
            out.push_str("#emph[");
            escape_text(if alt.is_empty() { url } else { alt }, out);
            out.push(']');
        }
        Span::Html(html) => {
            if html.trim_start().to_ascii_lowercase().starts_with("<br") {
                out.push_str(" \\\n");
            }
        }
        Span::LineBreak => {
            out.push_str(" \\\n");
        }
    }
}

fn list_to_typst(list: &List, indent: usize, out: &mut String) {
    let indent_str: String = "  ".repeat(indent);
    // Continuation lines sit right of the marker so they stay in the item
    let body_indent: String = "  ".repeat(indent + 1);

    for (i, item) in list.items.iter().enumerate() {
        out.push_str(&indent_str);
        match list.start {
            Some(start) if i == 0 && start != 1 => out.push_str(&format!("{start}.")),
            Some(_) => out.push('+'),
            None => out.push('-'),
        }
        out.push(' ');
        match item.checked {
            Some(true) => out.push_str("☑ "),
            Some(false) => out.push_str("☐ "),
            None => {}
        }
        let mut content = String::new();
        spans_to_typst(&item.content, &mut content);
        push_indented(&content, &body_indent, out);
        out.push('\n');

        for block in &item.blocks {
            let mut markup = String::new();
            emit_block(block, &mut markup);
            let markup = markup.trim_end_matches('\n');
            if markup.is_empty() {
                continue;
            }
            out.push_str(&body_indent);
            push_indented(markup, &body_indent, out);
            out.push('\n');
        }

        if let Some(ref nested) = item.nested {
            list_to_typst(nested, indent + 1, out);
        }
    }
}

/// Push `text`, indenting every line after the first.
fn push_indented(text: &str, indent: &str, out: &mut String) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
}

fn table_to_typst(headers: &[Vec<Span>], rows: &[Vec<Vec<Span>>], out: &mut String) {
    let col_count = headers.len();
    if col_count == 0 {
        return;
    }

    out.push_str("#table(\n");
    out.push_str(&format!("  columns: {},\n", col_count));

    // Header cells (bold)
    for cell in headers {
        out.push_str("  [*");
        spans_to_typst(cell, out);
        out.push_str("*],\n");
    }

    // Data rows
    for row in rows {
        for cell in row {
            out.push_str("  [");
            spans_to_typst(cell, out);
            out.push_str("],\n");
        }
    }

    out.push_str(")\n");
}
