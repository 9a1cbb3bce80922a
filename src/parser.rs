use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::block::{Block, List, ListItem, Span, plain_text};

const PAGE_BREAK_MARKER: &str = "---pagebreak---";

/// Strip YAML frontmatter from the beginning of markdown content.
///
/// Front matter opens with a `---` line, closes with a `---` or `...` line and
/// must hold a YAML mapping. Anything else is left for the markdown parser.
pub(crate) fn strip_frontmatter(markdown: &str) -> &str {
    let Some(rest) = markdown
        .strip_prefix("---\n")
        .or_else(|| markdown.strip_prefix("---\r\n"))
    else {
        return markdown;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            if !is_yaml_mapping(&rest[..offset]) {
                return markdown;
            }
            return rest[offset + line.len()..].trim_start_matches(['\r', '\n']);
        }
        offset += line.len();
    }
    markdown
}

fn is_yaml_mapping(text: &str) -> bool {
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(text),
        Ok(serde_yaml::Value::Mapping(_))
    )
}

/// Parse markdown text into a list of blocks
pub fn parse(markdown: &str) -> Vec<Block> {
    let markdown = strip_frontmatter(markdown);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut blocks = Vec::new();
    let mut state = ParseState::default();

    for event in parser {
        process_event(event, &mut state, &mut blocks);
    }

    blocks
}

#[derive(Default)]
struct ParseState {
    // Current inline content being built
    spans: Vec<Span>,
    // Nested span buffers for formatting, links and images
    span_stack: Vec<Vec<Span>>,

    // Current heading level (if in a heading)
    heading_level: Option<u8>,

    // Code block state
    in_code_block: bool,
    code_language: Option<String>,
    code_content: String,

    // Raw HTML block state
    in_html_block: bool,
    html_content: String,

    // Link and image targets, innermost last
    link_urls: Vec<String>,
    image_urls: Vec<String>,

    // List state
    list_stack: Vec<ListBuilder>,

    // Block quote state, one buffer per open quote
    quote_stack: Vec<Vec<Block>>,

    // Table state
    in_table: bool,
    table_headers: Vec<Vec<Span>>,
    table_rows: Vec<Vec<Vec<Span>>>,
    current_row: Vec<Vec<Span>>,
    in_table_head: bool,
}

struct ListBuilder {
    start: Option<u64>,
    items: Vec<ListItem>,
    current_item_spans: Vec<Span>,
    current_item_blocks: Vec<Block>,
    current_item_checked: Option<bool>,
    // Nested list waiting for the current item to close
    nested_pending: Option<List>,
    // Block quotes open when the list started
    quote_depth: usize,
}

impl ListBuilder {
    fn new(start: Option<u64>, quote_depth: usize) -> Self {
        Self {
            start,
            items: Vec::new(),
            current_item_spans: Vec::new(),
            current_item_blocks: Vec::new(),
            current_item_checked: None,
            nested_pending: None,
            quote_depth,
        }
    }

    fn has_item_blocks(&self) -> bool {
        !self.current_item_blocks.is_empty() || self.nested_pending.is_some()
    }

    /// Add inline content to the current item, after any blocks it already holds.
    fn push_item_spans(&mut self, spans: Vec<Span>) {
        if spans.is_empty() {
            return;
        }
        if self.has_item_blocks() {
            self.push_item_block(Block::Paragraph { content: spans });
        } else {
            if !self.current_item_spans.is_empty() {
                self.current_item_spans.push(Span::LineBreak);
            }
            self.current_item_spans.extend(spans);
        }
    }

    fn push_item_block(&mut self, block: Block) {
        if let Some(nested) = self.nested_pending.take() {
            self.current_item_blocks.push(Block::List(nested));
        }
        self.current_item_blocks.push(block);
    }

    fn finish_item(&mut self) {
        let item = ListItem {
            content: std::mem::take(&mut self.current_item_spans),
            blocks: std::mem::take(&mut self.current_item_blocks),
            nested: self.nested_pending.take().map(Box::new),
            checked: self.current_item_checked.take(),
        };
        self.items.push(item);
    }
}

/// The innermost open list, unless a block quote was opened inside it.
fn current_list(state: &mut ParseState) -> Option<&mut ListBuilder> {
    let depth = state.quote_stack.len();
    state
        .list_stack
        .last_mut()
        .filter(|list| list.quote_depth == depth)
}

/// Tight list items carry their text as loose spans; move them into the item
/// before a block starts inside it.
fn flush_item_spans(state: &mut ParseState) {
    if state.spans.is_empty() {
        return;
    }
    let spans = std::mem::take(&mut state.spans);
    match current_list(state) {
        Some(list) => list.push_item_spans(spans),
        None => state.spans = spans,
    }
}

/// Push a finished block into the innermost open list item or block quote,
/// or the document.
fn push_block(state: &mut ParseState, blocks: &mut Vec<Block>, block: Block) {
    if let Some(list) = current_list(state) {
        list.push_item_block(block);
    } else if let Some(quote) = state.quote_stack.last_mut() {
        quote.push(block);
    } else {
        blocks.push(block);
    }
}

/// Close the innermost span buffer, wrapping its content with `wrap`.
fn close_span(state: &mut ParseState, wrap: impl FnOnce(Vec<Span>) -> Span) {
    let inner = std::mem::take(&mut state.spans);
    if let Some(mut parent) = state.span_stack.pop() {
        parent.push(wrap(inner));
        state.spans = parent;
    }
}

fn open_span(state: &mut ParseState) {
    state.span_stack.push(std::mem::take(&mut state.spans));
}

fn process_event(event: Event, state: &mut ParseState, blocks: &mut Vec<Block>) {
    match event {
        // Headings
        Event::Start(Tag::Heading { level, .. }) => {
            flush_item_spans(state);
            state.heading_level = Some(heading_level_to_u8(level));
        }
        Event::End(TagEnd::Heading(_)) => {
            if let Some(level) = state.heading_level.take() {
                let content = std::mem::take(&mut state.spans);
                push_block(state, blocks, Block::Heading { level, content });
            }
        }

        // Paragraphs
        Event::Start(Tag::Paragraph) => {}
        Event::End(TagEnd::Paragraph) => {
            let content = std::mem::take(&mut state.spans);
            if !content.is_empty() {
                // Check for manual page break marker
                if let [Span::Text(text)] = content.as_slice() {
                    if text.trim() == PAGE_BREAK_MARKER {
                        push_block(state, blocks, Block::PageBreak);
                        return;
                    }
                }
                // If we're in a list item, add to that instead
                if let Some(list) = current_list(state) {
                    list.push_item_spans(content);
                } else if state.in_table {
                    // Ignore paragraphs in tables, handled by cell
                } else {
                    push_block(state, blocks, Block::Paragraph { content });
                }
            }
        }

        // Text content
        Event::Text(text) => {
            if state.in_code_block {
                state.code_content.push_str(&text);
            } else {
                state.spans.push(Span::Text(text.into_string()));
            }
        }

        // Inline code
        Event::Code(code) => {
            state.spans.push(Span::Code(code.into_string()));
        }

        // Bold
        Event::Start(Tag::Strong) => open_span(state),
        Event::End(TagEnd::Strong) => close_span(state, Span::Bold),

        // Italic
        Event::Start(Tag::Emphasis) => open_span(state),
        Event::End(TagEnd::Emphasis) => close_span(state, Span::Italic),

        // Strikethrough
        Event::Start(Tag::Strikethrough) => open_span(state),
        Event::End(TagEnd::Strikethrough) => close_span(state, Span::Strikethrough),

        // Links
        Event::Start(Tag::Link { dest_url, .. }) => {
            state.link_urls.push(dest_url.into_string());
            open_span(state);
        }
        Event::End(TagEnd::Link) => {
            let url = state.link_urls.pop().unwrap_or_default();
            close_span(state, |content| Span::Link { url, content });
        }

        // Images; the nested text is the alt text
        Event::Start(Tag::Image { dest_url, .. }) => {
            state.image_urls.push(dest_url.into_string());
            open_span(state);
        }
        Event::End(TagEnd::Image) => {
            let url = state.image_urls.pop().unwrap_or_default();
            close_span(state, |content| Span::Image {
                url,
                alt: plain_text(&content),
            });
        }

        // Code blocks
        Event::Start(Tag::CodeBlock(kind)) => {
            flush_item_spans(state);
            state.in_code_block = true;
            state.code_language = match kind {
                CodeBlockKind::Fenced(lang) => {
                    let lang = lang.into_string();
                    if lang.is_empty() { None } else { Some(lang) }
                }
                CodeBlockKind::Indented => None,
            };
            state.code_content.clear();
        }
        Event::End(TagEnd::CodeBlock) => {
            state.in_code_block = false;
            let content = std::mem::take(&mut state.code_content);
            let language = state.code_language.take();
            push_block(state, blocks, Block::CodeBlock { language, content });
        }

        // Raw HTML
        Event::Start(Tag::HtmlBlock) => {
            flush_item_spans(state);
            state.in_html_block = true;
            state.html_content.clear();
        }
        Event::End(TagEnd::HtmlBlock) => {
            state.in_html_block = false;
            let html = std::mem::take(&mut state.html_content);
            push_block(state, blocks, Block::Html(html));
        }
        Event::Html(html) => {
            if state.in_html_block {
                state.html_content.push_str(&html);
            } else {
                state.spans.push(Span::Html(html.into_string()));
            }
        }
        Event::InlineHtml(html) => {
            state.spans.push(Span::Html(html.into_string()));
        }

        // Block quotes
        Event::Start(Tag::BlockQuote(_)) => {
            flush_item_spans(state);
            state.quote_stack.push(Vec::new());
        }
        Event::End(TagEnd::BlockQuote(_)) => {
            if let Some(inner) = state.quote_stack.pop() {
                if !inner.is_empty() {
                    push_block(state, blocks, Block::BlockQuote(inner));
                }
            }
        }

        // Lists
        Event::Start(Tag::List(start)) => {
            flush_item_spans(state);
            let quote_depth = state.quote_stack.len();
            state.list_stack.push(ListBuilder::new(start, quote_depth));
        }
        Event::End(TagEnd::List(_)) => {
            if let Some(list_builder) = state.list_stack.pop() {
                let list = List {
                    start: list_builder.start,
                    items: list_builder.items,
                };
                // If there's a parent list, this is nested
                match current_list(state) {
                    Some(parent) if parent.has_item_blocks() => {
                        parent.push_item_block(Block::List(list));
                    }
                    Some(parent) => parent.nested_pending = Some(list),
                    None => push_block(state, blocks, Block::List(list)),
                }
            }
        }

        Event::Start(Tag::Item) => {
            if let Some(list) = state.list_stack.last_mut() {
                list.current_item_spans.clear();
                list.current_item_blocks.clear();
                list.current_item_checked = None;
            }
        }
        Event::End(TagEnd::Item) => {
            // Collect any remaining spans
            let remaining = std::mem::take(&mut state.spans);

            if let Some(list) = state.list_stack.last_mut() {
                list.push_item_spans(remaining);
                list.finish_item();
            }
        }

        // Task list checkboxes
        Event::TaskListMarker(checked) => {
            if let Some(list) = state.list_stack.last_mut() {
                list.current_item_checked = Some(checked);
            }
        }

        // Tables
        Event::Start(Tag::Table(_)) => {
            flush_item_spans(state);
            state.in_table = true;
            state.table_headers.clear();
            state.table_rows.clear();
        }
        Event::End(TagEnd::Table) => {
            state.in_table = false;
            let headers = std::mem::take(&mut state.table_headers);
            let rows = std::mem::take(&mut state.table_rows);
            push_block(state, blocks, Block::Table { headers, rows });
        }

        Event::Start(Tag::TableHead) => {
            state.in_table_head = true;
            state.current_row.clear();
        }
        Event::End(TagEnd::TableHead) => {
            state.in_table_head = false;
            state.table_headers = std::mem::take(&mut state.current_row);
        }

        Event::Start(Tag::TableRow) => {
            state.current_row.clear();
        }
        Event::End(TagEnd::TableRow) => {
            if !state.in_table_head {
                let row = std::mem::take(&mut state.current_row);
                state.table_rows.push(row);
            }
        }

        Event::Start(Tag::TableCell) => {
            state.spans.clear();
        }
        Event::End(TagEnd::TableCell) => {
            let cell_content = std::mem::take(&mut state.spans);
            state.current_row.push(cell_content);
        }

        // Horizontal rule
        Event::Rule => {
            flush_item_spans(state);
            push_block(state, blocks, Block::Rule);
        }

        // Soft/hard breaks
        Event::SoftBreak => {
            state.spans.push(Span::Text(" ".to_string()));
        }
        Event::HardBreak => {
            state.spans.push(Span::LineBreak);
        }

        // Ignore other events
        _ => {}
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Span {
        Span::Text(s.to_string())
    }

    #[test]
    fn strips_frontmatter() {
        let blocks = parse("---\ntitle: x\n---\n\n# Hi");
        assert_eq!(
            blocks,
            vec![Block::Heading {
                level: 1,
                content: vec![text("Hi")]
            }]
        );
    }

    #[test]
    fn unterminated_frontmatter_is_kept() {
        assert_eq!(strip_frontmatter("---\nno end"), "---\nno end");
    }

    #[test]
    fn frontmatter_may_close_with_dots() {
        assert_eq!(strip_frontmatter("---\ntitle: x\n...\nBody"), "Body");
    }

    #[test]
    fn leading_rules_are_not_frontmatter() {
        let blocks = parse("---\n\nIntro\n\n---\n\nBody");
        assert_eq!(
            blocks,
            vec![
                Block::Rule,
                Block::Paragraph {
                    content: vec![text("Intro")]
                },
                Block::Rule,
                Block::Paragraph {
                    content: vec![text("Body")]
                },
            ]
        );

        let md = "-----\n\nIntro\n\n---pagebreak---\n\nMore";
        assert_eq!(strip_frontmatter(md), md);
        let blocks = parse(md);
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], Block::Rule);
        assert_eq!(blocks[2], Block::PageBreak);
    }

    #[test]
    fn page_break_marker() {
        let blocks = parse("one\n\n---pagebreak---\n\ntwo");
        assert_eq!(blocks[1], Block::PageBreak);
        assert_eq!(blocks.len(), 3);
    }

    #[test]
    fn nested_formatting() {
        let blocks = parse("**bold *both***");
        assert_eq!(
            blocks,
            vec![Block::Paragraph {
                content: vec![Span::Bold(vec![
                    text("bold "),
                    Span::Italic(vec![text("both")])
                ])]
            }]
        );
    }

    #[test]
    fn links_and_images() {
        let blocks = parse("[site](https://example.com) ![a cat](cat.png)");
        let Block::Paragraph { content } = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            content[0],
            Span::Link {
                url: "https://example.com".to_string(),
                content: vec![text("site")]
            }
        );
        assert_eq!(
            content[2],
            Span::Image {
                url: "cat.png".to_string(),
                alt: "a cat".to_string()
            }
        );
    }

    #[test]
    fn strikethrough() {
        let blocks = parse("~~gone~~");
        assert_eq!(
            blocks,
            vec![Block::Paragraph {
                content: vec![Span::Strikethrough(vec![text("gone")])]
            }]
        );
    }

    #[test]
    fn nested_list_attaches_to_parent_item() {
        let blocks = parse("- one\n  - inner\n- two");
        let Block::List(list) = &blocks[0] else {
            panic!("expected list");
        };
        assert!(!list.ordered());
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].content, vec![text("one")]);
        let nested = list.items[0].nested.as_ref().expect("nested list");
        assert_eq!(nested.items[0].content, vec![text("inner")]);
        assert_eq!(list.count_items(), 3);
    }

    #[test]
    fn code_block_stays_in_its_list_item() {
        let blocks = parse("- item one\n\n  ```\n  code\n  ```\n\n- item two");
        assert_eq!(blocks.len(), 1);
        let Block::List(list) = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items[0].content, vec![text("item one")]);
        assert_eq!(
            list.items[0].blocks,
            vec![Block::CodeBlock {
                language: None,
                content: "code\n".to_string()
            }]
        );
        assert_eq!(list.items[1].content, vec![text("item two")]);
        assert!(list.items[1].blocks.is_empty());
    }

    #[test]
    fn item_content_keeps_its_order() {
        let blocks = parse("- a\n\n  ```\n  x\n  ```\n\n  b\n\n  > q\n- c");
        let Block::List(list) = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items[0].content, vec![text("a")]);
        assert_eq!(
            list.items[0].blocks,
            vec![
                Block::CodeBlock {
                    language: None,
                    content: "x\n".to_string()
                },
                Block::Paragraph {
                    content: vec![text("b")]
                },
                Block::BlockQuote(vec![Block::Paragraph {
                    content: vec![text("q")]
                }]),
            ]
        );
        assert_eq!(list.items[1].content, vec![text("c")]);
    }

    #[test]
    fn loose_item_paragraphs_are_joined() {
        let blocks = parse("1. first\n\n   more\n\n2. second");
        let Block::List(list) = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(
            list.items[0].content,
            vec![text("first"), Span::LineBreak, text("more")]
        );
        assert!(list.items[0].blocks.is_empty());
    }

    #[test]
    fn list_inside_quote() {
        let blocks = parse("> - one\n> - two");
        let Block::BlockQuote(inner) = &blocks[0] else {
            panic!("expected quote");
        };
        let Block::List(list) = &inner[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items.len(), 2);
    }

    #[test]
    fn ordered_list_start() {
        let blocks = parse("3. three\n4. four");
        let Block::List(list) = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(list.start, Some(3));
    }

    #[test]
    fn task_list() {
        let blocks = parse("- [x] done\n- [ ] todo");
        let Block::List(list) = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(list.items[0].checked, Some(true));
        assert_eq!(list.items[1].checked, Some(false));
    }

    #[test]
    fn block_quote() {
        let blocks = parse("> quoted\n\nafter");
        assert_eq!(
            blocks,
            vec![
                Block::BlockQuote(vec![Block::Paragraph {
                    content: vec![text("quoted")]
                }]),
                Block::Paragraph {
                    content: vec![text("after")]
                },
            ]
        );
    }

    #[test]
    fn html_block_passes_through() {
        let blocks = parse("<div class=\"note\">hi</div>\n");
        assert_eq!(
            blocks,
            vec![Block::Html("<div class=\"note\">hi</div>\n".to_string())]
        );
    }

    #[test]
    fn table() {
        let blocks = parse("| A | B |\n|---|---|\n| 1 | 2 |");
        assert_eq!(
            blocks,
            vec![Block::Table {
                headers: vec![vec![text("A")], vec![text("B")]],
                rows: vec![vec![vec![text("1")], vec![text("2")]]],
            }]
        );
    }
}
