/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    Text(String),
    Bold(Vec<Span>),
    Italic(Vec<Span>),
    Strikethrough(Vec<Span>),
    Code(String),
    Link { url: String, content: Vec<Span> },
    Image { url: String, alt: String },
    /// Inline HTML, passed through to the HTML document only
    Html(String),
    LineBreak,
}

/// A single list item, which can contain nested content
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub content: Vec<Span>,
    /// Block content following the item text, such as code or a second paragraph
    pub blocks: Vec<Block>,
    pub nested: Option<Box<List>>,
    /// For task lists: None = not a task, Some(false) = unchecked, Some(true) = checked
    pub checked: Option<bool>,
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    /// Start number for ordered lists
    pub start: Option<u64>,
    pub items: Vec<ListItem>,
}

impl List {
    pub fn ordered(&self) -> bool {
        self.start.is_some()
    }

    /// Number of items including nested lists.
    pub fn count_items(&self) -> usize {
        self.items
            .iter()
            .map(|item| 1 + item.nested.as_ref().map_or(0, |n| n.count_items()))
            .sum()
    }
}

/// Block-level elements parsed from Markdown
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        content: Vec<Span>,
    },
    Paragraph {
        content: Vec<Span>,
    },
    CodeBlock {
        language: Option<String>,
        content: String,
    },
    List(List),
    Table {
        headers: Vec<Vec<Span>>,
        rows: Vec<Vec<Vec<Span>>>,
    },
    BlockQuote(Vec<Block>),
    /// Raw HTML block, passed through to the HTML document only
    Html(String),
    Rule,
    PageBreak,
}

/// Plain text of a span sequence, formatting dropped.
pub fn plain_text(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::Text(t) | Span::Code(t) => out.push_str(t),
            Span::Bold(inner) | Span::Italic(inner) | Span::Strikethrough(inner) => {
                out.push_str(&plain_text(inner))
            }
            Span::Link { content, .. } => out.push_str(&plain_text(content)),
            Span::Image { alt, .. } => out.push_str(alt),
            Span::Html(_) => {}
            Span::LineBreak => out.push(' '),
        }
    }
    out
}
