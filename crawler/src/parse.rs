use crate::error::CrawlError;
use ego_tree::iter::{Edge, Traverse};
use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Elements whose text never reaches the index.
const SKIPPED: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub text: String,
    pub anchors: Vec<Anchor>,
}

/// Turns a fetched body into plain text and hyperlinks.
pub trait PageParser: Send + Sync + 'static {
    fn parse(&self, body: &[u8]) -> Result<ParsedPage, CrawlError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl PageParser for HtmlParser {
    fn parse(&self, body: &[u8]) -> Result<ParsedPage, CrawlError> {
        let body = std::str::from_utf8(body).map_err(|e| CrawlError::Parse(format!("body is not utf-8: {e}")))?;
        let doc = Html::parse_document(body);
        let root = doc.tree.root();
        let text = TextFragments::new(root).collect::<Vec<_>>().join(" ");

        let mut anchors = Vec::new();
        for node in root.descendants() {
            if let Node::Element(el) = node.value() {
                if el.name() != "a" {
                    continue;
                }
                if let Some(href) = el.attr("href") {
                    let text = TextFragments::new(node).collect::<Vec<_>>().join(" ");
                    anchors.push(Anchor { href: href.to_string(), text });
                }
            }
        }
        Ok(ParsedPage { text, anchors })
    }
}

/// Lazily yields the trimmed, non-empty text nodes under a node in document
/// order. The walk is iterative, so deeply nested markup cannot exhaust the
/// stack.
pub struct TextFragments<'a> {
    edges: Traverse<'a, Node>,
    skip_depth: usize,
}

impl<'a> TextFragments<'a> {
    pub fn new(root: NodeRef<'a, Node>) -> Self {
        Self { edges: root.traverse(), skip_depth: 0 }
    }
}

impl<'a> Iterator for TextFragments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        for edge in self.edges.by_ref() {
            match edge {
                Edge::Open(node) => match node.value() {
                    Node::Element(el) if SKIPPED.contains(&el.name()) => self.skip_depth += 1,
                    Node::Text(text) if self.skip_depth == 0 => {
                        let fragment: &'a str = text;
                        let fragment = fragment.trim();
                        if !fragment.is_empty() {
                            return Some(fragment);
                        }
                    }
                    _ => {}
                },
                Edge::Close(node) => {
                    if let Node::Element(el) = node.value() {
                        if SKIPPED.contains(&el.name()) {
                            self.skip_depth = self.skip_depth.saturating_sub(1);
                        }
                    }
                }
            }
        }
        None
    }
}
