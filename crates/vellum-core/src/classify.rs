//! Tag classification. Pure predicates over the canonical vocabulary,
//! backed by fixed tables; every engine matches on these instead of
//! re-deriving tag checks ad hoc.

use crate::core::{ElementNode, Node};

pub const STYLE_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6"];
pub const FORMAT_TAGS: &[&str] = &["strong", "em", "u", "s", "code", "sub", "sup"];
pub const LIST_TAGS: &[&str] = &["ul", "ol", "li"];
pub const TABLE_TAGS: &[&str] = &["table", "tr", "td", "th"];
pub const VOID_TAGS: &[&str] = &["br", "img", "hr"];
pub const TOP_LEVEL_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "table", "blockquote",
];

fn contains(set: &[&str], tag: &str) -> bool {
    set.iter().any(|t| tag.eq_ignore_ascii_case(t))
}

pub fn is_style(tag: &str) -> bool {
    contains(STYLE_TAGS, tag)
}

pub fn is_format(tag: &str) -> bool {
    contains(FORMAT_TAGS, tag)
}

pub fn is_list(tag: &str) -> bool {
    contains(LIST_TAGS, tag)
}

pub fn is_table(tag: &str) -> bool {
    contains(TABLE_TAGS, tag)
}

pub fn is_void(tag: &str) -> bool {
    contains(VOID_TAGS, tag)
}

pub fn is_top_level_allowed(tag: &str) -> bool {
    contains(TOP_LEVEL_TAGS, tag)
}

/// An element whose only inline content is a line-break placeholder (or
/// nothing at all). `<p><br></p>` is the canonical empty block.
pub fn is_empty_element(el: &ElementNode) -> bool {
    el.children.iter().all(|child| match child {
        Node::Text(t) => t.text.is_empty(),
        Node::Element(e) => e.tag == "br",
    })
}

/// A subtree with no visible content anywhere: no text, no images.
pub fn is_empty_block(node: &Node) -> bool {
    match node {
        Node::Text(t) => t.text.is_empty(),
        Node::Element(el) => {
            if el.tag == "img" {
                return false;
            }
            el.children.iter().all(is_empty_block)
        }
    }
}
