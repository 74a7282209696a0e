//! Paste sanitizer: a fixed, ordered pipeline that reduces arbitrary
//! external markup to the canonical vocabulary before it touches the
//! document. Running the pipeline on its own output changes nothing.

use crate::core::{Editor, ElementNode, Marks, Node, Point, Selection, node_at};
use crate::error::EngineError;
use crate::html::{self, Html};
use crate::ops::{Op, Transaction};
use crate::selection::{
    ordered_points, point_for_global_offset, point_global_offset, split_inline_children,
    total_inline_len,
};

const METADATA_TAGS: &[&str] = &[
    "head", "meta", "title", "style", "script", "link", "base", "noscript",
];

const CONTAINER_TAGS: &[&str] = &[
    "html", "body", "div", "span", "font", "section", "article", "header", "footer", "main",
    "nav", "center", "aside", "figure", "figcaption",
];

const FORM_TAGS: &[&str] = &[
    "form", "input", "button", "select", "option", "textarea", "label", "fieldset", "legend",
];

const BORDER_CLASSES: &[&str] = &[
    "table-border-none",
    "table-border-outer",
    "table-border-header",
    "table-border-cell",
];

/// Inline vocabulary as it looks mid-pipeline, aliases included.
fn is_inline(node: &Html) -> bool {
    match node {
        Html::Text(_) => true,
        Html::Element { tag, .. } => matches!(
            tag.as_str(),
            "a" | "strong"
                | "em"
                | "u"
                | "s"
                | "code"
                | "sub"
                | "sup"
                | "br"
                | "img"
                | "b"
                | "i"
                | "strike"
                | "del"
                | "ins"
                | "tt"
        ),
    }
}

fn is_block(node: &Html) -> bool {
    match node {
        Html::Text(_) => false,
        Html::Element { tag, .. } => {
            crate::classify::is_top_level_allowed(tag) || tag == "pre"
        }
    }
}

/// Run the full pipeline over a parsed fragment.
pub fn sanitize(nodes: Vec<Html>) -> Vec<Html> {
    let nodes = strip_metadata(nodes);
    let nodes = strip_containers(nodes);
    let nodes = strip_form_controls(nodes);
    let nodes = strip_attributes(nodes);
    let nodes = drop_empty_text(nodes);
    let nodes = rewrite_preformatted(nodes);
    let nodes = wrap_stray_inline(nodes, true);
    let nodes = expand_whitespace(nodes);
    let nodes = normalize_aliases(nodes);
    init_images(nodes)
}

fn strip_metadata(nodes: Vec<Html>) -> Vec<Html> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Html::Element { tag, .. } if METADATA_TAGS.contains(&tag.as_str()) => None,
            Html::Element {
                tag,
                attrs,
                children,
            } => Some(Html::Element {
                tag,
                attrs,
                children: strip_metadata(children),
            }),
            text => Some(text),
        })
        .collect()
}

/// Presentation-only grouping elements dissolve, children promoted in
/// place. Leaf-first so nested groups collapse in one pass.
fn strip_containers(nodes: Vec<Html>) -> Vec<Html> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Html::Element {
                tag,
                attrs,
                children,
            } => {
                let children = strip_containers(children);
                if CONTAINER_TAGS.contains(&tag.as_str()) {
                    out.extend(children);
                } else {
                    out.push(Html::Element {
                        tag,
                        attrs,
                        children,
                    });
                }
            }
            text => out.push(text),
        }
    }
    out
}

fn strip_form_controls(nodes: Vec<Html>) -> Vec<Html> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Html::Element { tag, .. } if FORM_TAGS.contains(&tag.as_str()) => None,
            Html::Element {
                tag,
                attrs,
                children,
            } => Some(Html::Element {
                tag,
                attrs,
                children: strip_form_controls(children),
            }),
            text => Some(text),
        })
        .collect()
}

fn attr_allowed(tag: &str, key: &str, value: &str) -> bool {
    if key == "id" {
        return true;
    }
    match tag {
        "table" => key == "class" && BORDER_CLASSES.contains(&value),
        "a" => key == "href",
        "img" => matches!(
            key,
            "src" | "width" | "height" | "alt" | "data-resizable" | "data-selectable"
        ),
        _ => false,
    }
}

fn strip_attributes(nodes: Vec<Html>) -> Vec<Html> {
    nodes
        .into_iter()
        .map(|node| match node {
            Html::Element {
                tag,
                mut attrs,
                children,
            } => {
                attrs.retain(|key, value| attr_allowed(&tag, key, value));
                Html::Element {
                    tag,
                    attrs,
                    children: strip_attributes(children),
                }
            }
            text => text,
        })
        .collect()
}

/// Empty text vanishes everywhere; whitespace-only text vanishes between
/// blocks, where it is formatting noise rather than content.
fn drop_empty_text(nodes: Vec<Html>) -> Vec<Html> {
    let has_blocks = nodes.iter().any(is_block);
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Html::Text(text) => {
                if text.is_empty() || (has_blocks && text.trim().is_empty()) {
                    None
                } else {
                    Some(Html::Text(text))
                }
            }
            Html::Element {
                tag,
                attrs,
                children,
            } => Some(Html::Element {
                tag,
                attrs,
                children: drop_empty_text(children),
            }),
        })
        .collect()
}

/// `pre` holding only text becomes a paragraph; anything richer unwraps.
fn rewrite_preformatted(nodes: Vec<Html>) -> Vec<Html> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Html::Element {
                tag,
                attrs,
                children,
            } => {
                let children = rewrite_preformatted(children);
                if tag != "pre" {
                    out.push(Html::Element {
                        tag,
                        attrs,
                        children,
                    });
                } else if children.iter().all(|c| matches!(c, Html::Text(_))) {
                    out.push(Html::Element {
                        tag: "p".to_string(),
                        attrs: Default::default(),
                        children,
                    });
                } else {
                    out.extend(children);
                }
            }
            text => out.push(text),
        }
    }
    out
}

/// At block level, runs of inline siblings gather into paragraphs. A run
/// that is nothing but line breaks becomes one empty paragraph per break.
fn wrap_stray_inline(nodes: Vec<Html>, block_level: bool) -> Vec<Html> {
    let recurse = |node: Html| -> Html {
        match node {
            Html::Element {
                tag,
                attrs,
                children,
            } => {
                let inner_block_level =
                    matches!(tag.as_str(), "blockquote" | "li" | "td" | "th");
                Html::Element {
                    tag,
                    attrs,
                    children: wrap_stray_inline(children, inner_block_level),
                }
            }
            text => text,
        }
    };

    if !block_level {
        return nodes.into_iter().map(recurse).collect();
    }

    let mut out: Vec<Html> = Vec::new();
    let mut pending: Vec<Html> = Vec::new();
    let flush = |pending: &mut Vec<Html>, out: &mut Vec<Html>| {
        if pending.is_empty() {
            return;
        }
        let only_breaks = pending
            .iter()
            .all(|n| matches!(n, Html::Element { tag, .. } if tag == "br"));
        if only_breaks {
            for br in pending.drain(..) {
                out.push(Html::element("p", vec![br]));
            }
        } else {
            out.push(Html::element("p", std::mem::take(pending)));
        }
    };

    for node in nodes {
        if is_inline(&node) {
            match &node {
                Html::Text(t) if t.trim().is_empty() && pending.is_empty() => continue,
                _ => pending.push(node),
            }
        } else {
            flush(&mut pending, &mut out);
            out.push(recurse(node));
        }
    }
    flush(&mut pending, &mut out);
    out
}

/// Literal newlines become explicit breaks; tabs become four fixed-width
/// spaces. Carriage returns vanish.
fn expand_whitespace(nodes: Vec<Html>) -> Vec<Html> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Html::Text(text) => {
                let text = text.replace('\r', "").replace('\t', "\u{a0}\u{a0}\u{a0}\u{a0}");
                let mut parts = text.split('\n').peekable();
                while let Some(part) = parts.next() {
                    if !part.is_empty() {
                        out.push(Html::Text(part.to_string()));
                    }
                    if parts.peek().is_some() {
                        out.push(Html::element("br", Vec::new()));
                    }
                }
            }
            Html::Element {
                tag,
                attrs,
                children,
            } => out.push(Html::Element {
                tag,
                attrs,
                children: expand_whitespace(children),
            }),
        }
    }
    out
}

fn normalize_aliases(nodes: Vec<Html>) -> Vec<Html> {
    nodes
        .into_iter()
        .map(|node| match node {
            Html::Element {
                tag,
                attrs,
                children,
            } => {
                let tag = match tag.as_str() {
                    "b" => "strong".to_string(),
                    "i" => "em".to_string(),
                    "strike" | "del" => "s".to_string(),
                    "ins" => "u".to_string(),
                    "tt" => "code".to_string(),
                    _ => tag,
                };
                Html::Element {
                    tag,
                    attrs,
                    children: normalize_aliases(children),
                }
            }
            text => text,
        })
        .collect()
}

fn init_images(nodes: Vec<Html>) -> Vec<Html> {
    nodes
        .into_iter()
        .map(|node| match node {
            Html::Element {
                tag,
                mut attrs,
                children,
            } => {
                if tag == "img" {
                    attrs
                        .entry("data-resizable".to_string())
                        .or_insert_with(|| "true".to_string());
                    attrs
                        .entry("data-selectable".to_string())
                        .or_insert_with(|| "true".to_string());
                    // Images carry explicit dimensions; without source
                    // sizing they fill the line until resized.
                    attrs
                        .entry("width".to_string())
                        .or_insert_with(|| "100%".to_string());
                    attrs
                        .entry("height".to_string())
                        .or_insert_with(|| "auto".to_string());
                }
                Html::Element {
                    tag,
                    attrs,
                    children: init_images(children),
                }
            }
            text => text,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Paste operations

/// Sanitize external markup and merge it at the caret. A single-paragraph
/// fragment splices inline; anything richer inserts whole blocks after a
/// split of the current block.
pub fn paste_html(editor: &Editor, markup: &str) -> Result<Transaction, EngineError> {
    let fragment = sanitize(html::parse_fragment(markup));
    let blocks = html::canonical_blocks(&fragment);
    merge_blocks(editor, blocks, "command:paste.html")
}

/// Paste the unformatted equivalent: marks and links dropped, every block
/// forced to a plain paragraph.
pub fn paste_text(editor: &Editor, markup: &str) -> Result<Transaction, EngineError> {
    let fragment = sanitize(html::parse_fragment(markup));
    let blocks = html::canonical_blocks(&fragment);
    let blocks = plain_paragraphs(&blocks);
    merge_blocks(editor, blocks, "command:paste.text")
}

/// One plain paragraph per leaf block, in document order. Line breaks
/// survive; marks, links and images do not.
fn plain_paragraphs(blocks: &[Node]) -> Vec<Node> {
    fn collect(node: &Node, out: &mut Vec<Node>) {
        let Node::Element(el) = node else {
            return;
        };
        if crate::classify::is_style(&el.tag) {
            let mut inline: Vec<Node> = Vec::new();
            for child in &el.children {
                match child {
                    Node::Text(t) if !t.text.is_empty() => {
                        inline.push(Node::run(t.text.clone(), Marks::default()));
                    }
                    Node::Element(e) if e.tag == "br" => inline.push(Node::line_break()),
                    _ => {}
                }
            }
            if !inline.iter().any(|n| matches!(n, Node::Text(_))) {
                inline.push(Node::run(String::new(), Marks::default()));
            }
            out.push(Node::element("p", inline));
            return;
        }
        for child in &el.children {
            collect(child, out);
        }
    }
    let mut out = Vec::new();
    for block in blocks {
        collect(block, &mut out);
    }
    out
}

fn merge_blocks(
    editor: &Editor,
    blocks: Vec<Node>,
    source: &str,
) -> Result<Transaction, EngineError> {
    if blocks.is_empty() {
        return Ok(Transaction::new(Vec::new())
            .selection_after(editor.selection().clone())
            .source(source));
    }

    let doc = editor.doc();
    let (caret, _) = ordered_points(editor.selection());
    let (&run_ix, block_path) = caret
        .path
        .split_last()
        .ok_or_else(|| EngineError::SelectionInvalid("caret is not in a block".into()))?;
    let block_el = match node_at(doc, block_path) {
        Some(Node::Element(el)) => el,
        _ => return Err(EngineError::SelectionInvalid("caret block left the tree".into())),
    };
    let global = point_global_offset(&block_el.children, run_ix, caret.offset);

    // Single paragraph-like block: splice its inline content into place.
    if let [Node::Element(single)] = blocks.as_slice()
        && crate::classify::is_style(&single.tag)
    {
        let inline: Vec<Node> = single
            .children
            .iter()
            .filter(|n| match n {
                Node::Text(t) => !t.text.is_empty(),
                Node::Element(_) => true,
            })
            .cloned()
            .collect();
        if inline.is_empty() {
            return Ok(Transaction::new(Vec::new())
                .selection_after(editor.selection().clone())
                .source(source));
        }
        let inserted_len = total_inline_len(&inline);
        let (mut before, after) = split_inline_children(&block_el.children, global);
        before.extend(inline);
        before.extend(after);

        let rebuilt = Node::Element(ElementNode {
            tag: block_el.tag.clone(),
            attrs: block_el.attrs.clone(),
            children: before,
        });
        let caret_after = point_for_global_offset(
            block_path,
            rebuilt.as_element().map(|el| el.children.as_slice()).unwrap_or(&[]),
            global + inserted_len,
        );
        return Ok(Transaction::new(vec![
            Op::RemoveNode {
                path: block_path.to_vec(),
            },
            Op::InsertNode {
                path: block_path.to_vec(),
                node: rebuilt,
            },
        ])
        .selection_after(Selection::collapsed(caret_after))
        .source(source));
    }

    // Block-level insertion around a split of the caret block.
    let (&block_ix, parent_path) = block_path.split_last().expect("blocks are nested");
    let total = total_inline_len(&block_el.children);
    let block_count = blocks.len();

    let mut ops: Vec<Op> = Vec::new();
    let at = |offset: usize| {
        let mut path = parent_path.to_vec();
        path.push(block_ix + offset);
        path
    };

    let first_inserted_ix = if crate::classify::is_empty_block(&Node::Element(block_el.clone())) {
        // Empty caret block gives way entirely.
        ops.push(Op::RemoveNode {
            path: block_path.to_vec(),
        });
        for (j, node) in blocks.into_iter().enumerate() {
            ops.push(Op::InsertNode {
                path: at(j),
                node,
            });
        }
        block_ix
    } else if global == 0 {
        for (j, node) in blocks.into_iter().enumerate() {
            ops.push(Op::InsertNode {
                path: at(j),
                node,
            });
        }
        block_ix
    } else if global >= total {
        for (j, node) in blocks.into_iter().enumerate() {
            ops.push(Op::InsertNode {
                path: at(j + 1),
                node,
            });
        }
        block_ix + 1
    } else {
        let (before, after) = split_inline_children(&block_el.children, global);
        ops.push(Op::RemoveNode {
            path: block_path.to_vec(),
        });
        ops.push(Op::InsertNode {
            path: at(0),
            node: Node::Element(ElementNode {
                tag: block_el.tag.clone(),
                attrs: block_el.attrs.clone(),
                children: before,
            }),
        });
        for (j, node) in blocks.into_iter().enumerate() {
            ops.push(Op::InsertNode {
                path: at(j + 1),
                node,
            });
        }
        ops.push(Op::InsertNode {
            path: at(block_count + 1),
            node: Node::element(block_el.tag.clone(), after),
        });
        block_ix + 1
    };

    // Caret settles at the start of the block following the insertion, or
    // the end of the last inserted leaf block.
    let mut last_path = parent_path.to_vec();
    last_path.push(first_inserted_ix + block_count - 1);
    let caret_after = Point::new(
        {
            let mut p = last_path;
            p.push(0);
            p
        },
        0,
    );
    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(caret_after))
        .source(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::{fragment_to_html, parse_fragment};

    fn sanitized(input: &str) -> String {
        fragment_to_html(&sanitize(parse_fragment(input)))
    }

    #[test]
    fn strips_styles_and_aliases_bold() {
        assert_eq!(
            sanitized("<h1 style=\"margin:0\"><b>Welcome</b></h1>"),
            "<h1><strong>Welcome</strong></h1>"
        );
    }

    #[test]
    fn interchange_break_becomes_empty_paragraph() {
        assert_eq!(
            sanitized("<h1><b>Welcome</b></h1><br class=\"Apple-interchange-newline\">"),
            "<h1><strong>Welcome</strong></h1><p><br></p>"
        );
    }

    #[test]
    fn containers_dissolve_leaf_first() {
        assert_eq!(
            sanitized("<div><div><p>a</p></div><span>b</span></div>"),
            "<p>a</p><p>b</p>"
        );
    }

    #[test]
    fn pipeline_is_idempotent() {
        let inputs = [
            "<div style=\"x\"><p class=\"y\">a<br>b</p><span>tail</span></div>",
            "<head><title>t</title></head><p>keep <i>me</i></p>",
            "<pre>line1\nline2</pre>",
            "<table class=\"fancy\"><tr><td><p>cell</p></td></tr></table>",
            "<p><img src=\"u.png\">pic</p>",
        ];
        for input in inputs {
            let once = sanitize(parse_fragment(input));
            let twice = sanitize(parse_fragment(&fragment_to_html(&once)));
            assert_eq!(once, twice, "pipeline not idempotent for {input:?}");
        }
    }

    #[test]
    fn tabs_become_fixed_width_spaces() {
        assert_eq!(sanitized("<p>a\tb</p>"), "<p>a\u{a0}\u{a0}\u{a0}\u{a0}b</p>");
    }

    #[test]
    fn images_gain_sizing_and_selection_metadata() {
        assert_eq!(
            sanitized("<p>pic <img src=\"u.png\" style=\"float:left\"></p>"),
            "<p>pic <img data-resizable=\"true\" data-selectable=\"true\" \
             height=\"auto\" src=\"u.png\" width=\"100%\"></p>"
        );
        // Supplied dimensions win over the defaults.
        assert_eq!(
            sanitized("<p><img src=\"u.png\" width=\"40\" height=\"30\"></p>"),
            "<p><img data-resizable=\"true\" data-selectable=\"true\" \
             height=\"30\" src=\"u.png\" width=\"40\"></p>"
        );
    }

    #[test]
    fn form_controls_are_dropped() {
        assert_eq!(
            sanitized("<p>before</p><form><input value=\"x\"><button>go</button></form>"),
            "<p>before</p>"
        );
    }
}
