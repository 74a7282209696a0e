//! Selection resolution over the live tree: ordered range endpoints, the
//! block sequence a range intersects, and the host-friendly id/offset
//! encoding used by tests and automation.

use serde::{Deserialize, Serialize};

use crate::classify;
use crate::core::{
    Document, Marks, Node, Point, Selection, TextNode, clamp_to_char_boundary, node_at,
};
use crate::error::EngineError;
use crate::ops::Path;

/// Anchor/focus in document order.
pub fn ordered_points(sel: &Selection) -> (Point, Point) {
    let mut start = sel.anchor.clone();
    let mut end = sel.focus.clone();

    if start.path == end.path {
        if end.offset < start.offset {
            std::mem::swap(&mut start, &mut end);
        }
        return (start, end);
    }
    if end.path < start.path {
        std::mem::swap(&mut start, &mut end);
    }
    (start, end)
}

/// Longest shared path prefix of two anchors.
pub fn common_ancestor(a: &Point, b: &Point) -> Path {
    a.path
        .iter()
        .zip(b.path.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

/// Leaf blocks (style-tagged elements holding inline content) in document
/// order, wherever they sit: top level, list items, table cells,
/// blockquotes.
pub fn leaf_blocks(doc: &Document) -> Vec<Path> {
    fn walk(children: &[Node], path: &mut Vec<usize>, out: &mut Vec<Path>) {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if classify::is_style(&el.tag) {
                out.push(path.clone());
            } else {
                walk(&el.children, path, out);
            }
            path.pop();
        }
    }
    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), &mut out);
    out
}

/// The finite, restartable sequence of leaf blocks intersected by a
/// selection. Every block-level engine derives its operating set from this.
#[derive(Debug, Clone)]
pub struct BlocksBetween {
    blocks: Vec<Path>,
    next: usize,
}

impl Iterator for BlocksBetween {
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        let item = self.blocks.get(self.next).cloned()?;
        self.next += 1;
        Some(item)
    }
}

impl BlocksBetween {
    pub fn restart(&mut self) {
        self.next = 0;
    }

    pub fn paths(&self) -> &[Path] {
        &self.blocks
    }
}

pub fn blocks_between(doc: &Document, sel: &Selection) -> Result<BlocksBetween, EngineError> {
    let (start, end) = ordered_points(sel);
    let start_block = block_of_point(&start)?;
    let end_block = block_of_point(&end)?;

    let all = leaf_blocks(doc);
    let start_ix = all
        .iter()
        .position(|p| *p == start_block)
        .ok_or_else(|| EngineError::SelectionInvalid("selection start left the tree".into()))?;
    let end_ix = all
        .iter()
        .position(|p| *p == end_block)
        .ok_or_else(|| EngineError::SelectionInvalid("selection end left the tree".into()))?;
    let (a, b) = if start_ix <= end_ix {
        (start_ix, end_ix)
    } else {
        (end_ix, start_ix)
    };

    Ok(BlocksBetween {
        blocks: all[a..=b].to_vec(),
        next: 0,
    })
}

/// Path of the leaf block containing a point (the point's parent).
pub fn block_of_point(point: &Point) -> Result<Path, EngineError> {
    point
        .path
        .split_last()
        .map(|(_, parent)| parent.to_vec())
        .ok_or_else(|| EngineError::SelectionInvalid("point is not inside a block".into()))
}

// ---------------------------------------------------------------------------
// Inline offset arithmetic inside one block. Text runs contribute their byte
// length; void elements (br, img) contribute one caret position.

pub(crate) fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        if ix < child_ix {
            global += node.inline_len();
            continue;
        }
        if ix == child_ix {
            match node {
                Node::Text(t) => global += clamp_to_char_boundary(&t.text, offset),
                Node::Element(_) => global += offset.min(node.inline_len()),
            }
        }
        break;
    }
    global
}

pub(crate) fn point_for_global_offset(
    block_path: &[usize],
    children: &[Node],
    global_offset: usize,
) -> Point {
    let mut remaining = global_offset;
    for (child_ix, node) in children.iter().enumerate() {
        match node {
            Node::Text(t) => {
                if remaining < t.text.len() {
                    let mut path = block_path.to_vec();
                    path.push(child_ix);
                    return Point::new(path, clamp_to_char_boundary(&t.text, remaining));
                }
                if remaining == t.text.len() {
                    if matches!(children.get(child_ix + 1), Some(Node::Text(_))) {
                        let mut path = block_path.to_vec();
                        path.push(child_ix + 1);
                        return Point::new(path, 0);
                    }
                    let mut path = block_path.to_vec();
                    path.push(child_ix);
                    return Point::new(path, t.text.len());
                }
                remaining -= t.text.len();
            }
            Node::Element(_) => {
                let len = node.inline_len();
                if remaining <= len && len > 0 {
                    // Settle on the nearest text run around the void.
                    for (ix, prev) in children.iter().enumerate().take(child_ix).rev() {
                        if let Node::Text(t) = prev {
                            let mut path = block_path.to_vec();
                            path.push(ix);
                            return Point::new(path, t.text.len());
                        }
                    }
                    for (ix, next) in children.iter().enumerate().skip(child_ix + 1) {
                        if matches!(next, Node::Text(_)) {
                            let mut path = block_path.to_vec();
                            path.push(ix);
                            return Point::new(path, 0);
                        }
                    }
                    break;
                }
                remaining = remaining.saturating_sub(len);
            }
        }
    }

    for (child_ix, node) in children.iter().enumerate().rev() {
        if let Node::Text(t) = node {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
    }

    let mut path = block_path.to_vec();
    path.push(0);
    Point::new(path, 0)
}

pub(crate) fn total_inline_len(children: &[Node]) -> usize {
    children.iter().map(Node::inline_len).sum()
}

/// Split a block's inline children at a global offset. A text run straddling
/// the boundary is cut in two; void elements go wholly to one side. Each
/// side is left with at least an empty run so it can host a caret.
pub(crate) fn split_inline_children(children: &[Node], global: usize) -> (Vec<Node>, Vec<Node>) {
    let mut before: Vec<Node> = Vec::new();
    let mut after: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let len = node.inline_len();
        if cursor + len <= global {
            before.push(node.clone());
        } else if cursor >= global {
            after.push(node.clone());
        } else if let Node::Text(t) = node {
            let cut = clamp_to_char_boundary(&t.text, global - cursor);
            before.push(Node::Text(TextNode {
                text: t.text[..cut].to_string(),
                marks: t.marks.clone(),
            }));
            after.push(Node::Text(TextNode {
                text: t.text[cut..].to_string(),
                marks: t.marks.clone(),
            }));
        } else {
            before.push(node.clone());
        }
        cursor += len;
    }

    if !before.iter().any(|n| matches!(n, Node::Text(_))) {
        before.push(Node::run(String::new(), Marks::default()));
    }
    if !after.iter().any(|n| matches!(n, Node::Text(_))) {
        after.push(Node::run(String::new(), Marks::default()));
    }
    (before, after)
}

// ---------------------------------------------------------------------------
// Host encoding: element ids plus child index and offset, resolved through
// the same model the engines use.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCode {
    #[serde(rename = "startElementId")]
    pub start_id: String,
    #[serde(rename = "startOffset")]
    pub start_offset: usize,
    #[serde(rename = "endElementId")]
    pub end_id: String,
    #[serde(rename = "endOffset")]
    pub end_offset: usize,
    #[serde(rename = "startChild", default, skip_serializing_if = "Option::is_none")]
    pub start_child: Option<usize>,
    #[serde(rename = "endChild", default, skip_serializing_if = "Option::is_none")]
    pub end_child: Option<usize>,
}

pub fn find_by_id(doc: &Document, id: &str) -> Option<Path> {
    fn walk(children: &[Node], id: &str, path: &mut Vec<usize>) -> Option<Path> {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if el.attrs.get("id").is_some_and(|v| v == id) {
                return Some(path.clone());
            }
            if let Some(found) = walk(&el.children, id, path) {
                return Some(found);
            }
            path.pop();
        }
        None
    }
    walk(&doc.children, id, &mut Vec::new())
}

pub fn decode_selection(doc: &Document, code: &SelectionCode) -> Result<Selection, EngineError> {
    let decode_point = |id: &str, child: Option<usize>, offset: usize| -> Result<Point, EngineError> {
        let mut path = find_by_id(doc, id)
            .ok_or_else(|| EngineError::NotFound(format!("no element with id {id:?}")))?;
        path.push(child.unwrap_or(0));
        Ok(Point::new(path, offset))
    };
    let anchor = decode_point(&code.start_id, code.start_child, code.start_offset)?;
    let focus = decode_point(&code.end_id, code.end_child, code.end_offset)?;
    Ok(Selection { anchor, focus })
}

pub fn encode_selection(doc: &Document, sel: &Selection) -> Result<SelectionCode, EngineError> {
    let encode_point = |point: &Point| -> Result<(String, usize, Option<usize>), EngineError> {
        let mut path = point.path.clone();
        let child = path.pop();
        while !path.is_empty() {
            if let Some(Node::Element(el)) = node_at(doc, &path)
                && let Some(id) = el.attrs.get("id")
            {
                return Ok((id.clone(), point.offset, child));
            }
            path.pop();
        }
        Err(EngineError::NotFound(
            "no ancestor element carries an id".into(),
        ))
    };
    let (start_id, start_offset, start_child) = encode_point(&sel.anchor)?;
    let (end_id, end_offset, end_child) = encode_point(&sel.focus)?;
    Ok(SelectionCode {
        start_id,
        start_offset,
        end_id,
        end_offset,
        start_child,
        end_child,
    })
}
