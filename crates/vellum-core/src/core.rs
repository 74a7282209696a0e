use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify;
use crate::error::EngineError;
use crate::ops::{Op, Path, Transaction};

pub type Attrs = BTreeMap<String, String>;

/// The document tree. Root children are restricted to the canonical
/// top-level vocabulary; see `classify::TOP_LEVEL_TAGS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub tag: String,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

/// Inline format marks carried on a text run. Keeping marks on runs rather
/// than as nested elements makes self-nesting impossible and turns the
/// merge-adjacent invariant into a normalize pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub subscript: bool,
    #[serde(default)]
    pub superscript: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Marks {
    pub fn is_plain(&self) -> bool {
        self == &Marks::default()
    }
}

impl Node {
    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            tag: tag.into(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn run(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    /// A style block of the given tag holding one plain run.
    pub fn block(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Node::element(tag, vec![Node::text(text)])
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::block("p", text)
    }

    pub fn line_break() -> Self {
        Node::element("br", Vec::new())
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn is_element_with_tag(&self, tag: &str) -> bool {
        matches!(self, Node::Element(el) if el.tag == tag)
    }

    /// Caret positions this node occupies inside its block. Void elements
    /// (line breaks, images) count as one.
    pub fn inline_len(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Element(el) if classify::is_void(&el.tag) => 1,
            Node::Element(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// One atomic, reversible editing step.
#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

/// The engine state: document, selection, and the undo/redo stacks. All
/// mutation funnels through [`Editor::apply`], which is where undo
/// bookkeeping lives -- individual engines never see it.
pub struct Editor {
    doc: Document,
    selection: Selection,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection) -> Self {
        let mut editor = Self {
            doc,
            selection,
            config: EditorConfig::default().with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    /// A single empty paragraph with the caret at its start.
    pub fn empty() -> Self {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        Self::new(doc, Selection::collapsed(Point::new(vec![0, 0], 0)))
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = normalize_selection(&self.doc, &selection);
    }

    /// The id of the innermost focused element carrying an `id` attribute,
    /// for host reporting only.
    pub fn focused_region(&self) -> Option<String> {
        let mut path = self.selection.focus.path.clone();
        while !path.is_empty() {
            if let Some(Node::Element(el)) = node_at(&self.doc, &path)
                && let Some(id) = el.attrs.get("id")
            {
                return Some(id.clone());
            }
            path.pop();
        }
        None
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Replace the whole document. The only operation that clears the
    /// undo/redo stacks.
    pub fn reset(&mut self, doc: Document, selection: Selection) {
        self.doc = doc;
        self.selection = selection;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.normalize_in_place();
    }

    /// Commit a transaction. Ops are staged on a scratch copy first so a
    /// failing transaction leaves the document untouched, then the inverse
    /// ops are pushed as one undo record.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), EngineError> {
        if tx.is_empty() {
            // Selection-only transactions move the caret without touching
            // history.
            if let Some(sel) = tx.selection_after {
                self.selection = normalize_selection(&self.doc, &sel);
            }
            return Ok(());
        }
        let selection_before = self.selection.clone();

        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();
        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in tx.ops.iter().cloned() {
            inverse_ops.push(apply_op_to(&mut doc, &mut selection, op)?);
        }
        if let Some(sel) = tx.selection_after.clone() {
            selection = sel;
        }

        let mut converged = false;
        for _ in 0..self.config.max_normalize_iterations {
            let ops = normalize_ops(&doc);
            if ops.is_empty() {
                converged = true;
                break;
            }
            for op in ops {
                inverse_ops.push(apply_op_to(&mut doc, &mut selection, op)?);
            }
        }
        if !converged {
            return Err(EngineError::StructureViolation(
                "document normalization did not converge".into(),
            ));
        }
        inverse_ops.reverse();

        self.doc = doc;
        self.selection = normalize_selection(&self.doc, &selection);
        let selection_after = self.selection.clone();

        log::debug!(
            "committed {} op(s) from {}",
            tx.ops.len(),
            tx.meta.source.as_deref().unwrap_or("unknown")
        );

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        match replay(&self.doc, &record.inverse_ops) {
            Ok((doc, redo_ops)) => {
                self.doc = doc;
                self.selection = normalize_selection(&self.doc, &record.selection_before);
                self.redo_stack.push(UndoRecord {
                    inverse_ops: redo_ops,
                    selection_before: record.selection_before,
                    selection_after: record.selection_after,
                });
                true
            }
            Err(err) => {
                log::warn!("undo aborted: {err}");
                self.undo_stack.push(record);
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        match replay(&self.doc, &record.inverse_ops) {
            Ok((doc, undo_ops)) => {
                self.doc = doc;
                self.selection = normalize_selection(&self.doc, &record.selection_after);
                self.undo_stack.push(UndoRecord {
                    inverse_ops: undo_ops,
                    selection_before: record.selection_before,
                    selection_after: record.selection_after,
                });
                true
            }
            Err(err) => {
                log::warn!("redo aborted: {err}");
                self.redo_stack.push(record);
                false
            }
        }
    }

    fn normalize_in_place(&mut self) {
        for _ in 0..self.config.max_normalize_iterations {
            let ops = normalize_ops(&self.doc);
            if ops.is_empty() {
                break;
            }
            for op in ops {
                let _ = apply_op_to(&mut self.doc, &mut self.selection, op);
            }
        }
        self.selection = normalize_selection(&self.doc, &self.selection);
    }
}

/// Apply a batch of ops to a scratch copy, returning the new document and
/// the reversed inverse batch. All-or-nothing.
fn replay(doc: &Document, ops: &[Op]) -> Result<(Document, Vec<Op>), EngineError> {
    let mut doc = doc.clone();
    let mut selection = Selection::collapsed(Point::new(vec![0, 0], 0));
    let mut inverse: Vec<Op> = Vec::new();
    for op in ops.iter().cloned() {
        inverse.push(apply_op_to(&mut doc, &mut selection, op)?);
    }
    inverse.reverse();
    Ok((doc, inverse))
}

pub(crate) fn apply_op_to(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
) -> Result<Op, EngineError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start =
                clamp_to_char_boundary(&text_node.text, range.start.min(text_node.text.len()));
            let end = clamp_to_char_boundary(&text_node.text, range.end.min(text_node.text.len()));
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path, &removed, doc);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetTag { path, tag } => match node_mut(doc, &path)? {
            Node::Element(el) => {
                let old = std::mem::replace(&mut el.tag, tag);
                Ok(Op::SetTag { path, tag: old })
            }
            Node::Text(_) => Err(EngineError::StructureViolation(
                "text nodes have no tag".into(),
            )),
        },
        Op::SetNodeAttrs { path, patch } => match node_mut(doc, &path)? {
            Node::Element(el) => {
                let old = patch_apply(&mut el.attrs, &patch);
                Ok(Op::SetNodeAttrs { path, patch: old })
            }
            Node::Text(_) => Err(EngineError::StructureViolation(
                "text nodes have no attributes".into(),
            )),
        },
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path {
            continue;
        }
        if point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    if path.is_empty() {
        return;
    }
    let (index, parent_path) = path.split_last().expect("non-empty path");

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        if point.path[depth] >= *index {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    if path.is_empty() {
        return;
    }
    let (index, parent_path) = path.split_last().expect("non-empty path");
    let index = *index;

    // When a removed run's text survives merged into the left sibling,
    // points inside it map to positions after the left run's prefix.
    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_at(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        if let (Some(prefix), Node::Text(removed_text), Some(left_index)) =
            (merge_prefix_len, removed, index.checked_sub(1))
        {
            point.path.truncate(depth + 1);
            point.path[depth] = left_index;
            point.offset = (prefix + point.offset).min(prefix + removed_text.text.len());
        } else {
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

pub fn node_at<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (&first, rest) = path.split_first()?;
    let mut node = doc.children.get(first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub fn children_at<'a>(doc: &'a Document, parent_path: &[usize]) -> Option<&'a [Node]> {
    if parent_path.is_empty() {
        return Some(&doc.children);
    }
    match node_at(doc, parent_path)? {
        Node::Element(el) => Some(&el.children),
        Node::Text(_) => None,
    }
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, EngineError> {
    let (&first, rest) = path
        .split_first()
        .ok_or_else(|| EngineError::NotFound("empty path".into()))?;
    let mut node = doc
        .children
        .get_mut(first)
        .ok_or_else(|| EngineError::NotFound(format!("path index {first} out of bounds")))?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el
                .children
                .get_mut(ix)
                .ok_or_else(|| EngineError::NotFound(format!("path index {ix} out of bounds")))?,
            Node::Text(_) => {
                return Err(EngineError::StructureViolation(
                    "path descends into a text node".into(),
                ));
            }
        };
    }
    Ok(node)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, EngineError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        Node::Element(_) => Err(EngineError::StructureViolation(
            "expected a text node".into(),
        )),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), EngineError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| EngineError::NotFound("empty insert path".into()))?;

    let children = if parent_path.is_empty() {
        &mut doc.children
    } else {
        match node_mut(doc, parent_path)? {
            Node::Element(el) => &mut el.children,
            Node::Text(_) => {
                return Err(EngineError::StructureViolation(
                    "insert parent is not a container".into(),
                ));
            }
        }
    };

    if index > children.len() {
        return Err(EngineError::NotFound(format!(
            "insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, EngineError> {
    let (&index, parent_path) = path
        .split_last()
        .ok_or_else(|| EngineError::NotFound("empty remove path".into()))?;

    let children = if parent_path.is_empty() {
        &mut doc.children
    } else {
        match node_mut(doc, parent_path)? {
            Node::Element(el) => &mut el.children,
            Node::Text(_) => {
                return Err(EngineError::StructureViolation(
                    "remove parent is not a container".into(),
                ));
            }
        }
    };

    if index >= children.len() {
        return Err(EngineError::NotFound(format!(
            "remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set_one(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut set = Attrs::default();
        set.insert(key.into(), value.into());
        Self {
            set,
            remove: Vec::new(),
        }
    }

    pub fn remove_one(key: impl Into<String>) -> Self {
        Self {
            set: Attrs::default(),
            remove: vec![key.into()],
        }
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}

// ---------------------------------------------------------------------------
// Normalization. A fixed, convergent pass list keeps the committed tree
// canonical: non-empty document, every style block owns a text leaf,
// adjacent runs with identical marks are merged.

fn normalize_ops(doc: &Document) -> Vec<Op> {
    let ops = ensure_non_empty_document(doc);
    if !ops.is_empty() {
        return ops;
    }
    let ops = ensure_style_blocks_have_text_leaf(doc);
    if !ops.is_empty() {
        return ops;
    }
    merge_adjacent_text_runs(doc)
}

fn ensure_non_empty_document(doc: &Document) -> Vec<Op> {
    if doc.children.is_empty() {
        return vec![Op::InsertNode {
            path: vec![0],
            node: Node::paragraph(""),
        }];
    }
    Vec::new()
}

fn ensure_style_blocks_have_text_leaf(doc: &Document) -> Vec<Op> {
    fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if classify::is_style(&el.tag) {
                let has_text = el.children.iter().any(|n| matches!(n, Node::Text(_)));
                if !has_text {
                    let mut insert_path = path.clone();
                    insert_path.push(el.children.len());
                    ops.push(Op::InsertNode {
                        path: insert_path,
                        node: Node::text(""),
                    });
                }
            } else {
                walk(&el.children, path, ops);
            }
            path.pop();
        }
    }

    let mut ops = Vec::new();
    walk(&doc.children, &mut Vec::new(), &mut ops);
    ops
}

fn merge_adjacent_text_runs(doc: &Document) -> Vec<Op> {
    fn walk(children: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if classify::is_style(&el.tag) {
                merge_in_block(el, path, ops);
            } else {
                walk(&el.children, path, ops);
            }
            path.pop();
        }
    }

    fn merge_in_block(el: &ElementNode, path: &[usize], ops: &mut Vec<Op>) {
        if el.children.len() < 2 {
            return;
        }
        let mut ix = el.children.len();
        while ix > 0 {
            ix -= 1;
            let Node::Text(right) = &el.children[ix] else {
                continue;
            };

            let mut start = ix;
            while start > 0 {
                let Some(Node::Text(left)) = el.children.get(start - 1) else {
                    break;
                };
                if left.marks != right.marks {
                    break;
                }
                start -= 1;
            }
            if start == ix {
                continue;
            }

            let Some(Node::Text(first)) = el.children.get(start) else {
                continue;
            };
            let mut appended = String::new();
            for node in el.children.iter().take(ix + 1).skip(start + 1) {
                if let Node::Text(t) = node {
                    appended.push_str(&t.text);
                }
            }

            if !appended.is_empty() {
                let mut insert_text_path = path.to_vec();
                insert_text_path.push(start);
                ops.push(Op::InsertText {
                    path: insert_text_path,
                    offset: first.text.len(),
                    text: appended,
                });
            }
            for remove_ix in (start + 1..=ix).rev() {
                let mut remove_path = path.to_vec();
                remove_path.push(remove_ix);
                ops.push(Op::RemoveNode { path: remove_path });
            }
            ix = start;
        }
    }

    let mut ops = Vec::new();
    walk(&doc.children, &mut Vec::new(), &mut ops);
    ops
}

// ---------------------------------------------------------------------------
// Selection normalization: points are pinned to existing text runs after
// every commit. Stale paths resolve to the nearest surviving content.

pub(crate) fn first_text_point(doc: &Document) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => return Some(Point::new(path.clone(), 0)),
                Node::Element(el) => {
                    if let Some(point) = walk(&el.children, path) {
                        return Some(point);
                    }
                }
            }
            path.pop();
        }
        None
    }
    walk(&doc.children, &mut Vec::new())
}

fn normalize_point(doc: &Document, point: &Point) -> Option<Point> {
    match node_at(doc, &point.path) {
        Some(Node::Text(t)) => Some(Point::new(
            point.path.clone(),
            clamp_to_char_boundary(&t.text, point.offset),
        )),
        Some(Node::Element(el)) => {
            let mut base = point.path.clone();
            fn descend(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
                for (ix, node) in children.iter().enumerate() {
                    path.push(ix);
                    match node {
                        Node::Text(_) => return Some(Point::new(path.clone(), 0)),
                        Node::Element(el) => {
                            if let Some(p) = descend(&el.children, path) {
                                return Some(p);
                            }
                        }
                    }
                    path.pop();
                }
                None
            }
            descend(&el.children, &mut base)
        }
        None => {
            let mut path = point.path.clone();
            path.pop();
            if path.is_empty() {
                None
            } else {
                normalize_point(doc, &Point::new(path, 0))
            }
        }
    }
}

pub(crate) fn normalize_selection(doc: &Document, selection: &Selection) -> Selection {
    let fallback = || first_text_point(doc).unwrap_or_else(|| Point::new(vec![0, 0], 0));
    let anchor = normalize_point(doc, &selection.anchor).unwrap_or_else(fallback);
    let focus = normalize_point(doc, &selection.focus).unwrap_or_else(fallback);
    Selection { anchor, focus }
}
