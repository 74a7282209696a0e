//! Block structure engine: style tags, context-sensitive dents, list item
//! toggling, and the Enter behaviors inside blockquotes and lists.

use serde::{Deserialize, Serialize};

use crate::classify;
use crate::core::{Document, Editor, ElementNode, Node, Point, Selection, node_at};
use crate::error::EngineError;
use crate::ops::{Op, Path, Transaction};
use crate::selection::{blocks_between, point_global_offset, split_inline_children};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleTag {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Heading4,
    Heading5,
    Heading6,
}

impl StyleTag {
    pub fn tag(&self) -> &'static str {
        match self {
            StyleTag::Paragraph => "p",
            StyleTag::Heading1 => "h1",
            StyleTag::Heading2 => "h2",
            StyleTag::Heading3 => "h3",
            StyleTag::Heading4 => "h4",
            StyleTag::Heading5 => "h5",
            StyleTag::Heading6 => "h6",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "p" => Some(StyleTag::Paragraph),
            "h1" => Some(StyleTag::Heading1),
            "h2" => Some(StyleTag::Heading2),
            "h3" => Some(StyleTag::Heading3),
            "h4" => Some(StyleTag::Heading4),
            "h5" => Some(StyleTag::Heading5),
            "h6" => Some(StyleTag::Heading6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    Ordered,
    Unordered,
}

impl ListType {
    pub fn tag(&self) -> &'static str {
        match self {
            ListType::Ordered => "ol",
            ListType::Unordered => "ul",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ol" | "ordered" => Some(ListType::Ordered),
            "ul" | "unordered" => Some(ListType::Unordered),
            _ => None,
        }
    }
}

type Remap = Box<dyn Fn(&Point) -> Option<Point>>;

fn remap_selection(sel: &Selection, remaps: &[Remap]) -> Selection {
    let map_point = |point: &Point| -> Point {
        for remap in remaps {
            if let Some(mapped) = remap(point) {
                return mapped;
            }
        }
        point.clone()
    };
    Selection {
        anchor: map_point(&sel.anchor),
        focus: map_point(&sel.focus),
    }
}

fn element_at<'a>(doc: &'a Document, path: &[usize]) -> Result<&'a ElementNode, EngineError> {
    match node_at(doc, path) {
        Some(Node::Element(el)) => Ok(el),
        Some(Node::Text(_)) => Err(EngineError::StructureViolation(
            "expected an element".into(),
        )),
        None => Err(EngineError::NotFound(format!("no node at {path:?}"))),
    }
}

fn nearest_ancestor_tag(doc: &Document, from: &[usize], tag: &str) -> Option<Path> {
    let mut path = from.to_vec();
    while !path.is_empty() {
        if let Some(Node::Element(el)) = node_at(doc, &path)
            && el.tag == tag
        {
            return Some(path);
        }
        path.pop();
    }
    None
}

fn first_text_index(children: &[Node]) -> usize {
    children
        .iter()
        .position(|n| matches!(n, Node::Text(_)))
        .unwrap_or(0)
}

/// Replace the style tag of every intersected leaf block. Mixed prior
/// styles are fine; descendant content is untouched.
pub fn set_style(editor: &Editor, style: StyleTag) -> Result<Transaction, EngineError> {
    let sel = editor.selection().clone();
    let blocks = blocks_between(editor.doc(), &sel)?;

    let mut ops: Vec<Op> = Vec::new();
    for path in blocks.paths() {
        let el = element_at(editor.doc(), path)?;
        if el.tag != style.tag() {
            ops.push(Op::SetTag {
                path: path.clone(),
                tag: style.tag().to_string(),
            });
        }
    }
    Ok(Transaction::new(ops)
        .selection_after(sel)
        .source("command:block.set_style"))
}

/// Deprecated alias for [`set_style`] that verifies the prior style first;
/// blocks whose style differs from `old` are left alone.
pub fn replace_style(
    editor: &Editor,
    old: StyleTag,
    new: StyleTag,
) -> Result<Transaction, EngineError> {
    let sel = editor.selection().clone();
    let blocks = blocks_between(editor.doc(), &sel)?;

    let mut ops: Vec<Op> = Vec::new();
    for path in blocks.paths() {
        let el = element_at(editor.doc(), path)?;
        if el.tag == old.tag() && old != new {
            ops.push(Op::SetTag {
                path: path.clone(),
                tag: new.tag().to_string(),
            });
        }
    }
    Ok(Transaction::new(ops)
        .selection_after(sel)
        .source("command:block.replace_style"))
}

/// One contiguous run of units (blocks or list items) under one parent.
struct Run {
    parent: Path,
    first: usize,
    last: usize,
    in_list: bool,
}

/// Group intersected leaf blocks into contiguous runs sharing a container.
/// For a block inside a list item the unit is the item itself.
fn runs_for_selection(doc: &Document, sel: &Selection) -> Result<Vec<Run>, EngineError> {
    let blocks = blocks_between(doc, sel)?;
    let mut runs: Vec<Run> = Vec::new();

    for block_path in blocks.paths() {
        let (&block_ix, block_parent) = block_path.split_last().expect("leaf blocks are nested");
        let parent_is_li = !block_parent.is_empty()
            && matches!(node_at(doc, block_parent), Some(Node::Element(el)) if el.tag == "li");

        let (parent, ix, in_list) = if parent_is_li {
            let (&li_ix, list_path) = block_parent.split_last().expect("list items are nested");
            (list_path.to_vec(), li_ix, true)
        } else {
            (block_parent.to_vec(), block_ix, false)
        };

        if let Some(last) = runs.last_mut()
            && last.parent == parent
            && last.in_list == in_list
            && ix <= last.last + 1
        {
            last.last = last.last.max(ix);
            continue;
        }
        runs.push(Run {
            parent,
            first: ix,
            last: ix,
            in_list,
        });
    }
    Ok(runs)
}

/// Context-sensitive indent. List items nest one level deeper under their
/// previous sibling; anything else gains a blockquote wrapper.
pub fn indent(editor: &Editor) -> Result<Transaction, EngineError> {
    let sel = editor.selection().clone();
    let doc = editor.doc();
    let runs = runs_for_selection(doc, &sel)?;

    let mut ops: Vec<Op> = Vec::new();
    let mut remaps: Vec<Remap> = Vec::new();

    // Later runs first so earlier sibling indices stay valid.
    for run in runs.iter().rev() {
        if run.in_list {
            indent_list_run(doc, run, &mut ops, &mut remaps)?;
        } else {
            wrap_run_in_quote(doc, run, &mut ops, &mut remaps)?;
        }
    }

    let selection_after = remap_selection(&sel, &remaps);
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:block.indent"))
}

fn indent_list_run(
    doc: &Document,
    run: &Run,
    ops: &mut Vec<Op>,
    remaps: &mut Vec<Remap>,
) -> Result<(), EngineError> {
    // The first item of a list has nothing to nest under; deliberate no-op.
    if run.first == 0 {
        return Ok(());
    }
    let list_el = element_at(doc, &run.parent)?;
    let list_tag = list_el.tag.clone();
    if run.last >= list_el.children.len() {
        return Err(EngineError::SelectionInvalid(
            "selected list item left the tree".into(),
        ));
    }

    let mut prev_li_path = run.parent.clone();
    prev_li_path.push(run.first - 1);
    let prev_li = element_at(doc, &prev_li_path)?;

    // Reuse a trailing nested list of the same type, or open a new one.
    let (nest_ix, base) = match prev_li.children.last() {
        Some(Node::Element(nest)) if nest.tag == list_tag => {
            (prev_li.children.len() - 1, nest.children.len())
        }
        _ => (prev_li.children.len(), 0),
    };

    let items: Vec<Node> = list_el.children[run.first..=run.last].to_vec();

    for ix in (run.first..=run.last).rev() {
        let mut path = run.parent.clone();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }

    if base == 0 {
        let mut insert_path = prev_li_path.clone();
        insert_path.push(nest_ix);
        ops.push(Op::InsertNode {
            path: insert_path,
            node: Node::element(list_tag, items),
        });
    } else {
        for (j, item) in items.into_iter().enumerate() {
            let mut insert_path = prev_li_path.clone();
            insert_path.push(nest_ix);
            insert_path.push(base + j);
            ops.push(Op::InsertNode {
                path: insert_path,
                node: item,
            });
        }
    }

    let parent = run.parent.clone();
    let (first, last) = (run.first, run.last);
    remaps.push(Box::new(move |point: &Point| {
        if point.path.len() <= parent.len() || !point.path.starts_with(&parent) {
            return None;
        }
        let ix = point.path[parent.len()];
        if ix < first || ix > last {
            return None;
        }
        let mut new_path = prev_li_path.clone();
        new_path.push(nest_ix);
        new_path.push(base + (ix - first));
        new_path.extend_from_slice(&point.path[parent.len() + 1..]);
        Some(Point::new(new_path, point.offset))
    }));
    Ok(())
}

fn wrap_run_in_quote(
    doc: &Document,
    run: &Run,
    ops: &mut Vec<Op>,
    remaps: &mut Vec<Remap>,
) -> Result<(), EngineError> {
    let children = crate::core::children_at(doc, &run.parent).ok_or_else(|| {
        EngineError::SelectionInvalid("selection parent is not a container".into())
    })?;
    if run.last >= children.len() {
        return Err(EngineError::SelectionInvalid(
            "selected block left the tree".into(),
        ));
    }

    let selected: Vec<Node> = children[run.first..=run.last].to_vec();
    let quote = Node::element("blockquote", selected);

    for ix in (run.first..=run.last).rev() {
        let mut path = run.parent.clone();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    let mut insert_path = run.parent.clone();
    insert_path.push(run.first);
    ops.push(Op::InsertNode {
        path: insert_path,
        node: quote,
    });

    let parent = run.parent.clone();
    let (first, last) = (run.first, run.last);
    remaps.push(Box::new(move |point: &Point| {
        if point.path.len() < parent.len() + 2 || !point.path.starts_with(&parent) {
            return None;
        }
        let ix = point.path[parent.len()];
        if ix < first || ix > last {
            return None;
        }
        let mut new_path = parent.clone();
        new_path.push(first);
        new_path.push(ix - first);
        new_path.extend_from_slice(&point.path[parent.len() + 1..]);
        Some(Point::new(new_path, point.offset))
    }));
    Ok(())
}

/// Context-sensitive outdent. Nested list items lift one level; blocks in a
/// blockquote lose one wrapper; top-level blocks are a no-op.
pub fn outdent(editor: &Editor) -> Result<Transaction, EngineError> {
    let sel = editor.selection().clone();
    let doc = editor.doc();
    let runs = runs_for_selection(doc, &sel)?;

    let mut ops: Vec<Op> = Vec::new();
    let mut remaps: Vec<Remap> = Vec::new();
    let mut unwrapped_quotes: Vec<Path> = Vec::new();

    for run in runs.iter().rev() {
        if run.in_list {
            for li_ix in (run.first..=run.last).rev() {
                let mut li_path = run.parent.clone();
                li_path.push(li_ix);
                outdent_list_item(doc, &li_path, &mut ops, &mut remaps)?;
            }
            continue;
        }

        let mut probe = run.parent.clone();
        probe.push(run.first);
        let Some(quote_path) = nearest_ancestor_tag(doc, &probe, "blockquote") else {
            continue; // top level: deliberate no-op
        };
        if unwrapped_quotes.contains(&quote_path) {
            continue;
        }
        unwrapped_quotes.push(quote_path.clone());
        unwrap_quote(doc, &quote_path, &mut ops, &mut remaps)?;
    }

    let selection_after = remap_selection(&sel, &remaps);
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source("command:block.outdent"))
}

fn outdent_list_item(
    doc: &Document,
    li_path: &[usize],
    ops: &mut Vec<Op>,
    remaps: &mut Vec<Remap>,
) -> Result<(), EngineError> {
    let (&li_ix, list_path) = li_path.split_last().expect("list items are nested");
    let list_el = element_at(doc, list_path)?;

    // Depth 0: the list sits outside any item; outdent is a no-op there
    // (toggling the list off is a different command).
    let Some((&list_ix, outer_li_path)) = list_path.split_last() else {
        return Ok(());
    };
    if !matches!(node_at(doc, outer_li_path), Some(Node::Element(el)) if el.tag == "li") {
        return Ok(());
    }

    // Lifting an interior item would split the list; only the last item
    // (or an only item) comes out. Deliberate no-op otherwise.
    let item_count = list_el.children.len();
    if li_ix + 1 != item_count {
        return Ok(());
    }

    let li_node = node_at(doc, li_path)
        .cloned()
        .ok_or_else(|| EngineError::NotFound("list item left the tree".into()))?;

    ops.push(Op::RemoveNode {
        path: li_path.to_vec(),
    });
    if item_count == 1 {
        let mut nested_path = outer_li_path.to_vec();
        nested_path.push(list_ix);
        ops.push(Op::RemoveNode { path: nested_path });
    }

    let (&outer_li_ix, outer_list_path) = outer_li_path.split_last().expect("items are nested");
    let mut insert_path = outer_list_path.to_vec();
    insert_path.push(outer_li_ix + 1);
    ops.push(Op::InsertNode {
        path: insert_path.clone(),
        node: li_node,
    });

    let old_prefix = li_path.to_vec();
    remaps.push(Box::new(move |point: &Point| {
        if point.path.len() <= old_prefix.len() || !point.path.starts_with(&old_prefix) {
            return None;
        }
        let mut new_path = insert_path.clone();
        new_path.extend_from_slice(&point.path[old_prefix.len()..]);
        Some(Point::new(new_path, point.offset))
    }));
    Ok(())
}

fn unwrap_quote(
    doc: &Document,
    quote_path: &[usize],
    ops: &mut Vec<Op>,
    remaps: &mut Vec<Remap>,
) -> Result<(), EngineError> {
    let quote_el = element_at(doc, quote_path)?;
    let children = quote_el.children.clone();
    let (&quote_ix, parent_path) = quote_path.split_last().expect("quotes are nested");

    ops.push(Op::RemoveNode {
        path: quote_path.to_vec(),
    });
    for (i, node) in children.into_iter().enumerate() {
        let mut path = parent_path.to_vec();
        path.push(quote_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let quote_path = quote_path.to_vec();
    let parent_path = parent_path.to_vec();
    remaps.push(Box::new(move |point: &Point| {
        if point.path.len() < quote_path.len() + 1 || !point.path.starts_with(&quote_path) {
            return None;
        }
        let inner_ix = point.path[quote_path.len()];
        let mut new_path = parent_path.clone();
        new_path.push(quote_ix + inner_ix);
        new_path.extend_from_slice(&point.path[quote_path.len() + 1..]);
        Some(Point::new(new_path, point.offset))
    }));
    Ok(())
}

/// Toggle list wrapping for the intersected blocks.
pub fn toggle_list(editor: &Editor, ltype: ListType) -> Result<Transaction, EngineError> {
    let sel = editor.selection().clone();
    let doc = editor.doc();
    let blocks = blocks_between(doc, &sel)?;
    let paths = blocks.paths().to_vec();

    // Classify every block by its enclosing list, if any.
    let mut list_of_block: Vec<Option<(Path, String, usize)>> = Vec::new();
    for block_path in &paths {
        let (_, block_parent) = block_path.split_last().expect("leaf blocks are nested");
        let entry = if !block_parent.is_empty()
            && matches!(node_at(doc, block_parent), Some(Node::Element(el)) if el.tag == "li")
        {
            let (&li_ix, list_path) = block_parent.split_last().expect("items are nested");
            let list_el = element_at(doc, list_path)?;
            Some((list_path.to_vec(), list_el.tag.clone(), li_ix))
        } else {
            None
        };
        list_of_block.push(entry);
    }

    let all_in_target = !list_of_block.is_empty()
        && list_of_block
            .iter()
            .all(|e| e.as_ref().is_some_and(|(_, tag, _)| tag == ltype.tag()));

    let mut ops: Vec<Op> = Vec::new();
    let mut remaps: Vec<Remap> = Vec::new();

    if all_in_target {
        // Unwrap the covered item runs, list by list, later lists first.
        let mut per_list: Vec<(Path, usize, usize)> = Vec::new();
        for entry in list_of_block.iter().flatten() {
            let (list_path, _, li_ix) = entry;
            if let Some(last) = per_list.last_mut()
                && &last.0 == list_path
            {
                last.1 = last.1.min(*li_ix);
                last.2 = last.2.max(*li_ix);
                continue;
            }
            per_list.push((list_path.clone(), *li_ix, *li_ix));
        }
        for (list_path, a, b) in per_list.iter().rev() {
            unwrap_list_items(doc, list_path, *a, *b, &mut ops, &mut remaps)?;
        }
    } else if let Some(Some((list_path, tag, _))) = list_of_block.first()
        && tag != ltype.tag()
    {
        // Retyping bifurcates multi-item lists; only a single-item list
        // changes type. Deliberate no-op otherwise.
        let list_el = element_at(doc, list_path)?;
        if list_el.children.len() == 1 {
            ops.push(Op::SetTag {
                path: list_path.clone(),
                tag: ltype.tag().to_string(),
            });
        }
    } else {
        // Wrap the contiguous non-list runs into fresh lists.
        let runs = runs_for_selection(doc, &sel)?;
        for run in runs.iter().rev() {
            if run.in_list {
                continue;
            }
            wrap_run_in_list(doc, run, ltype, &mut ops, &mut remaps)?;
        }
    }

    let selection_after = remap_selection(&sel, &remaps);
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source(format!("command:list.toggle_{}", ltype.tag())))
}

fn unwrap_list_items(
    doc: &Document,
    list_path: &[usize],
    a: usize,
    b: usize,
    ops: &mut Vec<Op>,
    remaps: &mut Vec<Remap>,
) -> Result<(), EngineError> {
    let list_el = element_at(doc, list_path)?;
    let n = list_el.children.len();
    if b >= n {
        return Err(EngineError::SelectionInvalid(
            "selected list item left the tree".into(),
        ));
    }
    let (&list_ix, parent_path) = list_path.split_last().expect("lists are nested");

    let covered: Vec<Node> = list_el.children[a..=b].to_vec();
    let lifted: Vec<Node> = covered
        .iter()
        .filter_map(Node::as_element)
        .flat_map(|li| li.children.iter().cloned())
        .collect();

    // Cumulative child offsets per covered item, for selection remapping.
    let mut cum: Vec<usize> = Vec::with_capacity(covered.len());
    let mut acc = 0usize;
    for li in &covered {
        cum.push(acc);
        acc += li.as_element().map_or(0, |el| el.children.len());
    }

    let full = a == 0 && b + 1 == n;
    let prefix = a == 0 && !full;
    let suffix = b + 1 == n && !full;

    let base = if full || prefix { list_ix } else { list_ix + 1 };

    if full {
        ops.push(Op::RemoveNode {
            path: list_path.to_vec(),
        });
        for (j, node) in lifted.iter().cloned().enumerate() {
            let mut path = parent_path.to_vec();
            path.push(list_ix + j);
            ops.push(Op::InsertNode { path, node });
        }
    } else if prefix || suffix {
        for ix in (a..=b).rev() {
            let mut path = list_path.to_vec();
            path.push(ix);
            ops.push(Op::RemoveNode { path });
        }
        for (j, node) in lifted.iter().cloned().enumerate() {
            let mut path = parent_path.to_vec();
            path.push(base + j);
            ops.push(Op::InsertNode { path, node });
        }
    } else {
        // Interior run: the list splits around the lifted blocks.
        let head: Vec<Node> = list_el.children[..a].to_vec();
        let tail: Vec<Node> = list_el.children[b + 1..].to_vec();
        let list_tag = list_el.tag.clone();
        ops.push(Op::RemoveNode {
            path: list_path.to_vec(),
        });
        let mut insert = |offset: usize, node: Node| {
            let mut path = parent_path.to_vec();
            path.push(list_ix + offset);
            ops.push(Op::InsertNode { path, node });
        };
        insert(0, Node::element(list_tag.clone(), head));
        for (j, node) in lifted.iter().cloned().enumerate() {
            insert(1 + j, node);
        }
        insert(1 + lifted.len(), Node::element(list_tag, tail));
    }

    let list_path = list_path.to_vec();
    let parent_path = parent_path.to_vec();
    remaps.push(Box::new(move |point: &Point| {
        if point.path.len() < list_path.len() + 2 || !point.path.starts_with(&list_path) {
            return None;
        }
        let li_ix = point.path[list_path.len()];
        if li_ix < a || li_ix > b {
            return None;
        }
        let child_ix = point.path[list_path.len() + 1];
        let mut new_path = parent_path.clone();
        new_path.push(base + cum[li_ix - a] + child_ix);
        new_path.extend_from_slice(&point.path[list_path.len() + 2..]);
        Some(Point::new(new_path, point.offset))
    }));
    Ok(())
}

fn wrap_run_in_list(
    doc: &Document,
    run: &Run,
    ltype: ListType,
    ops: &mut Vec<Op>,
    remaps: &mut Vec<Remap>,
) -> Result<(), EngineError> {
    let children = crate::core::children_at(doc, &run.parent).ok_or_else(|| {
        EngineError::SelectionInvalid("selection parent is not a container".into())
    })?;
    if run.last >= children.len() {
        return Err(EngineError::SelectionInvalid(
            "selected block left the tree".into(),
        ));
    }

    let items: Vec<Node> = children[run.first..=run.last]
        .iter()
        .map(|block| Node::element("li", vec![block.clone()]))
        .collect();

    for ix in (run.first..=run.last).rev() {
        let mut path = run.parent.clone();
        path.push(ix);
        ops.push(Op::RemoveNode { path });
    }
    let mut insert_path = run.parent.clone();
    insert_path.push(run.first);
    ops.push(Op::InsertNode {
        path: insert_path,
        node: Node::element(ltype.tag(), items),
    });

    let parent = run.parent.clone();
    let (first, last) = (run.first, run.last);
    remaps.push(Box::new(move |point: &Point| {
        if point.path.len() < parent.len() + 2 || !point.path.starts_with(&parent) {
            return None;
        }
        let ix = point.path[parent.len()];
        if ix < first || ix > last {
            return None;
        }
        let mut new_path = parent.clone();
        new_path.push(first);
        new_path.push(ix - first);
        new_path.push(0);
        new_path.extend_from_slice(&point.path[parent.len() + 1..]);
        Some(Point::new(new_path, point.offset))
    }));
    Ok(())
}

/// Enter inside a blockquote: split into two sibling quotes at the caret.
/// At the end of an empty block in a depth-1 quote, exit the quote instead.
pub fn blockquote_enter(editor: &Editor) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let focus = editor.selection().focus.clone();
    let (&run_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| EngineError::SelectionInvalid("caret is not in a block".into()))?;
    let block_path = block_path.to_vec();

    let quote_path = nearest_ancestor_tag(doc, &block_path, "blockquote")
        .ok_or_else(|| EngineError::Unsupported("caret is not inside a blockquote".into()))?;
    if block_path.len() != quote_path.len() + 1 {
        return Err(EngineError::Unsupported(
            "enter inside nested structure within a blockquote".into(),
        ));
    }
    let block_ix = block_path[quote_path.len()];
    let quote_el = element_at(doc, &quote_path)?;
    let block_el = element_at(doc, &block_path)?;
    let (&quote_ix, parent_path) = quote_path.split_last().expect("quotes are nested");

    let depth_one = nearest_ancestor_tag(doc, parent_path, "blockquote").is_none();
    if depth_one && classify::is_empty_element(block_el) {
        return Ok(exit_quote(quote_el, &quote_path, quote_ix, parent_path, block_ix)
            .source("command:block.blockquote_enter"));
    }

    let global = point_global_offset(&block_el.children, run_ix, focus.offset);
    let (before, after) = split_inline_children(&block_el.children, global);

    let first_block = Node::Element(ElementNode {
        tag: block_el.tag.clone(),
        attrs: block_el.attrs.clone(),
        children: before,
    });
    let second_block = Node::element(block_el.tag.clone(), after);

    let mut first_children: Vec<Node> = quote_el.children[..block_ix].to_vec();
    first_children.push(first_block);
    let mut second_children: Vec<Node> = vec![second_block];
    second_children.extend(quote_el.children[block_ix + 1..].iter().cloned());

    let caret_run = first_text_index(
        second_children[0]
            .as_element()
            .map(|el| el.children.as_slice())
            .unwrap_or(&[]),
    );

    let mut first_path = parent_path.to_vec();
    first_path.push(quote_ix);
    let mut second_path = parent_path.to_vec();
    second_path.push(quote_ix + 1);

    let mut caret_path = second_path.clone();
    caret_path.extend([0, caret_run]);

    Ok(Transaction::new(vec![
        Op::RemoveNode {
            path: quote_path.clone(),
        },
        Op::InsertNode {
            path: first_path,
            node: Node::element("blockquote", first_children),
        },
        Op::InsertNode {
            path: second_path,
            node: Node::element("blockquote", second_children),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(caret_path, 0)))
    .source("command:block.blockquote_enter"))
}

fn exit_quote(
    quote_el: &ElementNode,
    quote_path: &[usize],
    quote_ix: usize,
    parent_path: &[usize],
    block_ix: usize,
) -> Transaction {
    let block = quote_el.children[block_ix].clone();
    let caret_run = first_text_index(
        block
            .as_element()
            .map(|el| el.children.as_slice())
            .unwrap_or(&[]),
    );

    let mut ops: Vec<Op> = Vec::new();
    let exit_ix;

    if quote_el.children.len() == 1 {
        ops.push(Op::RemoveNode {
            path: quote_path.to_vec(),
        });
        let mut path = parent_path.to_vec();
        path.push(quote_ix);
        ops.push(Op::InsertNode {
            path,
            node: block,
        });
        exit_ix = quote_ix;
    } else if block_ix + 1 == quote_el.children.len() {
        let mut block_path = quote_path.to_vec();
        block_path.push(block_ix);
        ops.push(Op::RemoveNode { path: block_path });
        let mut path = parent_path.to_vec();
        path.push(quote_ix + 1);
        ops.push(Op::InsertNode {
            path,
            node: block,
        });
        exit_ix = quote_ix + 1;
    } else {
        // Interior block: split the quote around the exiting block.
        let head: Vec<Node> = quote_el.children[..block_ix].to_vec();
        let tail: Vec<Node> = quote_el.children[block_ix + 1..].to_vec();
        ops.push(Op::RemoveNode {
            path: quote_path.to_vec(),
        });
        let mut at = |offset: usize| {
            let mut path = parent_path.to_vec();
            path.push(quote_ix + offset);
            path
        };
        ops.push(Op::InsertNode {
            path: at(0),
            node: Node::element("blockquote", head),
        });
        ops.push(Op::InsertNode {
            path: at(1),
            node: block,
        });
        ops.push(Op::InsertNode {
            path: at(2),
            node: Node::element("blockquote", tail),
        });
        exit_ix = quote_ix + 1;
    }

    let mut caret_path = parent_path.to_vec();
    caret_path.extend([exit_ix, caret_run]);
    Transaction::new(ops).selection_after(Selection::collapsed(Point::new(caret_path, 0)))
}

/// Enter inside a list item: split the block into two items at the same
/// depth. A nested sublist follows the new second item.
pub fn list_enter(editor: &Editor) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let focus = editor.selection().focus.clone();
    let (&run_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| EngineError::SelectionInvalid("caret is not in a block".into()))?;
    let block_path = block_path.to_vec();

    let (&block_ix, li_path) = block_path
        .split_last()
        .ok_or_else(|| EngineError::SelectionInvalid("caret is not in a list".into()))?;
    let li_el = match node_at(doc, li_path) {
        Some(Node::Element(el)) if el.tag == "li" => el,
        _ => {
            return Err(EngineError::Unsupported(
                "caret is not inside a list item".into(),
            ));
        }
    };
    if block_ix != 0 {
        return Err(EngineError::Unsupported(
            "caret is not in the item's block".into(),
        ));
    }
    let block_el = element_at(doc, &block_path)?;
    let (&li_ix, list_path) = li_path.split_last().expect("items are nested");

    let global = point_global_offset(&block_el.children, run_ix, focus.offset);
    let (before, after) = split_inline_children(&block_el.children, global);

    let first_item = Node::element(
        "li",
        vec![Node::Element(ElementNode {
            tag: block_el.tag.clone(),
            attrs: block_el.attrs.clone(),
            children: before,
        })],
    );
    let second_block = Node::element(block_el.tag.clone(), after);
    let caret_run = first_text_index(
        second_block
            .as_element()
            .map(|el| el.children.as_slice())
            .unwrap_or(&[]),
    );
    let mut second_children = vec![second_block];
    second_children.extend(li_el.children[1..].iter().cloned());
    let second_item = Node::element("li", second_children);

    let mut first_path = list_path.to_vec();
    first_path.push(li_ix);
    let mut second_path = list_path.to_vec();
    second_path.push(li_ix + 1);

    let mut caret_path = second_path.clone();
    caret_path.extend([0, caret_run]);

    Ok(Transaction::new(vec![
        Op::RemoveNode {
            path: li_path.to_vec(),
        },
        Op::InsertNode {
            path: first_path,
            node: first_item,
        },
        Op::InsertNode {
            path: second_path,
            node: second_item,
        },
    ])
    .selection_after(Selection::collapsed(Point::new(caret_path, 0)))
    .source("command:block.list_enter"))
}
