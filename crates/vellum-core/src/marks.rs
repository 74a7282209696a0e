//! Formatting engine: toggling non-nesting inline marks over a selection.

use serde::{Deserialize, Serialize};

use crate::core::{Editor, Marks, Node, Point, Selection, TextNode, clamp_to_char_boundary, node_at};
use crate::error::EngineError;
use crate::ops::{Op, Transaction};
use crate::selection::{
    blocks_between, ordered_points, point_for_global_offset, point_global_offset, total_inline_len,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatMark {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Sub,
    Super,
}

impl FormatMark {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bold" => Some(FormatMark::Bold),
            "italic" => Some(FormatMark::Italic),
            "underline" => Some(FormatMark::Underline),
            "strike" | "strikethrough" => Some(FormatMark::Strike),
            "code" => Some(FormatMark::Code),
            "sub" | "subscript" => Some(FormatMark::Sub),
            "super" | "superscript" => Some(FormatMark::Super),
            _ => None,
        }
    }

    /// The canonical element this mark serializes to.
    pub fn tag(&self) -> &'static str {
        match self {
            FormatMark::Bold => "strong",
            FormatMark::Italic => "em",
            FormatMark::Underline => "u",
            FormatMark::Strike => "s",
            FormatMark::Code => "code",
            FormatMark::Sub => "sub",
            FormatMark::Super => "sup",
        }
    }

    pub fn is_set(&self, marks: &Marks) -> bool {
        match self {
            FormatMark::Bold => marks.bold,
            FormatMark::Italic => marks.italic,
            FormatMark::Underline => marks.underline,
            FormatMark::Strike => marks.strikethrough,
            FormatMark::Code => marks.code,
            FormatMark::Sub => marks.subscript,
            FormatMark::Super => marks.superscript,
        }
    }

    pub fn set(&self, marks: &mut Marks, value: bool) {
        match self {
            FormatMark::Bold => marks.bold = value,
            FormatMark::Italic => marks.italic = value,
            FormatMark::Underline => marks.underline = value,
            FormatMark::Strike => marks.strikethrough = value,
            FormatMark::Code => marks.code = value,
            FormatMark::Sub => marks.subscript = value,
            FormatMark::Super => marks.superscript = value,
        }
    }
}

/// Toggle a mark over the current selection. Uniformly present -> removed
/// (splitting boundary runs so the removal is exact); otherwise added over
/// the whole range. Exactly one transaction per call.
pub fn toggle_mark(editor: &Editor, mark: FormatMark) -> Result<Transaction, EngineError> {
    let sel = editor.selection().clone();
    let source = format!("command:marks.toggle_{}", mark.tag());

    if sel.is_collapsed() {
        let (ops, selection_after) = toggle_mark_at_caret(editor, |mut marks| {
            let target = !mark.is_set(&marks);
            mark.set(&mut marks, target);
            marks
        })?;
        return Ok(Transaction::new(ops)
            .selection_after(selection_after)
            .source(source));
    }

    let all_set = all_selected_runs_have_mark(editor, &sel, mark)?;
    let target = !all_set;
    let (ops, selection_after) = apply_mark_range(editor, &sel, &|mut marks: Marks| {
        mark.set(&mut marks, target);
        marks
    })?;
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source(source))
}

/// Set or clear the link mark over the selection.
pub fn set_link(editor: &Editor, url: Option<String>) -> Result<Transaction, EngineError> {
    let sel = editor.selection().clone();
    let source = "command:marks.set_link";

    if sel.is_collapsed() {
        let (ops, selection_after) = toggle_mark_at_caret(editor, |mut marks| {
            marks.link = url.clone();
            marks
        })?;
        return Ok(Transaction::new(ops)
            .selection_after(selection_after)
            .source(source));
    }

    let (ops, selection_after) = apply_mark_range(editor, &sel, &|mut marks: Marks| {
        marks.link = url.clone();
        marks
    })?;
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source(source))
}

/// Marks at the caret, for host toolbar state.
pub fn active_marks(editor: &Editor) -> Marks {
    let focus = &editor.selection().focus;
    match node_at(editor.doc(), &focus.path) {
        Some(Node::Text(text)) => text.marks.clone(),
        _ => Marks::default(),
    }
}

fn all_selected_runs_have_mark(
    editor: &Editor,
    sel: &Selection,
    mark: FormatMark,
) -> Result<bool, EngineError> {
    let (start, end) = ordered_points(sel);
    let blocks = blocks_between(editor.doc(), sel)?;
    let paths = blocks.paths();
    let last_ix = paths.len().saturating_sub(1);

    let start_inline_ix = start.path.last().copied().unwrap_or(0);
    let end_inline_ix = end.path.last().copied().unwrap_or(0);

    for (block_ix, block_path) in paths.iter().enumerate() {
        let Some(Node::Element(el)) = node_at(editor.doc(), block_path) else {
            return Err(EngineError::SelectionInvalid(
                "selected block left the tree".into(),
            ));
        };
        let children = el.children.as_slice();
        let total_len = total_inline_len(children);
        if total_len == 0 {
            continue;
        }

        let start_global = if block_ix == 0 {
            point_global_offset(children, start_inline_ix, start.offset)
        } else {
            0
        };
        let end_global = if block_ix == last_ix {
            point_global_offset(children, end_inline_ix, end.offset)
        } else {
            total_len
        };
        if start_global >= end_global {
            continue;
        }

        let mut cursor = 0usize;
        for node in children {
            let len = node.inline_len();
            let (node_start, node_end) = (cursor, cursor + len);
            cursor = node_end;
            if end_global <= node_start || start_global >= node_end {
                continue;
            }
            if let Node::Text(t) = node
                && !mark.is_set(&t.marks)
            {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

pub(crate) fn apply_mark_range(
    editor: &Editor,
    sel: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), EngineError> {
    let (start, end) = ordered_points(sel);
    let blocks = blocks_between(editor.doc(), sel)?;
    let paths = blocks.paths().to_vec();
    let last_ix = paths.len().saturating_sub(1);

    let start_inline_ix = start.path.last().copied().unwrap_or(0);
    let end_inline_ix = end.path.last().copied().unwrap_or(0);

    let mut ops: Vec<Op> = Vec::new();
    let mut new_anchor = sel.anchor.clone();
    let mut new_focus = sel.focus.clone();

    for (block_ix, block_path) in paths.iter().enumerate() {
        let Some(Node::Element(el)) = node_at(editor.doc(), block_path) else {
            return Err(EngineError::SelectionInvalid(
                "selected block left the tree".into(),
            ));
        };
        let children = el.children.as_slice();
        let total_len = total_inline_len(children);
        if total_len == 0 {
            continue;
        }

        let start_global = if block_ix == 0 {
            point_global_offset(children, start_inline_ix, start.offset)
        } else {
            0
        };
        let end_global = if block_ix == last_ix {
            point_global_offset(children, end_inline_ix, end.offset)
        } else {
            total_len
        };
        if start_global >= end_global {
            continue;
        }

        let new_children = apply_marks_in_block(children, start_global, end_global, apply);

        for child_ix in (0..children.len()).rev() {
            let mut remove_path = block_path.clone();
            remove_path.push(child_ix);
            ops.push(Op::RemoveNode { path: remove_path });
        }
        for (child_ix, node) in new_children.iter().cloned().enumerate() {
            let mut insert_path = block_path.clone();
            insert_path.push(child_ix);
            ops.push(Op::InsertNode {
                path: insert_path,
                node,
            });
        }

        let in_block =
            |p: &Point| p.path.len() == block_path.len() + 1 && p.path.starts_with(block_path);
        if in_block(&new_anchor) {
            let global = point_global_offset(
                children,
                new_anchor.path.last().copied().unwrap_or(0),
                new_anchor.offset,
            );
            new_anchor = point_for_global_offset(block_path, &new_children, global);
        }
        if in_block(&new_focus) {
            let global = point_global_offset(
                children,
                new_focus.path.last().copied().unwrap_or(0),
                new_focus.offset,
            );
            new_focus = point_for_global_offset(block_path, &new_children, global);
        }
    }

    Ok((
        ops,
        Selection {
            anchor: new_anchor,
            focus: new_focus,
        },
    ))
}

fn apply_marks_in_block(
    children: &[Node],
    start_global: usize,
    end_global: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    if start_global >= end_global {
        return children.to_vec();
    }

    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            cursor += node.inline_len();
            out.push(node.clone());
            continue;
        };
        let node_start = cursor;
        let node_end = cursor + t.text.len();
        cursor = node_end;

        if end_global <= node_start || start_global >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = clamp_to_char_boundary(
            &t.text,
            start_global.saturating_sub(node_start).min(t.text.len()),
        );
        let sel_end = clamp_to_char_boundary(
            &t.text,
            end_global.saturating_sub(node_start).min(t.text.len()),
        );

        if sel_start == 0 && sel_end == t.text.len() {
            let mut next = t.clone();
            next.marks = apply(next.marks);
            out.push(Node::Text(next));
            continue;
        }

        let prefix = &t.text[..sel_start];
        let middle = &t.text[sel_start..sel_end];
        let suffix = &t.text[sel_end..];

        if !prefix.is_empty() {
            out.push(Node::run(prefix, t.marks.clone()));
        }
        if !middle.is_empty() {
            out.push(Node::run(middle, apply(t.marks.clone())));
        }
        if !suffix.is_empty() {
            out.push(Node::run(suffix, t.marks.clone()));
        }
    }

    if out.is_empty() {
        out.push(Node::text(""));
    }
    out
}

/// Collapsed selections split the caret's run and park a zero-width run
/// carrying the toggled marks, so typing continues in the new format.
fn toggle_mark_at_caret(
    editor: &Editor,
    apply: impl Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), EngineError> {
    let focus = editor.selection().focus.clone();
    let (child_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| EngineError::SelectionInvalid("caret is not in a text run".into()))?;

    let Some(Node::Element(el)) = node_at(editor.doc(), block_path) else {
        return Err(EngineError::SelectionInvalid(
            "caret is not in a text block".into(),
        ));
    };
    let Some(Node::Text(text)) = el.children.get(*child_ix) else {
        return Err(EngineError::SelectionInvalid(
            "caret is not in a text run".into(),
        ));
    };

    let cursor = clamp_to_char_boundary(&text.text, focus.offset);
    let marks_before = text.marks.clone();
    let marks_after = apply(marks_before.clone());

    if text.text.is_empty() {
        let selection_after = Selection::collapsed(Point::new(focus.path.clone(), 0));
        return Ok((
            vec![Op::SetTextMarks {
                path: focus.path.clone(),
                marks: marks_after,
            }],
            selection_after,
        ));
    }

    let mut replacement: Vec<Node> = Vec::new();
    let base_child_ix = *child_ix;
    let mut caret_child_ix = base_child_ix;

    let left = &text.text[..cursor];
    let right = &text.text[cursor..];

    if !left.is_empty() {
        replacement.push(Node::run(left, marks_before.clone()));
        caret_child_ix += 1;
    }
    replacement.push(Node::Text(TextNode {
        text: String::new(),
        marks: marks_after,
    }));
    if !right.is_empty() {
        replacement.push(Node::run(right, marks_before));
    }

    let mut ops: Vec<Op> = vec![Op::RemoveNode {
        path: focus.path.clone(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        let mut path = block_path.to_vec();
        path.push(base_child_ix + i);
        ops.push(Op::InsertNode { path, node });
    }

    let mut caret_path = block_path.to_vec();
    caret_path.push(caret_child_ix);
    let selection_after = Selection::collapsed(Point::new(caret_path, 0));
    Ok((ops, selection_after))
}
