//! Table engine: grid construction and row/column/header/border mutations
//! relative to the caret's cell.

use serde::{Deserialize, Serialize};

use crate::core::{AttrPatch, Document, Editor, ElementNode, Node, Point, Selection, node_at};
use crate::error::EngineError;
use crate::ops::{Op, Path, Transaction};
use crate::selection::{point_global_offset, total_inline_len, split_inline_children};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableBorder {
    None,
    Outer,
    Header,
    Cell,
}

impl TableBorder {
    pub fn class(&self) -> &'static str {
        match self {
            TableBorder::None => "table-border-none",
            TableBorder::Outer => "table-border-outer",
            TableBorder::Header => "table-border-header",
            TableBorder::Cell => "table-border-cell",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(TableBorder::None),
            "outer" => Some(TableBorder::Outer),
            "header" => Some(TableBorder::Header),
            "cell" => Some(TableBorder::Cell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Before,
    After,
}

impl Side {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "before" => Some(Side::Before),
            "after" => Some(Side::After),
            _ => None,
        }
    }
}

/// Caret position inside a table, resolved against the live tree.
struct CellContext {
    table_path: Path,
    row_ix: usize,
    cell_ix: usize,
}

fn cell_context(doc: &Document, focus: &Point) -> Result<CellContext, EngineError> {
    let mut path = focus.path.clone();
    while !path.is_empty() {
        if let Some(Node::Element(el)) = node_at(doc, &path)
            && el.tag == "table"
        {
            if focus.path.len() < path.len() + 2 {
                break;
            }
            return Ok(CellContext {
                row_ix: focus.path[path.len()],
                cell_ix: focus.path[path.len() + 1],
                table_path: path,
            });
        }
        path.pop();
    }
    Err(EngineError::SelectionInvalid(
        "caret is not inside a table cell".into(),
    ))
}

fn table_at<'a>(doc: &'a Document, path: &[usize]) -> Result<&'a ElementNode, EngineError> {
    match node_at(doc, path) {
        Some(Node::Element(el)) if el.tag == "table" => Ok(el),
        _ => Err(EngineError::NotFound("table left the tree".into())),
    }
}

fn empty_cell(tag: &str) -> Node {
    Node::element(tag, vec![Node::paragraph("")])
}

fn fresh_row(cols: usize, cell_tag: &str) -> Node {
    Node::element("tr", (0..cols).map(|_| empty_cell(cell_tag)).collect())
}

/// Caret path for the block run inside one cell: row/cell/block/run.
fn cell_caret(table_path: &[usize], row_ix: usize, cell_ix: usize) -> Selection {
    let mut path = table_path.to_vec();
    path.extend([row_ix, cell_ix, 0, 0]);
    Selection::collapsed(Point::new(path, 0))
}

/// Build a rows x cols grid of empty cells and place it at the caret,
/// splitting the current block unless the caret sits at a block edge.
pub fn insert_table(editor: &Editor, rows: usize, cols: usize) -> Result<Transaction, EngineError> {
    if rows == 0 || cols == 0 {
        return Err(EngineError::Unsupported(
            "a table needs at least one row and one column".into(),
        ));
    }
    let doc = editor.doc();
    let focus = editor.selection().focus.clone();
    let (&run_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| EngineError::SelectionInvalid("caret is not in a block".into()))?;
    let block_el = match node_at(doc, block_path) {
        Some(Node::Element(el)) => el,
        _ => return Err(EngineError::SelectionInvalid("caret block left the tree".into())),
    };
    let (&block_ix, parent_path) = block_path.split_last().expect("blocks are nested");

    let mut attrs = std::collections::BTreeMap::new();
    attrs.insert("class".to_string(), TableBorder::Cell.class().to_string());
    let table = Node::Element(ElementNode {
        tag: "table".to_string(),
        attrs,
        children: (0..rows).map(|_| fresh_row(cols, "td")).collect(),
    });

    let global = point_global_offset(&block_el.children, run_ix, focus.offset);
    let total = total_inline_len(&block_el.children);

    let mut ops: Vec<Op> = Vec::new();
    let at = |offset: usize| {
        let mut path = parent_path.to_vec();
        path.push(block_ix + offset);
        path
    };

    let table_ix = if global == 0 {
        ops.push(Op::InsertNode {
            path: at(0),
            node: table,
        });
        block_ix
    } else if global >= total {
        ops.push(Op::InsertNode {
            path: at(1),
            node: table,
        });
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
        ops.push(Op::InsertNode {
            path: at(1),
            node: table,
        });
        ops.push(Op::InsertNode {
            path: at(2),
            node: Node::element(block_el.tag.clone(), after),
        });
        block_ix + 1
    };

    let mut table_path = parent_path.to_vec();
    table_path.push(table_ix);
    Ok(Transaction::new(ops)
        .selection_after(cell_caret(&table_path, 0, 0))
        .source("command:table.insert"))
}

pub fn add_row(editor: &Editor, side: Side) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let ctx = cell_context(doc, &editor.selection().focus)?;
    let table_el = table_at(doc, &ctx.table_path)?;
    let row_el = table_el
        .children
        .get(ctx.row_ix)
        .and_then(Node::as_element)
        .ok_or_else(|| EngineError::NotFound("table row left the tree".into()))?;
    let cols = row_el.children.len().max(1);

    let insert_ix = match side {
        Side::Before => ctx.row_ix,
        Side::After => ctx.row_ix + 1,
    };
    let mut path = ctx.table_path.clone();
    path.push(insert_ix);

    Ok(Transaction::new(vec![Op::InsertNode {
        path,
        node: fresh_row(cols, "td"),
    }])
    .selection_after(cell_caret(
        &ctx.table_path,
        insert_ix,
        ctx.cell_ix.min(cols - 1),
    ))
    .source("command:table.add_row"))
}

pub fn add_col(editor: &Editor, side: Side) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let sel = editor.selection().clone();
    let ctx = cell_context(doc, &sel.focus)?;
    let table_el = table_at(doc, &ctx.table_path)?;

    let mut ops: Vec<Op> = Vec::new();
    for (r, row) in table_el.children.iter().enumerate() {
        let Some(row_el) = row.as_element() else {
            continue;
        };
        let base = match side {
            Side::Before => ctx.cell_ix,
            Side::After => ctx.cell_ix + 1,
        };
        let insert_ix = base.min(row_el.children.len());
        // Header rows grow with header cells.
        let tag = row_el
            .children
            .first()
            .and_then(Node::as_element)
            .map_or("td", |cell| if cell.tag == "th" { "th" } else { "td" });
        let mut path = ctx.table_path.clone();
        path.extend([r, insert_ix]);
        ops.push(Op::InsertNode {
            path,
            node: empty_cell(tag),
        });
    }

    let insert_ix = match side {
        Side::Before => ctx.cell_ix,
        Side::After => ctx.cell_ix + 1,
    };
    Ok(Transaction::new(ops)
        .selection_after(cell_caret(&ctx.table_path, ctx.row_ix, insert_ix))
        .source("command:table.add_col"))
}

/// Prepend an all-header row spanning the table's columns. A table whose
/// first row is already all headers is left alone.
pub fn add_header(editor: &Editor) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let sel = editor.selection().clone();
    let ctx = cell_context(doc, &sel.focus)?;
    let table_el = table_at(doc, &ctx.table_path)?;

    let first_row = table_el
        .children
        .first()
        .and_then(Node::as_element)
        .ok_or_else(|| EngineError::NotFound("table has no rows".into()))?;
    let already_header = !first_row.children.is_empty()
        && first_row
            .children
            .iter()
            .all(|c| matches!(c, Node::Element(el) if el.tag == "th"));
    if already_header {
        return Ok(Transaction::new(Vec::new())
            .selection_after(sel)
            .source("command:table.add_header"));
    }

    let cols = first_row.children.len().max(1);
    let mut path = ctx.table_path.clone();
    path.push(0);

    // Existing rows shift down by one.
    let table_path = ctx.table_path.clone();
    let shift = |point: &Point| -> Point {
        let mut point = point.clone();
        if point.path.len() > table_path.len() && point.path.starts_with(&table_path) {
            point.path[table_path.len()] += 1;
        }
        point
    };
    let selection_after = Selection {
        anchor: shift(&sel.anchor),
        focus: shift(&sel.focus),
    };

    Ok(Transaction::new(vec![Op::InsertNode {
        path,
        node: fresh_row(cols, "th"),
    }])
    .selection_after(selection_after)
    .source("command:table.add_header"))
}

pub fn delete_row(editor: &Editor) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let ctx = cell_context(doc, &editor.selection().focus)?;
    let table_el = table_at(doc, &ctx.table_path)?;

    if table_el.children.len() <= 1 {
        return delete_table(editor);
    }

    let mut path = ctx.table_path.clone();
    path.push(ctx.row_ix);
    let landing_row = ctx.row_ix.min(table_el.children.len() - 2);
    let landing_cols = table_el
        .children
        .get(if landing_row < ctx.row_ix {
            landing_row
        } else {
            landing_row + 1
        })
        .and_then(Node::as_element)
        .map_or(1, |row| row.children.len().max(1));

    Ok(Transaction::new(vec![Op::RemoveNode { path }])
        .selection_after(cell_caret(
            &ctx.table_path,
            landing_row,
            ctx.cell_ix.min(landing_cols - 1),
        ))
        .source("command:table.delete_row"))
}

pub fn delete_col(editor: &Editor) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let ctx = cell_context(doc, &editor.selection().focus)?;
    let table_el = table_at(doc, &ctx.table_path)?;

    let caret_row_cols = table_el
        .children
        .get(ctx.row_ix)
        .and_then(Node::as_element)
        .map_or(0, |row| row.children.len());
    if caret_row_cols <= 1 {
        return delete_table(editor);
    }

    let mut ops: Vec<Op> = Vec::new();
    for (r, row) in table_el.children.iter().enumerate() {
        let Some(row_el) = row.as_element() else {
            continue;
        };
        if row_el.children.is_empty() {
            continue;
        }
        let mut path = ctx.table_path.clone();
        path.extend([r, ctx.cell_ix.min(row_el.children.len() - 1)]);
        ops.push(Op::RemoveNode { path });
    }

    Ok(Transaction::new(ops)
        .selection_after(cell_caret(
            &ctx.table_path,
            ctx.row_ix,
            ctx.cell_ix.min(caret_row_cols - 2),
        ))
        .source("command:table.delete_col"))
}

/// Replace the whole table with an empty paragraph holding the caret.
pub fn delete_table(editor: &Editor) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let ctx = cell_context(doc, &editor.selection().focus)?;
    table_at(doc, &ctx.table_path)?;

    let (&table_ix, parent_path) = ctx.table_path.split_last().expect("tables are nested");
    let mut caret_path = parent_path.to_vec();
    caret_path.extend([table_ix, 0]);

    Ok(Transaction::new(vec![
        Op::RemoveNode {
            path: ctx.table_path.clone(),
        },
        Op::InsertNode {
            path: ctx.table_path.clone(),
            node: Node::paragraph(""),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(caret_path, 0)))
    .source("command:table.delete"))
}

pub fn set_border(editor: &Editor, border: TableBorder) -> Result<Transaction, EngineError> {
    let doc = editor.doc();
    let sel = editor.selection().clone();
    let ctx = cell_context(doc, &sel.focus)?;
    table_at(doc, &ctx.table_path)?;

    Ok(Transaction::new(vec![Op::SetNodeAttrs {
        path: ctx.table_path,
        patch: AttrPatch::set_one("class", border.class()),
    }])
    .selection_after(sel)
    .source("command:table.set_border"))
}
