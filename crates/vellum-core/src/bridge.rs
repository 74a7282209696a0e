//! Host bridge: the string-id command surface, the outbound event queue,
//! and the search feature. One command is in flight at a time; a command
//! either commits fully or leaves the editor untouched and reports an
//! [`ErrorSignal`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::block::{self, ListType, StyleTag};
use crate::core::{Editor, Node, Point, Selection};
use crate::error::{EngineError, ErrorSignal};
use crate::html;
use crate::marks::{self, FormatMark};
use crate::ops::Transaction;
use crate::paste;
use crate::selection::{
    SelectionCode, decode_selection, encode_selection, leaf_blocks, point_for_global_offset,
};
use crate::table::{self, Side, TableBorder};

/// Outcome of a successful command, driving which events the host sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub changed: bool,
    pub structure: bool,
}

impl CommandOutcome {
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            structure: false,
        }
    }

    pub fn text_edit() -> Self {
        Self {
            changed: true,
            structure: false,
        }
    }

    pub fn structure_edit() -> Self {
        Self {
            changed: true,
            structure: true,
        }
    }
}

type CommandHandler =
    dyn Fn(&mut Editor, Option<Value>) -> Result<CommandOutcome, EngineError> + Send + Sync;
type QueryHandler = dyn Fn(&Editor, Option<Value>) -> Result<Value, EngineError> + Send + Sync;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub handler: Arc<CommandHandler>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<CommandOutcome, EngineError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: Arc<QueryHandler>,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, EngineError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl CommandRegistry {
    pub fn register_command(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.id.clone(), spec);
    }

    pub fn register_query(&mut self, spec: QuerySpec) {
        self.queries.insert(spec.id.clone(), spec);
    }

    pub fn command(&self, id: &str) -> Option<&CommandSpec> {
        self.commands.get(id)
    }

    pub fn query(&self, id: &str) -> Option<&QuerySpec> {
        self.queries.get(id)
    }

    pub fn command_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// The full engine surface.
    pub fn engine() -> Self {
        let mut registry = Self::default();
        register_block_commands(&mut registry);
        register_mark_commands(&mut registry);
        register_table_commands(&mut registry);
        register_paste_commands(&mut registry);
        register_history_commands(&mut registry);
        register_document_commands(&mut registry);
        registry
    }
}

/// Outbound notifications, drained by the host after each command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Event {
    Ready,
    Input { focused: Option<String> },
    UpdateHeight,
    Log { message: String },
    Error(ErrorSignal),
}

#[derive(Debug, Clone, Default)]
struct SearchState {
    active: bool,
    query: String,
}

pub struct Bridge {
    editor: Editor,
    registry: CommandRegistry,
    events: Vec<Event>,
    search: SearchState,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        let mut bridge = Self {
            editor: Editor::empty(),
            registry: CommandRegistry::engine(),
            events: Vec::new(),
            search: SearchState::default(),
        };
        bridge.events.push(Event::Ready);
        bridge
    }

    pub fn with_html(markup: &str) -> Self {
        let mut bridge = Self::new();
        let doc = html::document_from_fragment(&paste::sanitize(html::parse_fragment(markup)));
        let caret = Selection::collapsed(Point::new(vec![0, 0], 0));
        bridge.editor.reset(doc, caret);
        bridge
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Dispatch one command or query by id. Commands answer `None`,
    /// queries answer their payload. Failures are queued as error events
    /// and returned.
    pub fn handle(&mut self, id: &str, args: Option<Value>) -> Result<Option<Value>, ErrorSignal> {
        let result = self.dispatch(id, args);
        match result {
            Ok(answer) => Ok(answer),
            Err(err) => {
                let signal = ErrorSignal::from(&err);
                log::warn!("command {id} failed: {err}");
                self.events.push(Event::Log {
                    message: format!("command {id} failed: {err}"),
                });
                self.events.push(Event::Error(signal.clone()));
                Err(signal)
            }
        }
    }

    fn dispatch(&mut self, id: &str, args: Option<Value>) -> Result<Option<Value>, EngineError> {
        if id == "find.search" {
            return self.search_command(args).map(Some);
        }
        if let Some(spec) = self.registry.command(id) {
            let outcome = (Arc::clone(&spec.handler))(&mut self.editor, args)?;
            if outcome.changed {
                self.events.push(Event::Input {
                    focused: self.editor.focused_region(),
                });
            }
            if outcome.structure {
                self.events.push(Event::UpdateHeight);
            }
            return Ok(None);
        }
        if let Some(spec) = self.registry.query(id) {
            let answer = (Arc::clone(&spec.handler))(&self.editor, args)?;
            return Ok(Some(answer));
        }
        Err(EngineError::NotFound(format!("unknown command {id:?}")))
    }

    fn search_command(&mut self, args: Option<Value>) -> Result<Value, EngineError> {
        #[derive(serde::Deserialize)]
        struct SearchArgs {
            text: String,
            #[serde(default)]
            direction: Option<String>,
            #[serde(default = "default_true")]
            activate: bool,
        }
        fn default_true() -> bool {
            true
        }

        let args: SearchArgs = parse_args(args)?;
        if !args.activate {
            self.search = SearchState::default();
            return Ok(json!({ "found": false, "active": false }));
        }
        let backward = args.direction.as_deref() == Some("backward");
        self.search.active = true;
        self.search.query = args.text.clone();

        let found = self.find_next(&args.text, backward);
        if let Some(selection) = found {
            self.editor.set_selection(selection);
            self.events.push(Event::Input {
                focused: self.editor.focused_region(),
            });
            Ok(json!({ "found": true, "active": true }))
        } else {
            Ok(json!({ "found": false, "active": true }))
        }
    }

    /// Scan leaf blocks for the query, starting after (or before) the
    /// focus block and wrapping around.
    fn find_next(&self, query: &str, backward: bool) -> Option<Selection> {
        if query.is_empty() {
            return None;
        }
        let doc = self.editor.doc();
        let blocks = leaf_blocks(doc);
        if blocks.is_empty() {
            return None;
        }
        let focus_block: Vec<usize> = {
            let mut p = self.editor.selection().focus.path.clone();
            p.pop();
            p
        };
        let start = blocks.iter().position(|p| *p == focus_block).unwrap_or(0);
        let needle = query.to_lowercase();

        let order: Vec<usize> = if backward {
            (0..blocks.len())
                .map(|i| (start + blocks.len() - i) % blocks.len())
                .collect()
        } else {
            (0..blocks.len()).map(|i| (start + i) % blocks.len()).collect()
        };

        for block_ix in order {
            let path = &blocks[block_ix];
            let Some(Node::Element(el)) = crate::core::node_at(doc, path) else {
                continue;
            };
            let haystack: String = el
                .children
                .iter()
                .map(|n| match n {
                    Node::Text(t) => t.text.clone(),
                    Node::Element(_) => "\u{0}".to_string(),
                })
                .collect();
            // Case folding can change byte lengths, so match against a
            // folded copy and map offsets back through per-char spans.
            let mut folded = String::new();
            let mut spans: Vec<(usize, usize)> = Vec::new();
            for (ix, ch) in haystack.char_indices() {
                let char_end = ix + ch.len_utf8();
                for low in ch.to_lowercase() {
                    folded.push(low);
                    spans.resize(folded.len(), (ix, char_end));
                }
            }
            if let Some(at) = folded.find(&needle) {
                let match_start = spans[at].0;
                let match_end = spans[at + needle.len() - 1].1;
                let anchor = point_for_global_offset(path, &el.children, match_start);
                let focus = point_for_global_offset(path, &el.children, match_end);
                return Some(Selection { anchor, focus });
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Registration

fn parse_args<T: DeserializeOwned>(args: Option<Value>) -> Result<T, EngineError> {
    serde_json::from_value(args.unwrap_or(Value::Null))
        .map_err(|err| EngineError::Unsupported(format!("bad command arguments: {err}")))
}

fn run_tx(editor: &mut Editor, tx: Transaction, structure: bool) -> Result<CommandOutcome, EngineError> {
    if tx.is_empty() {
        editor.apply(tx)?;
        return Ok(CommandOutcome::unchanged());
    }
    editor.apply(tx)?;
    Ok(if structure {
        CommandOutcome::structure_edit()
    } else {
        CommandOutcome::text_edit()
    })
}

fn style_from_value(tag: &str) -> Result<StyleTag, EngineError> {
    StyleTag::from_tag(tag)
        .ok_or_else(|| EngineError::Unsupported(format!("not a style tag: {tag:?}")))
}

fn register_block_commands(registry: &mut CommandRegistry) {
    #[derive(serde::Deserialize)]
    struct TagArgs {
        tag: String,
    }
    registry.register_command(CommandSpec::new("block.set_style", |editor, args| {
        let args: TagArgs = parse_args(args)?;
        let style = style_from_value(&args.tag)?;
        run_tx(editor, block::set_style(editor, style)?, true)
    }));

    #[derive(serde::Deserialize)]
    struct ReplaceArgs {
        old: String,
        new: String,
    }
    registry.register_command(CommandSpec::new("block.replace_style", |editor, args| {
        let args: ReplaceArgs = parse_args(args)?;
        let old = style_from_value(&args.old)?;
        let new = style_from_value(&args.new)?;
        run_tx(editor, block::replace_style(editor, old, new)?, true)
    }));

    registry.register_command(CommandSpec::new("block.indent", |editor, _| {
        run_tx(editor, block::indent(editor)?, true)
    }));
    registry.register_command(CommandSpec::new("block.outdent", |editor, _| {
        run_tx(editor, block::outdent(editor)?, true)
    }));

    #[derive(serde::Deserialize)]
    struct ListArgs {
        r#type: String,
    }
    registry.register_command(CommandSpec::new("list.toggle", |editor, args| {
        let args: ListArgs = parse_args(args)?;
        let ltype = ListType::from_tag(&args.r#type)
            .ok_or_else(|| EngineError::Unsupported(format!("not a list type: {:?}", args.r#type)))?;
        run_tx(editor, block::toggle_list(editor, ltype)?, true)
    }));

    registry.register_command(CommandSpec::new("block.blockquote_enter", |editor, _| {
        run_tx(editor, block::blockquote_enter(editor)?, true)
    }));
    registry.register_command(CommandSpec::new("block.list_enter", |editor, _| {
        run_tx(editor, block::list_enter(editor)?, true)
    }));
}

fn register_mark_commands(registry: &mut CommandRegistry) {
    #[derive(serde::Deserialize)]
    struct MarkArgs {
        mark: String,
    }
    registry.register_command(CommandSpec::new("marks.toggle", |editor, args| {
        let args: MarkArgs = parse_args(args)?;
        let mark = FormatMark::from_name(&args.mark)
            .ok_or_else(|| EngineError::Unsupported(format!("not a format mark: {:?}", args.mark)))?;
        run_tx(editor, marks::toggle_mark(editor, mark)?, false)
    }));

    #[derive(serde::Deserialize)]
    struct LinkArgs {
        #[serde(default)]
        href: Option<String>,
    }
    registry.register_command(CommandSpec::new("marks.set_link", |editor, args| {
        let args: LinkArgs = parse_args(args)?;
        run_tx(editor, marks::set_link(editor, args.href)?, false)
    }));

    registry.register_query(QuerySpec::new("marks.active", |editor, _| {
        let active = marks::active_marks(editor);
        serde_json::to_value(active)
            .map_err(|err| EngineError::Unsupported(format!("marks not serializable: {err}")))
    }));
}

fn register_table_commands(registry: &mut CommandRegistry) {
    #[derive(serde::Deserialize)]
    struct GridArgs {
        rows: usize,
        cols: usize,
    }
    registry.register_command(CommandSpec::new("table.insert", |editor, args| {
        let args: GridArgs = parse_args(args)?;
        run_tx(editor, table::insert_table(editor, args.rows, args.cols)?, true)
    }));

    #[derive(serde::Deserialize)]
    struct SideArgs {
        #[serde(default)]
        side: Option<String>,
    }
    fn side_of(args: &SideArgs) -> Result<Side, EngineError> {
        match args.side.as_deref() {
            None => Ok(Side::After),
            Some(name) => Side::from_name(name)
                .ok_or_else(|| EngineError::Unsupported(format!("not a side: {name:?}"))),
        }
    }
    registry.register_command(CommandSpec::new("table.add_row", |editor, args| {
        let args: SideArgs = parse_args(args)?;
        run_tx(editor, table::add_row(editor, side_of(&args)?)?, true)
    }));
    registry.register_command(CommandSpec::new("table.add_col", |editor, args| {
        let args: SideArgs = parse_args(args)?;
        run_tx(editor, table::add_col(editor, side_of(&args)?)?, true)
    }));
    registry.register_command(CommandSpec::new("table.add_header", |editor, _| {
        run_tx(editor, table::add_header(editor)?, true)
    }));
    registry.register_command(CommandSpec::new("table.delete_row", |editor, _| {
        run_tx(editor, table::delete_row(editor)?, true)
    }));
    registry.register_command(CommandSpec::new("table.delete_col", |editor, _| {
        run_tx(editor, table::delete_col(editor)?, true)
    }));
    registry.register_command(CommandSpec::new("table.delete", |editor, _| {
        run_tx(editor, table::delete_table(editor)?, true)
    }));

    #[derive(serde::Deserialize)]
    struct BorderArgs {
        border: String,
    }
    registry.register_command(CommandSpec::new("table.set_border", |editor, args| {
        let args: BorderArgs = parse_args(args)?;
        let border = TableBorder::from_name(&args.border)
            .ok_or_else(|| EngineError::Unsupported(format!("not a border style: {:?}", args.border)))?;
        run_tx(editor, table::set_border(editor, border)?, true)
    }));
}

fn register_paste_commands(registry: &mut CommandRegistry) {
    #[derive(serde::Deserialize)]
    struct PasteArgs {
        html: String,
    }
    registry.register_command(CommandSpec::new("paste.html", |editor, args| {
        let args: PasteArgs = parse_args(args)?;
        run_tx(editor, paste::paste_html(editor, &args.html)?, true)
    }));
    registry.register_command(CommandSpec::new("paste.text", |editor, args| {
        let args: PasteArgs = parse_args(args)?;
        run_tx(editor, paste::paste_text(editor, &args.html)?, true)
    }));
}

fn register_history_commands(registry: &mut CommandRegistry) {
    registry.register_command(CommandSpec::new("core.undo", |editor, _| {
        Ok(if editor.undo() {
            CommandOutcome::structure_edit()
        } else {
            CommandOutcome::unchanged()
        })
    }));
    registry.register_command(CommandSpec::new("core.redo", |editor, _| {
        Ok(if editor.redo() {
            CommandOutcome::structure_edit()
        } else {
            CommandOutcome::unchanged()
        })
    }));
}

fn register_document_commands(registry: &mut CommandRegistry) {
    #[derive(serde::Deserialize, Default)]
    struct GetHtmlArgs {
        #[serde(default)]
        pretty: bool,
        #[serde(default)]
        clean: bool,
    }
    registry.register_query(QuerySpec::new("doc.get_html", |editor, args| {
        let args: GetHtmlArgs = match args {
            None => GetHtmlArgs::default(),
            some => parse_args(some)?,
        };
        Ok(Value::String(html::to_html(editor.doc(), args.pretty, args.clean)))
    }));

    #[derive(serde::Deserialize)]
    struct SetHtmlArgs {
        html: String,
    }
    registry.register_command(CommandSpec::new("doc.set_html", |editor, args| {
        let args: SetHtmlArgs = parse_args(args)?;
        let doc =
            html::document_from_fragment(&paste::sanitize(html::parse_fragment(&args.html)));
        let caret = Selection::collapsed(Point::new(vec![0, 0], 0));
        editor.reset(doc, caret);
        Ok(CommandOutcome::structure_edit())
    }));

    registry.register_query(QuerySpec::new("selection.get", |editor, _| {
        let code = encode_selection(editor.doc(), editor.selection())?;
        serde_json::to_value(code)
            .map_err(|err| EngineError::Unsupported(format!("selection not serializable: {err}")))
    }));

    registry.register_command(CommandSpec::new("selection.set", |editor, args| {
        let code: SelectionCode = parse_args(args)?;
        let selection = decode_selection(editor.doc(), &code)?;
        editor.set_selection(selection);
        Ok(CommandOutcome::unchanged())
    }));
}
