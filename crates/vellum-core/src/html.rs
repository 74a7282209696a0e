//! HTML boundary layer. A small byte-level tokenizer and fragment parser
//! feed the paste sanitizer; the canonicalizer folds format elements into
//! run marks; the serializer materializes marks back out and is the only
//! producer of document HTML.
//!
//! Serialization is deterministic: attributes are kept sorted and mark
//! elements nest in one fixed order, so equal trees print equal strings.

use std::fmt::Write as _;

use crate::classify;
use crate::core::{Attrs, Document, ElementNode, Marks, Node, TextNode};

/// Parsed markup before canonicalization. The sanitizer operates on this
/// shape so it can see the markup exactly as the host supplied it.
#[derive(Debug, Clone, PartialEq)]
pub enum Html {
    Element {
        tag: String,
        attrs: Attrs,
        children: Vec<Html>,
    },
    Text(String),
}

impl Html {
    pub fn element(tag: impl Into<String>, children: Vec<Html>) -> Self {
        Html::Element {
            tag: tag.into(),
            attrs: Attrs::default(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Html::Text(text.into())
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Html::Element { tag, .. } => Some(tag),
            Html::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer

enum Token {
    Text(String),
    Start {
        tag: String,
        attrs: Attrs,
        self_closing: bool,
    },
    End(String),
}

struct Tokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn skip_past(&mut self, needle: &[u8]) {
        let rest = self.rest();
        match rest
            .windows(needle.len())
            .position(|w| w == needle)
        {
            Some(ix) => self.pos += ix + needle.len(),
            None => self.pos = self.bytes.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn take_name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).to_ascii_lowercase()
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            if self.pos >= self.bytes.len() {
                return None;
            }
            if self.bytes[self.pos] != b'<' {
                return Some(self.text_token());
            }
            let rest = self.rest();
            if rest.starts_with(b"<!--") {
                self.skip_past(b"-->");
                continue;
            }
            if rest.len() >= 2 && (rest[1] == b'!' || rest[1] == b'?') {
                self.skip_past(b">");
                continue;
            }
            if rest.len() >= 2 && rest[1] == b'/' {
                self.pos += 2;
                let name = self.take_name();
                self.skip_past(b">");
                return Some(Token::End(name));
            }
            if rest.len() >= 2 && rest[1].is_ascii_alphabetic() {
                return Some(self.start_tag_token());
            }
            // Lone '<' with no tag behind it reads as text.
            return Some(self.text_token());
        }
    }

    fn text_token(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'<' {
            self.pos += 1;
        }
        let raw = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        Token::Text(decode_entities(&raw))
    }

    fn start_tag_token(&mut self) -> Token {
        self.pos += 1;
        let tag = self.take_name();
        let mut attrs = Attrs::default();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.bytes.get(self.pos) {
                None => break,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    if self.bytes.get(self.pos) == Some(&b'>') {
                        self.pos += 1;
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    let name = self.take_name();
                    if name.is_empty() {
                        self.pos += 1;
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.bytes.get(self.pos) == Some(&b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.take_attr_value()
                    } else {
                        String::new()
                    };
                    attrs.insert(name, value);
                }
            }
        }
        Token::Start {
            tag,
            attrs,
            self_closing,
        }
    }

    fn take_attr_value(&mut self) -> String {
        let quote = match self.bytes.get(self.pos) {
            Some(&q @ (b'"' | b'\'')) => {
                self.pos += 1;
                Some(q)
            }
            _ => None,
        };
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match quote {
                Some(q) if b == q => break,
                Some(_) => self.pos += 1,
                None if b.is_ascii_whitespace() || b == b'>' => break,
                None => self.pos += 1,
            }
        }
        let raw = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        if quote.is_some() && self.pos < self.bytes.len() {
            self.pos += 1;
        }
        decode_entities(&raw)
    }
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let end = match rest[1..].find(';') {
            Some(ix) if ix <= 10 => ix + 1,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };
        let name = &rest[1..end];
        let decoded = match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ if name.starts_with("#x") || name.starts_with("#X") => {
                u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
            }
            _ if name.starts_with('#') => {
                name[1..].parse::<u32>().ok().and_then(char::from_u32)
            }
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Fragment parser

/// Parse arbitrary markup into a raw fragment. Unclosed elements close at
/// the end of input; stray end tags are dropped.
pub fn parse_fragment(input: &str) -> Vec<Html> {
    let mut tokenizer = Tokenizer::new(input);
    let mut top: Vec<Html> = Vec::new();
    let mut stack: Vec<(String, Attrs, Vec<Html>)> = Vec::new();

    fn emit(top: &mut Vec<Html>, stack: &mut [(String, Attrs, Vec<Html>)], node: Html) {
        match stack.last_mut() {
            Some(frame) => frame.2.push(node),
            None => top.push(node),
        }
    }

    while let Some(token) = tokenizer.next_token() {
        match token {
            Token::Text(text) => emit(&mut top, &mut stack, Html::Text(text)),
            Token::Start {
                tag,
                attrs,
                self_closing,
            } => {
                if self_closing || classify::is_void(&tag) {
                    emit(
                        &mut top,
                        &mut stack,
                        Html::Element {
                            tag,
                            attrs,
                            children: Vec::new(),
                        },
                    );
                } else {
                    stack.push((tag, attrs, Vec::new()));
                }
            }
            Token::End(name) => {
                if !stack.iter().any(|(tag, ..)| *tag == name) {
                    continue;
                }
                loop {
                    let (tag, attrs, children) = stack.pop().expect("matched above");
                    let done = tag == name;
                    emit(
                        &mut top,
                        &mut stack,
                        Html::Element {
                            tag,
                            attrs,
                            children,
                        },
                    );
                    if done {
                        break;
                    }
                }
            }
        }
    }
    while let Some((tag, attrs, children)) = stack.pop() {
        emit(
            &mut top,
            &mut stack,
            Html::Element {
                tag,
                attrs,
                children,
            },
        );
    }
    top
}

// ---------------------------------------------------------------------------
// Canonicalization into the document model

fn mark_for_tag(tag: &str) -> Option<fn(&mut Marks)> {
    match tag {
        "strong" => Some(|m| m.bold = true),
        "em" => Some(|m| m.italic = true),
        "u" => Some(|m| m.underline = true),
        "s" => Some(|m| m.strikethrough = true),
        "code" => Some(|m| m.code = true),
        "sub" => Some(|m| m.subscript = true),
        "sup" => Some(|m| m.superscript = true),
        _ => None,
    }
}

fn flatten_inline(nodes: &[Html], marks: &Marks, out: &mut Vec<Node>) {
    for node in nodes {
        match node {
            Html::Text(text) => {
                if !text.is_empty() {
                    out.push(Node::run(text.clone(), marks.clone()));
                }
            }
            Html::Element {
                tag,
                attrs,
                children,
            } => {
                if let Some(apply) = mark_for_tag(tag) {
                    let mut inner = marks.clone();
                    apply(&mut inner);
                    flatten_inline(children, &inner, out);
                } else if tag == "a" {
                    let mut inner = marks.clone();
                    inner.link = attrs.get("href").cloned();
                    flatten_inline(children, &inner, out);
                } else if classify::is_void(tag) {
                    out.push(Node::Element(ElementNode {
                        tag: tag.clone(),
                        attrs: attrs.clone(),
                        children: Vec::new(),
                    }));
                } else {
                    // Unexpected nested element: take its inline content.
                    flatten_inline(children, marks, out);
                }
            }
        }
    }
}

fn inline_children(nodes: &[Html]) -> Vec<Node> {
    let mut out = Vec::new();
    flatten_inline(nodes, &Marks::default(), &mut out);
    if !out.iter().any(|n| matches!(n, Node::Text(_))) {
        out.push(Node::run(String::new(), Marks::default()));
    }
    out
}

fn canonical_block(node: &Html) -> Option<Node> {
    let Html::Element {
        tag,
        attrs,
        children,
    } = node
    else {
        return None;
    };
    if classify::is_style(tag) {
        return Some(Node::Element(ElementNode {
            tag: tag.clone(),
            attrs: attrs.clone(),
            children: inline_children(children),
        }));
    }
    match tag.as_str() {
        "ul" | "ol" => Some(canonical_list(tag, attrs, children)),
        "blockquote" => Some(Node::Element(ElementNode {
            tag: tag.clone(),
            attrs: attrs.clone(),
            children: canonical_blocks(children),
        })),
        "table" => Some(canonical_table(attrs, children)),
        _ => None,
    }
}

fn canonical_list(tag: &str, attrs: &Attrs, children: &[Html]) -> Node {
    let mut items: Vec<Node> = Vec::new();
    for child in children {
        let Html::Element {
            tag: child_tag,
            children: li_children,
            ..
        } = child
        else {
            continue;
        };
        if child_tag != "li" {
            if let Some(block) = canonical_block(child) {
                items.push(Node::element("li", vec![block]));
            }
            continue;
        }
        let mut li_out: Vec<Node> = Vec::new();
        let mut stray: Vec<Html> = Vec::new();
        for part in li_children {
            match part {
                Html::Element { tag: t, .. } if classify::is_style(t) || classify::is_list(t) => {
                    if !stray.is_empty() {
                        li_out.push(Node::element("p", inline_children(&stray)));
                        stray.clear();
                    }
                    if let Some(block) = canonical_block(part) {
                        li_out.push(block);
                    }
                }
                other => stray.push(other.clone()),
            }
        }
        if !stray.is_empty() {
            li_out.push(Node::element("p", inline_children(&stray)));
        }
        if li_out.is_empty() {
            li_out.push(Node::paragraph(""));
        }
        items.push(Node::element("li", li_out));
    }
    if items.is_empty() {
        items.push(Node::element("li", vec![Node::paragraph("")]));
    }
    Node::Element(ElementNode {
        tag: tag.to_string(),
        attrs: attrs.clone(),
        children: items,
    })
}

fn canonical_table(attrs: &Attrs, children: &[Html]) -> Node {
    fn rows_in(children: &[Html], out: &mut Vec<Node>) {
        for child in children {
            let Html::Element {
                tag,
                children: inner,
                ..
            } = child
            else {
                continue;
            };
            match tag.as_str() {
                "tr" => out.push(canonical_row(inner)),
                // thead/tbody and friends survive parsing; look through them.
                _ => rows_in(inner, out),
            }
        }
    }
    let mut rows: Vec<Node> = Vec::new();
    rows_in(children, &mut rows);
    if rows.is_empty() {
        rows.push(Node::element("tr", vec![Node::element("td", vec![Node::paragraph("")])]));
    }
    Node::Element(ElementNode {
        tag: "table".to_string(),
        attrs: attrs.clone(),
        children: rows,
    })
}

fn canonical_row(cells: &[Html]) -> Node {
    let mut out: Vec<Node> = Vec::new();
    for cell in cells {
        let Html::Element {
            tag,
            attrs,
            children,
        } = cell
        else {
            continue;
        };
        if tag != "td" && tag != "th" {
            continue;
        }
        let mut blocks = canonical_blocks(children);
        if blocks.is_empty() {
            blocks.push(Node::paragraph(""));
        }
        out.push(Node::Element(ElementNode {
            tag: tag.clone(),
            attrs: attrs.clone(),
            children: blocks,
        }));
    }
    if out.is_empty() {
        out.push(Node::element("td", vec![Node::paragraph("")]));
    }
    Node::element("tr", out)
}

/// Convert sanitized fragment children into canonical block nodes. Stray
/// inline content between blocks gathers into paragraphs.
pub fn canonical_blocks(nodes: &[Html]) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::new();
    let mut stray: Vec<Html> = Vec::new();
    for node in nodes {
        if let Some(block) = canonical_block(node) {
            if !stray.is_empty() {
                out.push(Node::element("p", inline_children(&stray)));
                stray.clear();
            }
            out.push(block);
        } else {
            match node {
                Html::Text(t) if t.trim().is_empty() => {}
                other => stray.push(other.clone()),
            }
        }
    }
    if !stray.is_empty() {
        out.push(Node::element("p", inline_children(&stray)));
    }
    out
}

/// Sanitized fragment to a full document. An empty fragment yields one
/// empty paragraph so the result can always host a caret.
pub fn document_from_fragment(nodes: &[Html]) -> Document {
    let mut children = canonical_blocks(nodes);
    if children.is_empty() {
        children.push(Node::paragraph(""));
    }
    Document { children }
}

// ---------------------------------------------------------------------------
// Serialization

fn escape_text(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn write_open_tag(tag: &str, attrs: &Attrs, clean: bool, out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (key, value) in attrs {
        if clean && (key == "id" || key.starts_with("data-")) {
            continue;
        }
        let _ = write!(out, " {key}=\"");
        escape_attr(value, out);
        out.push('"');
    }
    out.push('>');
}

/// Mark elements nest in this fixed order, link outermost.
fn mark_tags(marks: &Marks) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if marks.bold {
        tags.push("strong");
    }
    if marks.italic {
        tags.push("em");
    }
    if marks.underline {
        tags.push("u");
    }
    if marks.strikethrough {
        tags.push("s");
    }
    if marks.code {
        tags.push("code");
    }
    if marks.subscript {
        tags.push("sub");
    }
    if marks.superscript {
        tags.push("sup");
    }
    tags
}

fn write_run(run: &TextNode, out: &mut String) {
    if run.text.is_empty() {
        return;
    }
    if run.marks.is_plain() {
        escape_text(&run.text, out);
        return;
    }
    if let Some(href) = &run.marks.link {
        out.push_str("<a href=\"");
        escape_attr(href, out);
        out.push_str("\">");
    }
    let tags = mark_tags(&run.marks);
    for tag in &tags {
        let _ = write!(out, "<{tag}>");
    }
    escape_text(&run.text, out);
    for tag in tags.iter().rev() {
        let _ = write!(out, "</{tag}>");
    }
    if run.marks.link.is_some() {
        out.push_str("</a>");
    }
}

fn write_inline(children: &[Node], clean: bool, out: &mut String) {
    let visible = children.iter().any(|child| match child {
        Node::Text(t) => !t.text.is_empty(),
        Node::Element(_) => true,
    });
    if !visible {
        // Canonical empty block keeps a caret line.
        out.push_str("<br>");
        return;
    }
    for child in children {
        match child {
            Node::Text(run) => write_run(run, out),
            Node::Element(el) => {
                write_open_tag(&el.tag, &el.attrs, clean, out);
                if !classify::is_void(&el.tag) {
                    write_inline(&el.children, clean, out);
                    let _ = write!(out, "</{}>", el.tag);
                }
            }
        }
    }
}

fn is_block_container(tag: &str) -> bool {
    matches!(
        tag,
        "ul" | "ol" | "li" | "table" | "tr" | "td" | "th" | "blockquote"
    )
}

fn write_block(node: &Node, depth: usize, pretty: bool, clean: bool, out: &mut String) {
    let indent = |out: &mut String, depth: usize| {
        if pretty {
            if !out.is_empty() {
                out.push('\n');
            }
            for _ in 0..depth {
                out.push_str("  ");
            }
        }
    };

    match node {
        Node::Text(run) => {
            indent(out, depth);
            write_run(run, out);
        }
        Node::Element(el) if is_block_container(&el.tag) => {
            indent(out, depth);
            write_open_tag(&el.tag, &el.attrs, clean, out);
            for child in &el.children {
                write_block(child, depth + 1, pretty, clean, out);
            }
            indent(out, depth);
            let _ = write!(out, "</{}>", el.tag);
        }
        Node::Element(el) if classify::is_void(&el.tag) => {
            indent(out, depth);
            write_open_tag(&el.tag, &el.attrs, clean, out);
        }
        Node::Element(el) => {
            indent(out, depth);
            write_open_tag(&el.tag, &el.attrs, clean, out);
            write_inline(&el.children, clean, out);
            let _ = write!(out, "</{}>", el.tag);
        }
    }
}

/// Serialize the document to canonical HTML. `pretty` indents block
/// structure two spaces per level; `clean` drops internal bookkeeping
/// attributes (`id`, `data-*`).
pub fn to_html(doc: &Document, pretty: bool, clean: bool) -> String {
    let mut out = String::new();
    for child in &doc.children {
        write_block(child, 0, pretty, clean, &mut out);
    }
    out
}

/// Serialize a raw fragment back to markup. Used to check that sanitized
/// output parses back to itself.
pub fn fragment_to_html(nodes: &[Html]) -> String {
    fn write_node(node: &Html, out: &mut String) {
        match node {
            Html::Text(text) => escape_text(text, out),
            Html::Element {
                tag,
                attrs,
                children,
            } => {
                write_open_tag(tag, attrs, false, out);
                if classify::is_void(tag) {
                    return;
                }
                for child in children {
                    write_node(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_fragment() {
        let frag = parse_fragment("<p>Hello <strong>world</strong></p>");
        assert_eq!(frag.len(), 1);
        let Html::Element { tag, children, .. } = &frag[0] else {
            panic!("expected element");
        };
        assert_eq!(tag, "p");
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn decodes_entities_and_escapes_back() {
        let frag = parse_fragment("<p>a &amp; b &lt;c&gt; &#65;</p>");
        let Html::Element { children, .. } = &frag[0] else {
            panic!("expected element");
        };
        assert_eq!(children[0], Html::Text("a & b <c> A".to_string()));
        assert_eq!(fragment_to_html(&frag), "<p>a &amp; b &lt;c&gt; A</p>");
    }

    #[test]
    fn stray_end_tags_are_dropped() {
        let frag = parse_fragment("</div><p>x</p></span>");
        assert_eq!(frag.len(), 1);
        assert_eq!(frag[0].tag(), Some("p"));
    }

    #[test]
    fn canonicalizes_marks_into_runs() {
        let frag = parse_fragment("<p>He<strong>ll</strong>o</p>");
        let doc = document_from_fragment(&frag);
        assert_eq!(to_html(&doc, false, false), "<p>He<strong>ll</strong>o</p>");
    }

    #[test]
    fn empty_paragraph_serializes_with_break() {
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        assert_eq!(to_html(&doc, false, false), "<p><br></p>");
    }

    #[test]
    fn pretty_print_is_stable() {
        let frag = parse_fragment("<ul><li><p>one</p></li><li><p>two</p></li></ul>");
        let doc = document_from_fragment(&frag);
        let first = to_html(&doc, true, false);
        let second = to_html(&doc, true, false);
        assert_eq!(first, second);
        assert!(first.starts_with("<ul>\n  <li>\n    <p>one</p>"));
    }
}
