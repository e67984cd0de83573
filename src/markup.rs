//! Markup parser (C2).
//!
//! Ports the teacher's `html5ever` + `markup5ever_rcdom` strategy: strip the
//! `<script>`/`<style>` regions out with a regex pre-pass (so embedded JS/CSS
//! braces never confuse the HTML tokenizer), preserve `PascalCase` component
//! tag casing (html5ever lowercases tag names) via a marker attribute, parse
//! the rest as HTML5, then walk the resulting DOM into our own [`Node`] tree.

use std::collections::HashMap;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;

use crate::node::{
    is_component_tag, is_void_element, AttrValue, Attribute, AttributeKind, EventModifier,
    ForBinding, Node, SourceLoc, ValuePiece,
};
use crate::source::{Diagnostics, ErrorKind, SourceFile};

lazy_static! {
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script[^>]*>([\s\S]*?)</script>").unwrap();
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style[^>]*>([\s\S]*?)</style>").unwrap();
    static ref SELF_CLOSING_RE: Regex = Regex::new(r"<([A-Za-z][A-Za-z0-9]*)\s*([^>]*?)/>").unwrap();
    static ref TAG_MARK_OPEN_RE: Regex = Regex::new(r"<([A-Z][A-Za-z0-9]*)(\s|>)").unwrap();
    static ref TAG_MARK_CLOSE_RE: Regex = Regex::new(r"</([A-Z][A-Za-z0-9]*)>").unwrap();
}

/// Split into (markup-without-script-or-style, extracted script bodies,
/// extracted style bodies). Scripts/styles are spliced out before the HTML5
/// tokenizer sees them — the SFC format lets them sit anywhere at the top
/// level of the file.
fn strip_script_and_style(src: &str) -> (String, Vec<String>, Vec<String>) {
    let mut scripts = Vec::new();
    let mut styles = Vec::new();

    let without_scripts = SCRIPT_RE.replace_all(src, |caps: &regex::Captures| {
        scripts.push(caps[1].to_string());
        String::new()
    });
    let without_styles = STYLE_RE.replace_all(&without_scripts, |caps: &regex::Captures| {
        styles.push(caps[1].to_string());
        String::new()
    });

    (without_styles.to_string(), scripts, styles)
}

/// html5ever lowercases tag names; mark PascalCase component tags with an
/// attribute so we can restore the original casing after parsing.
fn mark_component_casing(html: &str) -> String {
    let marked = TAG_MARK_OPEN_RE.replace_all(html, |caps: &regex::Captures| {
        format!("<{} data-sfc-name=\"{}\"{}", &caps[1], &caps[1], &caps[2])
    });
    TAG_MARK_CLOSE_RE.replace_all(&marked, "</$1>").to_string()
}

fn self_close_components(html: &str) -> String {
    SELF_CLOSING_RE
        .replace_all(html, |caps: &regex::Captures| {
            format!("<{} {}></{}>", &caps[1], &caps[2], &caps[1])
        })
        .to_string()
}

/// Find the index just past a balanced `{…}` run starting at `start`
/// (the index of `{`), respecting nested braces and string/template
/// literals so `{ fn(`a}b`) }` doesn't terminate early.
fn balanced_brace_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut i = start;
    let mut in_string: Option<char> = None;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            i += 2;
            continue;
        }
        if let Some(q) = in_string {
            if c == q {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match c {
            '"' | '\'' | '`' => in_string = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split a raw string (attribute value or text content) into alternating
/// `StringText`/`BracesText` pieces at `{…}` boundaries (§4.2).
pub fn split_into_pieces(raw: &str) -> Vec<ValuePiece> {
    let chars: Vec<char> = raw.chars().collect();
    let mut pieces = Vec::new();
    let mut i = 0;
    let mut text_start = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            if let Some(end) = balanced_brace_end(&chars, i) {
                if i > text_start {
                    let text: String = chars[text_start..i].iter().collect();
                    pieces.push(ValuePiece::StringText(text));
                }
                let inner: String = chars[i + 1..end - 1].iter().collect();
                let (directive, rest) = crate::node::Directive::parse_prefix(inner.trim_start());
                pieces.push(ValuePiece::BracesText {
                    expr: rest.trim().to_string(),
                    directive,
                });
                i = end;
                text_start = i;
                continue;
            }
        }
        i += 1;
    }
    if text_start < chars.len() {
        let text: String = chars[text_start..].iter().collect();
        pieces.push(ValuePiece::StringText(text));
    }
    pieces
}

fn attr_value_from_raw(raw: &str) -> AttrValue {
    let pieces = split_into_pieces(raw);
    if pieces.len() == 1 {
        if let ValuePiece::StringText(s) = &pieces[0] {
            return AttrValue::Literal(s.clone());
        }
    }
    if pieces.is_empty() {
        return AttrValue::Literal(String::new());
    }
    AttrValue::Pieces(pieces)
}

/// Classify one raw `(name, value)` HTML attribute pair into our
/// [`AttributeKind`] grammar (SPEC_FULL.md §3.1).
fn classify_attribute(raw_name: &str, raw_value: Option<&str>) -> (String, AttributeKind, AttrValue) {
    if let Some(rest) = raw_name.strip_prefix('@') {
        let mut parts = rest.split('|');
        let name = parts.next().unwrap_or_default().to_string();
        let modifiers = parts.filter_map(EventModifier::parse).collect();
        return (
            name,
            AttributeKind::Event { modifiers },
            attr_value_from_raw(raw_value.unwrap_or_default()),
        );
    }
    if let Some(rest) = raw_name.strip_prefix(':') {
        return (
            rest.to_string(),
            AttributeKind::Bind,
            attr_value_from_raw(raw_value.unwrap_or_default()),
        );
    }
    if let Some(rest) = raw_name.strip_prefix('|') {
        return (
            rest.to_string(),
            AttributeKind::Modifier,
            attr_value_from_raw(raw_value.unwrap_or_default()),
        );
    }
    if let Some(rest) = raw_name.strip_prefix('#') {
        return (rest.to_string(), AttributeKind::Ref, AttrValue::None);
    }
    if let Some(rest) = raw_name.strip_prefix('*') {
        return (
            rest.to_string(),
            AttributeKind::Action,
            attr_value_from_raw(raw_value.unwrap_or_default()),
        );
    }
    if raw_name.starts_with('[') && raw_name.ends_with(']') && raw_name.len() >= 3 {
        let inner = &raw_name[1..raw_name.len() - 1];
        let (kind, key) = if let Some(k) = inner.strip_prefix('.') {
            (AttributeKind::Link, k)
        } else if let Some(k) = inner.strip_prefix(':') {
            (AttributeKind::Translate, k)
        } else if let Some(k) = inner.strip_prefix('=') {
            (AttributeKind::LiteralBracket, k)
        } else {
            (AttributeKind::Attribute, inner)
        };
        return (
            key.to_string(),
            kind,
            attr_value_from_raw(raw_value.unwrap_or_default()),
        );
    }
    (
        raw_name.to_string(),
        AttributeKind::Attribute,
        attr_value_from_raw(raw_value.unwrap_or_default()),
    )
}

fn parse_attributes(handle: &Handle) -> Vec<Attribute> {
    let NodeData::Element { attrs, .. } = &handle.data else {
        return Vec::new();
    };
    attrs
        .borrow()
        .iter()
        .filter(|a| a.name.local.as_ref() != "data-sfc-name")
        .map(|a| {
            let raw_name = a.name.local.to_string();
            let raw_value = a.value.to_string();
            let (name, kind, value) = classify_attribute(&raw_name, Some(&raw_value));
            Attribute {
                name,
                kind,
                value,
                loc: SourceLoc::default(),
                dependencies: Default::default(),
            }
        })
        .collect()
}

fn element_children(handle: &Handle) -> Vec<Node> {
    handle
        .children
        .borrow()
        .iter()
        .flat_map(walk_dom_node)
        .collect()
}

fn control_tag_node(tag: &str, handle: &Handle) -> Option<Node> {
    let attrs = parse_attributes(handle);
    let find = |n: &str| -> Option<String> {
        attrs.iter().find(|a| a.name == n).map(|a| a.value.concat_static())
    };
    let children = element_children(handle);
    match tag {
        "if" => Some(Node::IfBlock {
            value: find("value").unwrap_or_default(),
            children,
        }),
        "elseif" => Some(Node::ElseifBlock {
            value: find("value").unwrap_or_default(),
            children,
        }),
        "else" => Some(Node::ElseBlock { children }),
        "for" => {
            let as_raw = find("as").unwrap_or_default();
            let as_binding = parse_for_binding(&as_raw);
            Some(Node::ForBlock {
                value: find("value").unwrap_or_default(),
                as_binding,
                index: find("index"),
                key: find("key"),
                children,
            })
        }
        _ => None,
    }
}

/// `as="item"` or `as="{name, age}"` (destructured).
fn parse_for_binding(raw: &str) -> ForBinding {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        ForBinding {
            name: String::new(),
            computed: inner.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        }
    } else {
        ForBinding {
            name: raw.to_string(),
            computed: Vec::new(),
        }
    }
}

fn walk_dom_node(handle: &Handle) -> Vec<Node> {
    match &handle.data {
        NodeData::Document => handle.children.borrow().iter().flat_map(walk_dom_node).collect(),
        NodeData::Doctype { .. } => Vec::new(),
        NodeData::Comment { contents } => vec![Node::Comment {
            content: contents.to_string(),
        }],
        NodeData::ProcessingInstruction { .. } => Vec::new(),
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            vec![Node::Text {
                content: text,
                loc: SourceLoc::default(),
            }]
        }
        NodeData::Element { name, attrs, .. } => {
            let mut tag = name.local.to_string();
            for a in attrs.borrow().iter() {
                if a.name.local.as_ref() == "data-sfc-name" {
                    tag = a.value.to_string();
                }
            }
            let lower = tag.to_ascii_lowercase();

            if matches!(lower.as_str(), "if" | "elseif" | "else" | "for") {
                return control_tag_node(&lower, handle).into_iter().collect();
            }

            // html5ever wraps fragments in an implied html/head/body; flatten
            // those three wrapper tags transparently.
            if matches!(lower.as_str(), "html" | "head" | "body") {
                return element_children(handle);
            }

            if lower == "slot" {
                let attrs = parse_attributes(handle);
                let name = attrs.iter().find(|a| a.name == "name").map(|a| a.value.concat_static());
                return vec![Node::Slot {
                    name,
                    children: element_children(handle),
                }];
            }

            let attributes = parse_attributes(handle);
            if let Some(slot_attr) = attributes.iter().find(|a| a.name == "slot") {
                let slot = slot_attr.value.concat_static();
                let mut real_attrs = attributes.clone();
                real_attrs.retain(|a| a.name != "slot");
                let inner = vec![Node::Element {
                    name: tag.clone(),
                    void_element: is_void_element(&tag),
                    attributes: real_attrs,
                    children: element_children(handle),
                    loc: SourceLoc::default(),
                }];
                return vec![Node::SlotContent {
                    slot,
                    children: inner,
                }];
            }

            if is_component_tag(&tag) {
                vec![Node::Component {
                    name: tag,
                    attributes,
                    children: element_children(handle),
                    loc: SourceLoc::default(),
                }]
            } else {
                vec![Node::Element {
                    name: tag.clone(),
                    void_element: is_void_element(&tag),
                    attributes,
                    children: element_children(handle),
                    loc: SourceLoc::default(),
                }]
            }
        }
    }
}

pub struct ParsedMarkup {
    pub document: Node,
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
}

/// Parse one SFC source string into a [`Node::Document`] plus the raw
/// script/style region bodies (§4.2).
pub fn parse_markup(file: &SourceFile, diags: &mut Diagnostics) -> ParsedMarkup {
    let (stripped, scripts, styles) = strip_script_and_style(&file.code);
    let self_closed = self_close_components(&stripped);
    let marked = mark_component_casing(&self_closed);

    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut marked.as_bytes())
    {
        Ok(dom) => dom,
        Err(e) => {
            diags.push(file, ErrorKind::Syntax, 0, format!("markup parse failure: {e}"));
            RcDom::default()
        }
    };

    let children = walk_dom_node(&dom.document);
    ParsedMarkup {
        document: Node::Document { children },
        scripts,
        styles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_and_braces() {
        let pieces = split_into_pieces("hello {name}!");
        assert_eq!(pieces.len(), 3);
        matches!(pieces[0], ValuePiece::StringText(_));
    }

    #[test]
    fn recognizes_html_directive() {
        let pieces = split_into_pieces("{@html rawHtml}");
        match &pieces[0] {
            ValuePiece::BracesText { expr, directive } => {
                assert_eq!(expr, "rawHtml");
                assert_eq!(*directive, Some(crate::node::Directive::Html));
            }
            _ => panic!("expected braces piece"),
        }
    }

    #[test]
    fn parses_simple_component() {
        let file = SourceFile::new("t.sfc", "<button @click=\"inc()\">{count}</button>");
        let mut diags = Diagnostics::new();
        let parsed = parse_markup(&file, &mut diags);
        let Node::Document { children } = parsed.document else { panic!() };
        assert_eq!(children.len(), 1);
        match &children[0] {
            Node::Element { name, attributes, .. } => {
                assert_eq!(name, "button");
                assert!(matches!(attributes[0].kind, AttributeKind::Event { .. }));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn parses_for_block() {
        let file = SourceFile::new(
            "t.sfc",
            "<ul><for value=\"items\" as=\"item\" key=\"item.id\"><li>{item.name}</li></for></ul>",
        );
        let mut diags = Diagnostics::new();
        let parsed = parse_markup(&file, &mut diags);
        let Node::Document { children } = parsed.document else { panic!() };
        let Node::Element { children, .. } = &children[0] else { panic!() };
        assert!(children.iter().any(|n| matches!(n, Node::ForBlock { .. })));
    }

    #[test]
    fn extracts_script_and_style_regions() {
        let file = SourceFile::new(
            "t.sfc",
            "<script>let x = 1;</script><div>hi</div><style>.x{color:red}</style>",
        );
        let mut diags = Diagnostics::new();
        let parsed = parse_markup(&file, &mut diags);
        assert_eq!(parsed.scripts, vec!["let x = 1;"]);
        assert_eq!(parsed.styles, vec![".x{color:red}"]);
    }
}
