//! Document tree (§3 Node, Attribute).
//!
//! A closed tagged union replaces the dynamic node taxonomy the original
//! implementation used (§9 design notes): [`Node`] is a sum type, and the
//! driver (C7) dispatches on its discriminant instead of a handler
//! dictionary.

use std::collections::BTreeSet;

pub type DepSet = BTreeSet<String>;

#[derive(Debug, Clone, Default)]
pub struct SourceLoc {
    pub start: u32,
    pub end: u32,
}

/// One `{…}` text/attribute-value fragment, already split at brace
/// boundaries (§4.2).
#[derive(Debug, Clone)]
pub enum ValuePiece {
    /// Literal text outside any `{…}`.
    StringText(String),
    /// The raw text inside `{…}`, with any leading directive tag
    /// (`@html `, `>`, `=`, `*`) already stripped into `directive`.
    BracesText {
        expr: String,
        directive: Option<Directive>,
    },
}

/// Directive recognised at the start of a `{…}` segment (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `{@html …}` — insert raw HTML instead of escaped text.
    Html,
    /// `{> …}` — static, compile-time-only value.
    Static,
    /// `{= …}` — literal value, no dependency tracking.
    Literal,
    /// `{* …}` — forced dynamic, always re-evaluated.
    Dynamic,
}

impl Directive {
    pub fn parse_prefix(content: &str) -> (Option<Directive>, &str) {
        if let Some(rest) = content.strip_prefix("@html ") {
            (Some(Directive::Html), rest)
        } else if let Some(rest) = content.strip_prefix("> ") {
            (Some(Directive::Static), rest)
        } else if let Some(rest) = content.strip_prefix("= ") {
            (Some(Directive::Literal), rest)
        } else if let Some(rest) = content.strip_prefix("* ") {
            (Some(Directive::Dynamic), rest)
        } else {
            (None, content)
        }
    }
}

/// An attribute value: either a plain string, or a sequence of
/// string/braces pieces (§3 Node invariant: "value: either string or
/// sequence of pieces").
#[derive(Debug, Clone)]
pub enum AttrValue {
    Literal(String),
    Pieces(Vec<ValuePiece>),
    /// `#name` ref attributes and the `*` wildcard action carry no value.
    None,
}

impl AttrValue {
    /// True when every piece is static text (no `{…}` content) — the
    /// driver pre-concatenates these instead of emitting a spot (§4.7).
    pub fn is_static(&self) -> bool {
        match self {
            AttrValue::Literal(_) | AttrValue::None => true,
            AttrValue::Pieces(pieces) => pieces
                .iter()
                .all(|p| matches!(p, ValuePiece::StringText(_))),
        }
    }

    pub fn concat_static(&self) -> String {
        match self {
            AttrValue::Literal(s) => s.clone(),
            AttrValue::None => String::new(),
            AttrValue::Pieces(pieces) => pieces
                .iter()
                .map(|p| match p {
                    ValuePiece::StringText(s) => s.as_str(),
                    ValuePiece::BracesText { expr, .. } => expr.as_str(),
                })
                .collect(),
        }
    }
}

/// Event modifiers recognised by `@name|mod1|mod2` (§4.6 EventSpot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventModifier {
    Prevent,
    Stop,
    Ctrl,
    Alt,
    Shift,
    Meta,
    Enter,
    Tab,
    Esc,
    Space,
    Up,
    Down,
    Left,
    Right,
    Delete,
}

impl EventModifier {
    pub fn parse(name: &str) -> Option<EventModifier> {
        use EventModifier::*;
        Some(match name {
            "prevent" => Prevent,
            "stop" => Stop,
            "ctrl" => Ctrl,
            "alt" => Alt,
            "shift" => Shift,
            "meta" => Meta,
            "enter" => Enter,
            "tab" => Tab,
            "esc" => Esc,
            "space" => Space,
            "up" => Up,
            "down" => Down,
            "left" => Left,
            "right" => Right,
            "delete" => Delete,
            _ => return None,
        })
    }

    /// The runtime guard expression prefixed to the handler body.
    pub fn guard(self) -> &'static str {
        use EventModifier::*;
        match self {
            Prevent => "$event.preventDefault();",
            Stop => "$event.stopPropagation();",
            Ctrl => "if (!$event.ctrlKey) return;",
            Alt => "if (!$event.altKey) return;",
            Shift => "if (!$event.shiftKey) return;",
            Meta => "if (!$event.metaKey) return;",
            Enter => "if ($event.key !== 'Enter') return;",
            Tab => "if ($event.key !== 'Tab') return;",
            Esc => "if ($event.key !== 'Escape') return;",
            Space => "if ($event.key !== ' ') return;",
            Up => "if ($event.key !== 'ArrowUp') return;",
            Down => "if ($event.key !== 'ArrowDown') return;",
            Left => "if ($event.key !== 'ArrowLeft') return;",
            Right => "if ($event.key !== 'ArrowRight') return;",
            Delete => "if ($event.key !== 'Delete') return;",
        }
    }
}

/// Closed set of attribute kinds (§3, §4.2, SPEC_FULL.md §3.1).
#[derive(Debug, Clone)]
pub enum AttributeKind {
    /// Plain `name="value"` or `name={expr}`.
    Attribute,
    /// `@name|mods="expr"`.
    Event {
        modifiers: Vec<EventModifier>,
    },
    /// `:name="expr"`.
    Bind,
    /// `|name="expr"`.
    Modifier,
    /// `#name` (no value; `name` is the identifier bound to the ref).
    Ref,
    /// `*name="expr"`, or the wildcard `*="{ body }"` when `name` is empty.
    Action,
    /// `[.key]="expr"`.
    Link,
    /// `[:key]="expr"`.
    Translate,
    /// `[=key]="expr"`.
    LiteralBracket,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    pub value: AttrValue,
    pub loc: SourceLoc,
    /// Identifier/member-path dependencies found in `value` (§3 invariant:
    /// "every dynamic attribute carries a dependency list").
    pub dependencies: DepSet,
}

#[derive(Debug, Clone, Default)]
pub struct ForBinding {
    pub name: String,
    /// Destructured sub-names, e.g. `{name, age}` in `for item as {name, age}`.
    pub computed: Vec<String>,
}

/// Document tree node (§3). `Document`, `Fragment`, and the four control
/// tags are containers with no attributes of their own.
#[derive(Debug, Clone)]
pub enum Node {
    Document {
        children: Vec<Node>,
    },
    Fragment {
        children: Vec<Node>,
    },
    Element {
        name: String,
        void_element: bool,
        attributes: Vec<Attribute>,
        children: Vec<Node>,
        loc: SourceLoc,
    },
    Text {
        content: String,
        loc: SourceLoc,
    },
    Comment {
        content: String,
    },
    Script {
        body: String,
        loc: SourceLoc,
    },
    Style {
        content: String,
        loc: SourceLoc,
    },
    Component {
        name: String,
        attributes: Vec<Attribute>,
        children: Vec<Node>,
        loc: SourceLoc,
    },
    Slot {
        name: Option<String>,
        children: Vec<Node>,
    },
    SlotContent {
        slot: String,
        children: Vec<Node>,
    },
    IfBlock {
        value: String,
        children: Vec<Node>,
    },
    ElseifBlock {
        value: String,
        children: Vec<Node>,
    },
    ElseBlock {
        children: Vec<Node>,
    },
    ForBlock {
        value: String,
        as_binding: ForBinding,
        index: Option<String>,
        key: Option<String>,
        children: Vec<Node>,
    },
}

impl Node {
    pub fn is_ghost(&self) -> bool {
        matches!(
            self,
            Node::IfBlock { .. } | Node::ForBlock { .. }
        ) || matches!(self, Node::Text { content, .. } if !content.trim().is_empty())
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children }
            | Node::Fragment { children }
            | Node::Element { children, .. }
            | Node::Component { children, .. }
            | Node::Slot { children, .. }
            | Node::SlotContent { children, .. }
            | Node::IfBlock { children, .. }
            | Node::ElseifBlock { children, .. }
            | Node::ElseBlock { children }
            | Node::ForBlock { children, .. } => children,
            _ => &[],
        }
    }
}

/// HTML void elements (§4.2).
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Component tags are PascalCase (§4.2 `is_component_tag`, grounded on the
/// teacher's `parse::is_component_tag`).
pub fn is_component_tag(tag: &str) -> bool {
    tag.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}
