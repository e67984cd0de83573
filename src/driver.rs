//! Compiler driver (C7).
//!
//! Walks a [`Node`] tree and fills in a [`Figure`] with static markup plus
//! [`Spot`]s for every dynamic binding. Dispatch is a `match` on `Node`'s
//! discriminant (§9 design notes prefer this over a handler-lookup table),
//! with one function per node kind so each stays readable.

use crate::expr::find_dependencies;
use crate::figure::{Component, Figure, Spot};
use crate::node::{AttrValue, Attribute, AttributeKind, Directive, Node, ValuePiece};
use crate::options::Options;
use crate::style::update_style_attribute;

pub struct DriverContext<'a> {
    pub options: &'a Options,
}

/// Compile one component's document tree into its csr and ssr bodies.
pub fn drive(document: &Node, options: &Options) -> Component {
    let mut csr_figure = Figure::new();
    let mut ssr_figure = Figure::new();
    let ctx = DriverContext { options };

    let Node::Document { children } = document else {
        panic!("drive() expects a Node::Document root");
    };

    let root_name = if children.len() == 1 {
        None
    } else {
        Some(ctx_root_wrapper(&mut csr_figure, &mut ssr_figure))
    };

    for child in children {
        visit_node(child, &ctx, &mut csr_figure, &mut ssr_figure, root_name.as_deref());
    }

    Component {
        name: options.component.name.clone(),
        csr_body: format!("{}\n{}", csr_figure.render(), emit_csr_spots(&csr_figure)),
        ssr_body: ssr_figure.render(),
        styles: String::new(),
    }
}

/// Multiple top-level nodes need a synthetic wrapper element (a "ghost"
/// root) to attach to, since csr mounts into exactly one DOM reference.
fn ctx_root_wrapper(csr: &mut Figure, ssr: &mut Figure) -> String {
    let reference = csr.add_reference();
    csr.append_block(format!("const {reference} = $.element(\"div\");"));
    ssr.append_block("$out += '<div>';".to_string());
    reference
}

fn emit_csr_spots(fig: &Figure) -> String {
    fig.spots.iter().map(|s| s.emit_csr()).collect::<Vec<_>>().join("\n")
}

fn visit_node(
    node: &Node,
    ctx: &DriverContext,
    csr: &mut Figure,
    ssr: &mut Figure,
    parent_ref: Option<&str>,
) {
    match node {
        Node::Document { children } | Node::Fragment { children } => {
            for child in children {
                visit_node(child, ctx, csr, ssr, parent_ref);
            }
        }
        Node::Element { name, attributes, children, void_element, .. } => {
            visit_element(name, attributes, children, *void_element, ctx, csr, ssr)
        }
        Node::Component { name, attributes, children, .. } => {
            visit_component(name, attributes, children, ctx, csr, ssr)
        }
        Node::Text { content, .. } => visit_text(content, ctx, csr, ssr),
        Node::Comment { .. } => {}
        Node::Script { .. } | Node::Style { .. } => {
            // Scripts/styles are handled by C3/C4 before the driver runs;
            // they never appear as markup nodes in the tree it walks.
        }
        Node::Slot { name, children } => visit_slot(name, children, ctx, csr, ssr),
        Node::SlotContent { slot, children } => visit_slot_content(slot, children, ctx, csr, ssr),
        Node::IfBlock { .. } => visit_if_chain(std::slice::from_ref(node), ctx, csr, ssr),
        Node::ElseifBlock { .. } | Node::ElseBlock { .. } => {
            // Only reachable if encountered without a preceding `if` block;
            // treat as a standalone always-true branch.
            visit_if_chain(std::slice::from_ref(node), ctx, csr, ssr)
        }
        Node::ForBlock {
            value,
            as_binding,
            index,
            key,
            children,
        } => visit_for(value, as_binding, index, key, children, ctx, csr, ssr),
    }
}

fn visit_children(children: &[Node], ctx: &DriverContext, csr: &mut Figure, ssr: &mut Figure, parent_ref: Option<&str>) {
    let mut i = 0;
    while i < children.len() {
        if matches!(children[i], Node::IfBlock { .. }) {
            let mut j = i + 1;
            while j < children.len()
                && matches!(children[j], Node::ElseifBlock { .. } | Node::ElseBlock { .. })
            {
                j += 1;
            }
            visit_if_chain(&children[i..j], ctx, csr, ssr);
            i = j;
            continue;
        }
        visit_node(&children[i], ctx, csr, ssr, parent_ref);
        i += 1;
    }
}

fn visit_element(
    name: &str,
    attributes: &[Attribute],
    children: &[Node],
    void_element: bool,
    ctx: &DriverContext,
    csr: &mut Figure,
    ssr: &mut Figure,
) {
    let reference = csr.add_reference();
    csr.append_block(format!("const {reference} = $.element(\"{name}\");"));
    ssr.append_block(format!("$out += '<{name}'"));

    let modifier_attrs: Vec<&Attribute> = attributes
        .iter()
        .filter(|a| matches!(a.kind, AttributeKind::Modifier))
        .collect();
    match modifier_attrs.len() {
        0 => {}
        1 => {
            let attr = modifier_attrs[0];
            let spot = Spot::Modifier {
                reference: reference.clone(),
                name: attr.name.clone(),
                expr: dynamic_expr(&attr.value),
            };
            csr.add_spot(spot.clone());
            ssr.splice_ssr(spot);
        }
        _ => {
            // Stacked `|` modifiers on one element share a single
            // subscription rather than each opening their own.
            let entries = modifier_attrs
                .iter()
                .map(|a| (a.name.clone(), dynamic_expr(&a.value)))
                .collect();
            let spot = Spot::Modifiers { reference: reference.clone(), entries };
            csr.add_spot(spot.clone());
            ssr.splice_ssr(spot);
        }
    }

    for attr in attributes {
        if matches!(attr.kind, AttributeKind::Modifier) {
            continue;
        }
        visit_attribute(&reference, name, attr, ctx, csr, ssr);
    }

    ssr.append_block("$out += '>';".to_string());

    if !void_element {
        visit_children(children, ctx, csr, ssr, Some(&reference));
        ssr.append_block(format!("$out += '</{name}>';"));
    }
}

fn is_input_like(tag: &str) -> bool {
    matches!(tag, "input" | "select" | "textarea")
}

fn visit_attribute(
    reference: &str,
    tag: &str,
    attr: &Attribute,
    ctx: &DriverContext,
    csr: &mut Figure,
    ssr: &mut Figure,
) {
    match &attr.kind {
        AttributeKind::Attribute => {
            if attr.value.is_static() {
                let value = resolve_static_value(&attr.name, &attr.value.concat_static(), ctx);
                csr.add_spot(Spot::Static {
                    reference: reference.to_string(),
                    name: attr.name.clone(),
                    value: value.clone(),
                });
                ssr.append_block(format!("$out += ' {}=\"{}\"';", attr.name, value));
            } else {
                let expr = dynamic_expr(&attr.value);
                csr.add_spot(Spot::Attribute {
                    reference: reference.to_string(),
                    name: attr.name.clone(),
                    expr: expr.clone(),
                });
                ssr.splice_ssr(Spot::Attribute {
                    reference: reference.to_string(),
                    name: attr.name.clone(),
                    expr,
                });
            }
        }
        AttributeKind::Event { modifiers } => {
            let handler = dynamic_expr(&attr.value);
            csr.add_spot(Spot::Event {
                reference: reference.to_string(),
                name: attr.name.clone(),
                modifiers: modifiers.clone(),
                handler: format!("{handler};"),
            });
        }
        AttributeKind::Bind => {
            if is_input_like(tag) {
                let expr = dynamic_expr(&attr.value);
                let event = if tag == "select" || attr.name == "checked" {
                    "change"
                } else {
                    "input"
                };
                csr.add_spot(Spot::Input {
                    reference: reference.to_string(),
                    expr: expr.clone(),
                    event,
                });
                ssr.splice_ssr(Spot::Input {
                    reference: reference.to_string(),
                    expr,
                    event,
                });
            } else {
                // On anything that isn't an input/select/textarea a `:bind`
                // behaves like a plain dynamic attribute.
                let expr = dynamic_expr(&attr.value);
                csr.add_spot(Spot::Attribute {
                    reference: reference.to_string(),
                    name: attr.name.clone(),
                    expr: expr.clone(),
                });
                ssr.splice_ssr(Spot::Attribute {
                    reference: reference.to_string(),
                    name: attr.name.clone(),
                    expr,
                });
            }
        }
        AttributeKind::Modifier => {
            unreachable!("modifiers are grouped and spliced by visit_element before this dispatch")
        }
        AttributeKind::Ref => {
            csr.add_spot(Spot::Ref {
                reference: reference.to_string(),
                name: attr.name.clone(),
            });
        }
        AttributeKind::Action => {
            let body = dynamic_expr(&attr.value);
            let name = if attr.name.is_empty() {
                None
            } else {
                Some(attr.name.clone())
            };
            csr.add_spot(Spot::Action {
                reference: reference.to_string(),
                name,
                body,
            });
        }
        AttributeKind::Link | AttributeKind::Translate => {
            let expr = dynamic_expr(&attr.value);
            csr.add_spot(Spot::Attribute {
                reference: reference.to_string(),
                name: attr.name.clone(),
                expr: expr.clone(),
            });
            ssr.splice_ssr(Spot::Attribute {
                reference: reference.to_string(),
                name: attr.name.clone(),
                expr,
            });
        }
        AttributeKind::LiteralBracket => {
            let value = attr.value.concat_static();
            csr.add_spot(Spot::Brackets {
                reference: reference.to_string(),
                key: attr.name.clone(),
                value: value.clone(),
            });
            ssr.splice_ssr(Spot::Brackets {
                reference: reference.to_string(),
                key: attr.name.clone(),
                value,
            });
        }
    }
}

fn resolve_static_value(name: &str, value: &str, ctx: &DriverContext) -> String {
    if name == "style" {
        update_style_attribute(value, ctx.options.css.nt_unit)
    } else {
        value.to_string()
    }
}

/// Concatenate a piece list into one JS template-literal expression; a
/// single braces piece collapses to its bare expression text.
fn dynamic_expr(value: &AttrValue) -> String {
    match value {
        AttrValue::Literal(s) => format!("\"{s}\""),
        AttrValue::None => "true".to_string(),
        AttrValue::Pieces(pieces) => {
            if pieces.len() == 1 {
                if let ValuePiece::BracesText { expr, directive } = &pieces[0] {
                    if matches!(directive, Some(Directive::Static) | Some(Directive::Literal) | None) {
                        return expr.clone();
                    }
                }
            }
            let parts: Vec<String> = pieces
                .iter()
                .map(|p| match p {
                    ValuePiece::StringText(s) => s.replace('`', "\\`"),
                    ValuePiece::BracesText { expr, .. } => format!("${{{expr}}}"),
                })
                .collect();
            format!("`{}`", parts.join(""))
        }
    }
}

fn visit_text(content: &str, _ctx: &DriverContext, csr: &mut Figure, ssr: &mut Figure) {
    let pieces = crate::markup::split_into_pieces(content);
    if pieces.iter().all(|p| matches!(p, ValuePiece::StringText(_))) {
        csr.append_block(format!("$.text(\"{}\");", content.replace('"', "\\\"")));
        ssr.append_block(format!("$out += \"{}\";", escape_html(content)));
        return;
    }

    let reference = csr.add_reference();
    csr.append_block(format!("const {reference} = $.text(\"\");"));
    let expr = dynamic_expr(&AttrValue::Pieces(pieces.clone()));
    let raw_html = pieces.iter().any(|p| {
        matches!(
            p,
            ValuePiece::BracesText {
                directive: Some(Directive::Html),
                ..
            }
        )
    });

    if raw_html {
        csr.add_spot(Spot::Attribute {
            reference: reference.clone(),
            name: "innerHTML".to_string(),
            expr: expr.clone(),
        });
        ssr.append_block(format!("$out += ({expr});"));
    } else {
        csr.add_spot(Spot::Attribute {
            reference,
            name: "textContent".to_string(),
            expr: expr.clone(),
        });
        ssr.append_block(format!("$out += $.escape({expr});"));
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn visit_if_chain(nodes: &[Node], ctx: &DriverContext, csr: &mut Figure, ssr: &mut Figure) {
    let reference = csr.add_reference();
    csr.append_block(format!("const {reference} = $.anchor();"));

    let mut csr_branches = Vec::new();
    let mut ssr_branches = Vec::new();
    let mut csr_else = None;
    let mut ssr_else = None;

    for node in nodes {
        match node {
            Node::IfBlock { value, children } | Node::ElseifBlock { value, children } => {
                let mut inner_csr = Figure::new();
                let mut inner_ssr = Figure::new();
                visit_children(children, ctx, &mut inner_csr, &mut inner_ssr, Some(&reference));
                csr_branches.push((
                    Some(value.clone()),
                    format!("{}\n{}", inner_csr.render(), emit_csr_spots(&inner_csr)),
                ));
                ssr_branches.push((Some(value.clone()), inner_ssr.render()));
            }
            Node::ElseBlock { children } => {
                let mut inner_csr = Figure::new();
                let mut inner_ssr = Figure::new();
                visit_children(children, ctx, &mut inner_csr, &mut inner_ssr, Some(&reference));
                csr_else = Some(format!("{}\n{}", inner_csr.render(), emit_csr_spots(&inner_csr)));
                ssr_else = Some(inner_ssr.render());
            }
            _ => {}
        }
    }

    csr.add_spot(Spot::If {
        reference: reference.clone(),
        branches: csr_branches,
        else_branch: csr_else,
    });
    ssr.splice_ssr(Spot::If {
        reference,
        branches: ssr_branches,
        else_branch: ssr_else,
    });
}

fn visit_for(
    value: &str,
    binding: &crate::node::ForBinding,
    index: &Option<String>,
    key: &Option<String>,
    children: &[Node],
    ctx: &DriverContext,
    csr: &mut Figure,
    ssr: &mut Figure,
) {
    let reference = csr.add_reference();
    csr.append_block(format!("const {reference} = $.anchor();"));

    let mut inner_csr = Figure::new();
    let mut inner_ssr = Figure::new();
    visit_children(children, ctx, &mut inner_csr, &mut inner_ssr, Some(&reference));
    let csr_body = format!("{}\n{}", inner_csr.render(), emit_csr_spots(&inner_csr));

    csr.add_spot(Spot::For {
        reference: reference.clone(),
        iterable: value.to_string(),
        binding: binding.clone(),
        index: index.clone(),
        key: key.clone(),
        body: csr_body,
    });
    ssr.splice_ssr(Spot::For {
        reference,
        iterable: value.to_string(),
        binding: binding.clone(),
        index: index.clone(),
        key: key.clone(),
        body: inner_ssr.render(),
    });
}

fn visit_slot(name: &Option<String>, children: &[Node], ctx: &DriverContext, csr: &mut Figure, ssr: &mut Figure) {
    let reference = csr.add_reference();
    csr.append_block(format!("const {reference} = $.anchor();"));

    let mut fallback_csr = Figure::new();
    let mut fallback_ssr = Figure::new();
    visit_children(children, ctx, &mut fallback_csr, &mut fallback_ssr, Some(&reference));
    let fallback = format!("{}\n{}", fallback_csr.render(), emit_csr_spots(&fallback_csr));

    csr.add_spot(Spot::Slot {
        reference: reference.clone(),
        name: name.clone(),
        fallback,
    });
    ssr.splice_ssr(Spot::Slot {
        reference,
        name: name.clone(),
        fallback: fallback_ssr.render(),
    });
}

fn visit_slot_content(slot: &str, children: &[Node], ctx: &DriverContext, csr: &mut Figure, ssr: &mut Figure) {
    let mut inner_csr = Figure::new();
    let mut inner_ssr = Figure::new();
    visit_children(children, ctx, &mut inner_csr, &mut inner_ssr, None);
    let csr_body = format!("{}\n{}", inner_csr.render(), emit_csr_spots(&inner_csr));

    csr.add_spot(Spot::SlotContent {
        slot: slot.to_string(),
        body: csr_body,
    });
    ssr.splice_ssr(Spot::SlotContent {
        slot: slot.to_string(),
        body: inner_ssr.render(),
    });
}

fn visit_component(
    name: &str,
    attributes: &[Attribute],
    children: &[Node],
    ctx: &DriverContext,
    csr: &mut Figure,
    ssr: &mut Figure,
) {
    let reference = csr.add_reference();
    csr.append_block(format!("const {reference} = $.anchor();"));

    let mut props = Vec::new();
    for attr in attributes {
        if matches!(attr.kind, AttributeKind::Attribute) {
            props.push((attr.name.clone(), dynamic_expr(&attr.value)));
        }
    }

    let mut csr_slots = Vec::new();
    let mut ssr_slots = Vec::new();
    let mut default_children = Vec::new();
    for child in children {
        if let Node::SlotContent { slot, children } = child {
            let mut inner_csr = Figure::new();
            let mut inner_ssr = Figure::new();
            visit_children(children, ctx, &mut inner_csr, &mut inner_ssr, None);
            csr_slots.push((Some(slot.clone()), format!("{}\n{}", inner_csr.render(), emit_csr_spots(&inner_csr))));
            ssr_slots.push((Some(slot.clone()), inner_ssr.render()));
        } else {
            default_children.push(child.clone());
        }
    }
    if !default_children.is_empty() {
        let mut inner_csr = Figure::new();
        let mut inner_ssr = Figure::new();
        visit_children(&default_children, ctx, &mut inner_csr, &mut inner_ssr, None);
        csr_slots.push((None, format!("{}\n{}", inner_csr.render(), emit_csr_spots(&inner_csr))));
        ssr_slots.push((None, inner_ssr.render()));
    }

    csr.add_spot(Spot::Component {
        reference,
        name: name.to_string(),
        props: props.clone(),
        slots: csr_slots,
    });

    // ssr delegates to the child component's own renderToString; only the
    // resolved static props are worth threading through as plain values.
    let static_props: Vec<(String, String)> = attributes
        .iter()
        .filter(|a| matches!(a.kind, AttributeKind::Attribute) && a.value.is_static())
        .map(|a| (a.name.clone(), format!("\"{}\"", a.value.concat_static())))
        .collect();
    ssr.splice_ssr(Spot::Component {
        reference: String::new(),
        name: name.to_string(),
        props: static_props,
        slots: ssr_slots,
    });
}

/// Collect an attribute's identifier/member-path dependencies (§4.3 wiring
/// into §4.7's "every dynamic attribute carries a dependency list").
pub fn resolve_dependencies(attr: &mut Attribute) {
    if let AttrValue::Pieces(pieces) = &attr.value {
        for piece in pieces {
            if let ValuePiece::BracesText { expr, .. } = piece {
                attr.dependencies.extend(find_dependencies(expr, Some(expr)));
            }
        }
    }
}
