//! Figure/Spot intermediate representation (C6).
//!
//! A [`Figure`] accumulates the generated body of one component function —
//! either the csr mount function or the ssr render function — as an ordered
//! list of source-code blocks plus a side table of [`Spot`]s (one per
//! dynamic binding: an attribute, an event, a conditional fragment, a loop,
//! ...). Spots are a closed union rather than a dynamic dictionary of
//! handler callbacks (§9 design notes): the driver (C7) matches on the
//! variant instead of looking a handler up by string key.

use crate::node::{EventModifier, ForBinding};

/// One accumulated source fragment plus its dynamic bindings.
#[derive(Debug, Default)]
pub struct Figure {
    blocks: Vec<String>,
    open_blocks: Vec<usize>,
    pub spots: Vec<Spot>,
    reference_count: u32,
}

impl Figure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a complete line to the current (innermost open) block.
    pub fn append_block(&mut self, line: impl Into<String>) {
        if self.open_blocks.is_empty() {
            self.blocks.push(line.into());
        } else {
            let idx = *self.open_blocks.last().unwrap();
            self.blocks[idx].push('\n');
            self.blocks[idx].push_str(&line.into());
        }
    }

    /// Start a new nested block (e.g. an `if (...) {`), tracked so
    /// subsequent `append_block` calls land inside it until `end_block`.
    pub fn start_block(&mut self, header: impl Into<String>) {
        self.blocks.push(header.into());
        self.open_blocks.push(self.blocks.len() - 1);
    }

    pub fn end_block(&mut self, footer: impl Into<String>) {
        if let Some(idx) = self.open_blocks.pop() {
            self.blocks[idx].push('\n');
            self.blocks[idx].push_str(&footer.into());
        } else {
            self.blocks.push(footer.into());
        }
    }

    /// Remove the most recently appended block outright — used when a
    /// speculative block turns out to produce no runtime content (an
    /// all-static subtree, for instance).
    pub fn trim_block(&mut self) {
        self.blocks.pop();
    }

    /// Allocate a fresh DOM reference name (`$r0`, `$r1`, ...).
    pub fn add_reference(&mut self) -> String {
        let name = format!("$r{}", self.reference_count);
        self.reference_count += 1;
        name
    }

    pub fn add_spot(&mut self, spot: Spot) {
        self.spots.push(spot);
    }

    /// Record a spot and, if it has an ssr contribution, append that
    /// contribution directly at the current block position. Unlike
    /// [`Figure::add_spot`] (whose csr call can run after every element in
    /// the component has been created, order doesn't matter there), ssr
    /// builds one `$out` string left to right, so a dynamic fragment has to
    /// land between its static neighbors rather than after all of them.
    pub fn splice_ssr(&mut self, spot: Spot) {
        if let Some(body) = spot.emit_ssr() {
            self.append_block(body);
        }
        self.spots.push(spot);
    }

    pub fn add_block(&mut self, code: impl Into<String>) {
        self.blocks.push(code.into());
    }

    pub fn render(&self) -> String {
        self.blocks.join("\n")
    }
}

/// Closed set of dynamic bindings a [`Figure`] can hold (§4.6). Each variant
/// carries exactly the data its csr/ssr emitters need — no generic "extra
/// fields" bag.
#[derive(Debug, Clone)]
pub enum Spot {
    /// A dynamic plain attribute: `$.attr($r0, "title", () => title)`.
    Attribute {
        reference: String,
        name: String,
        expr: String,
    },
    /// A fully static attribute, pre-concatenated at compile time.
    Static { reference: String, name: String, value: String },
    /// `@name|mods="expr"` — `$.on($r0, "name", ($event) => { ... })`.
    Event {
        reference: String,
        name: String,
        modifiers: Vec<EventModifier>,
        handler: String,
    },
    /// `:value="expr"` on an input/select/textarea — two-way bound value.
    Input {
        reference: String,
        expr: String,
        event: &'static str,
    },
    /// `|name="expr"` — class or attribute toggle.
    Modifier {
        reference: String,
        name: String,
        expr: String,
    },
    /// Two or more stacked `|` modifiers on the same element, merged into
    /// one reactive block so they share a single subscription.
    Modifiers {
        reference: String,
        entries: Vec<(String, String)>,
    },
    /// `#name` — bind the live DOM/component instance to `name`.
    Ref { reference: String, name: String },
    If {
        reference: String,
        branches: Vec<(Option<String>, String)>,
        else_branch: Option<String>,
    },
    For {
        reference: String,
        iterable: String,
        binding: ForBinding,
        index: Option<String>,
        key: Option<String>,
        body: String,
    },
    Slot {
        reference: String,
        name: Option<String>,
        fallback: String,
    },
    SlotContent {
        slot: String,
        body: String,
    },
    Component {
        reference: String,
        name: String,
        props: Vec<(String, String)>,
        slots: Vec<(Option<String>, String)>,
    },
    /// `*name="expr"` / wildcard `*="{ body }"`.
    Action {
        reference: String,
        name: Option<String>,
        body: String,
    },
    /// `[=key]` literal bracket attribute — passed through with no runtime
    /// wrapper at all, just a plain static attribute under a different name.
    Brackets {
        reference: String,
        key: String,
        value: String,
    },
}

impl Spot {
    /// Emit this spot's csr runtime call.
    pub fn emit_csr(&self) -> String {
        match self {
            Spot::Attribute { reference, name, expr } => {
                format!("$.attr({reference}, \"{name}\", () => ({expr}));")
            }
            Spot::Static { reference, name, value } => {
                format!("{reference}.setAttribute(\"{name}\", \"{value}\");")
            }
            Spot::Event {
                reference,
                name,
                modifiers,
                handler,
            } => {
                let guards: String = modifiers.iter().map(|m| m.guard()).collect::<Vec<_>>().join(" ");
                format!(
                    "$.on({reference}, \"{name}\", ($event) => {{ {guards} {handler} }});"
                )
            }
            Spot::Input { reference, expr, event } => {
                format!(
                    "$.bind({reference}, \"{event}\", () => ({expr}), ($value) => {{ {expr} = $value; }});"
                )
            }
            Spot::Modifier { reference, name, expr } => {
                format!("$.modifier({reference}, \"{name}\", () => ({expr}));")
            }
            Spot::Modifiers { reference, entries } => {
                let list = entries
                    .iter()
                    .map(|(name, expr)| format!("[\"{name}\", () => ({expr})]"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("$.modifiers({reference}, [{list}]);")
            }
            Spot::Ref { reference, name } => format!("{name} = {reference};"),
            Spot::If {
                reference,
                branches,
                else_branch,
            } => emit_if_csr(reference, branches, else_branch.as_deref()),
            Spot::For {
                reference,
                iterable,
                binding,
                index,
                key,
                body,
            } => emit_for_csr(reference, iterable, binding, index.as_deref(), key.as_deref(), body),
            Spot::Slot {
                reference,
                name,
                fallback,
            } => {
                let slot_name = name.clone().unwrap_or_else(|| "default".to_string());
                format!(
                    "$.slot({reference}, \"{slot_name}\", $slots, () => {{ {fallback} }});"
                )
            }
            Spot::SlotContent { slot, body } => format!("$slots[\"{slot}\"] = () => {{ {body} }};"),
            Spot::Component {
                reference,
                name,
                props,
                slots,
            } => emit_component_csr(reference, name, props, slots),
            Spot::Action { reference, name, body } => match name {
                Some(name) => format!("$.action({reference}, \"{name}\", {body});"),
                None => format!("$.action({reference}, null, {body});"),
            },
            Spot::Brackets { reference, key, value } => {
                format!("{reference}.setAttribute(\"{key}\", \"{value}\");")
            }
        }
    }

    /// Emit this spot's ssr contribution (a string-builder push, or nothing
    /// for purely client-side spots like events/refs/actions).
    pub fn emit_ssr(&self) -> Option<String> {
        match self {
            Spot::Attribute { name, expr, .. } => {
                Some(format!("$out += ` ${{ {expr} !== false && {expr} != null ? `{name}=\"${{{expr}}}\"` : '' }}`;"))
            }
            Spot::Static { name, value, .. } => Some(format!("$out += ' {name}=\"{value}\"';")),
            Spot::Input { expr, .. } => Some(format!("$out += ` value=\"${{{expr}}}\"`;")),
            Spot::Modifier { name, expr, .. } => {
                Some(format!("$out += ({expr}) ? ' {name}' : '';"))
            }
            Spot::Modifiers { entries, .. } => {
                let parts = entries
                    .iter()
                    .map(|(name, expr)| format!("(({expr}) ? ' {name}' : '')"))
                    .collect::<Vec<_>>()
                    .join(" + ");
                Some(format!("$out += {parts};"))
            }
            Spot::If {
                branches,
                else_branch,
                ..
            } => Some(emit_if_ssr(branches, else_branch.as_deref())),
            Spot::For {
                iterable,
                binding,
                index,
                key: _,
                body,
                ..
            } => Some(emit_for_ssr(iterable, binding, index.as_deref(), body)),
            Spot::Slot { name, fallback, .. } => {
                let slot_name = name.clone().unwrap_or_else(|| "default".to_string());
                Some(format!(
                    "$out += $slots[\"{slot_name}\"] ? $slots[\"{slot_name}\"]() : (() => {{ let $out = ''; {fallback} return $out; }})();"
                ))
            }
            Spot::SlotContent { slot, body } => Some(format!(
                "$slots[\"{slot}\"] = () => {{ let $out = ''; {body} return $out; }};"
            )),
            Spot::Component { name, props, slots, .. } => {
                let prop_list = props
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let slot_list = slots
                    .iter()
                    .map(|(name, body)| {
                        let slot_name = name.clone().unwrap_or_else(|| "default".to_string());
                        format!("\"{slot_name}\": () => {{ let $out = ''; {body} return $out; }}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!(
                    "$out += {name}.renderToString({{ {prop_list} }}, {{ {slot_list} }});"
                ))
            }
            Spot::Brackets { key, value, .. } => Some(format!("$out += ' {key}=\"{value}\"';")),
            // Events, refs, and actions have no server-rendered output.
            Spot::Event { .. } | Spot::Ref { .. } | Spot::Action { .. } => None,
        }
    }
}

fn emit_if_csr(reference: &str, branches: &[(Option<String>, String)], else_branch: Option<&str>) -> String {
    let mut out = String::new();
    for (i, (cond, body)) in branches.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "else if" };
        let cond = cond.clone().unwrap_or_else(|| "true".to_string());
        out.push_str(&format!("{keyword} ({cond}) {{ {body} }} "));
    }
    if let Some(body) = else_branch {
        out.push_str(&format!("else {{ {body} }} "));
    }
    format!("$.conditional({reference}, () => {{ {out} }});")
}

fn emit_if_ssr(branches: &[(Option<String>, String)], else_branch: Option<&str>) -> String {
    let mut out = String::new();
    for (i, (cond, body)) in branches.iter().enumerate() {
        let keyword = if i == 0 { "if" } else { "else if" };
        let cond = cond.clone().unwrap_or_else(|| "true".to_string());
        out.push_str(&format!("{keyword} ({cond}) {{ {body} }} "));
    }
    if let Some(body) = else_branch {
        out.push_str(&format!("else {{ {body} }}"));
    }
    out
}

fn emit_for_csr(
    reference: &str,
    iterable: &str,
    binding: &ForBinding,
    index: Option<&str>,
    key: Option<&str>,
    body: &str,
) -> String {
    let item = if binding.computed.is_empty() {
        binding.name.clone()
    } else {
        format!("{{ {} }}", binding.computed.join(", "))
    };
    let index_param = index.unwrap_or("$index");
    let key_fn = key
        .map(|k| format!("({item}) => ({k})"))
        .unwrap_or_else(|| "null".to_string());
    format!(
        "$.each({reference}, () => ({iterable}), {key_fn}, ({item}, {index_param}) => {{ {body} }});"
    )
}

fn emit_for_ssr(iterable: &str, binding: &ForBinding, index: Option<&str>, body: &str) -> String {
    let item = if binding.computed.is_empty() {
        binding.name.clone()
    } else {
        format!("{{ {} }}", binding.computed.join(", "))
    };
    let index_param = index.unwrap_or("$index");
    format!("({iterable}).forEach(({item}, {index_param}) => {{ {body} }});")
}

fn emit_component_csr(
    reference: &str,
    name: &str,
    props: &[(String, String)],
    slots: &[(Option<String>, String)],
) -> String {
    let prop_list = props
        .iter()
        .map(|(k, v)| format!("{k}: () => ({v})"))
        .collect::<Vec<_>>()
        .join(", ");
    let slot_list = slots
        .iter()
        .map(|(name, body)| {
            let slot_name = name.clone().unwrap_or_else(|| "default".to_string());
            format!("\"{slot_name}\": () => {{ {body} }}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("$.mount({name}, {reference}, {{ {prop_list} }}, {{ {slot_list} }});")
}

/// One compiled component: its name, generated csr/ssr bodies, and the
/// scoped CSS it contributes.
#[derive(Debug, Default)]
pub struct Component {
    pub name: String,
    pub csr_body: String,
    pub ssr_body: String,
    pub styles: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_appends_and_closes_blocks() {
        let mut fig = Figure::new();
        fig.append_block("const $r0 = $.element(\"div\");");
        fig.start_block("if (cond) {");
        fig.append_block("$r0.textContent = 'x';");
        fig.end_block("}");
        let rendered = fig.render();
        assert!(rendered.contains("if (cond) {"));
        assert!(rendered.ends_with('}'));
    }

    #[test]
    fn reference_allocation_is_sequential() {
        let mut fig = Figure::new();
        assert_eq!(fig.add_reference(), "$r0");
        assert_eq!(fig.add_reference(), "$r1");
    }

    #[test]
    fn attribute_spot_emits_reactive_call() {
        let spot = Spot::Attribute {
            reference: "$r0".into(),
            name: "title".into(),
            expr: "label".into(),
        };
        assert_eq!(spot.emit_csr(), "$.attr($r0, \"title\", () => (label));");
        assert!(spot.emit_ssr().is_some());
    }

    #[test]
    fn event_spot_includes_modifier_guards() {
        let spot = Spot::Event {
            reference: "$r0".into(),
            name: "click".into(),
            modifiers: vec![EventModifier::Prevent, EventModifier::Stop],
            handler: "inc();".into(),
        };
        let out = spot.emit_csr();
        assert!(out.contains("preventDefault"));
        assert!(out.contains("stopPropagation"));
        assert!(spot.emit_ssr().is_none());
    }
}
