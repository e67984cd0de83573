//! Style processor (C4).
//!
//! Component `<style>` blocks are rewritten into scoped CSS: every class/id
//! selector not wrapped in `:global(...)`/`:static(...)` is renamed through
//! the shared [`HashAllocator`] (C5), a handful of custom at-rules are
//! expanded, and a few convenience declarations (`size`, `mx`/`my`/`px`/`py`,
//! the `nt` unit) are desugared into plain CSS. `cssparser` supplies
//! tokenization (it has no selector grammar of its own, so selector/at-rule
//! splitting is done on top of its token stream, the way the CSS-modules
//! pattern code in the reference pack splits `[hash]`/`[local]` segments on
//! top of plain string slicing rather than a full parser).

use std::collections::HashMap;

use cssparser::{Parser, ParserInput, Token};

use crate::hash::HashAllocator;
use crate::options::{CssFeatures, CssOptions, NtUnit, PatternArgs};

#[derive(Debug, Default, Clone)]
pub struct StyleOutput {
    pub css: String,
    pub class_map: HashMap<String, String>,
    pub id_map: HashMap<String, String>,
}

/// One top-level construct inside a stylesheet: a qualified rule
/// (`selector { decls }`) or an at-rule (`@foo ... { ... }` or `@foo ...;`).
enum Block<'a> {
    Rule { selector: &'a str, body: &'a str },
    AtRule {
        name: &'a str,
        prelude: &'a str,
        body: Option<&'a str>,
    },
}

/// Split `css` into top-level [`Block`]s, respecting brace nesting and
/// quoted strings (mirrors `markup::balanced_brace_end`'s string-aware
/// scan, applied to `{`/`}` instead of HTML tags).
fn split_blocks(css: &str) -> Vec<Block<'_>> {
    let bytes = css.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0usize;
    let mut start = 0usize;
    let mut in_string: Option<u8> = None;

    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'\'' => {
                in_string = Some(c);
                i += 1;
            }
            b'{' => {
                let depth_start = i;
                let mut depth = 1i32;
                let mut j = i + 1;
                let mut in_str: Option<u8> = None;
                while j < bytes.len() && depth > 0 {
                    let cj = bytes[j];
                    if let Some(q) = in_str {
                        if cj == b'\\' {
                            j += 2;
                            continue;
                        }
                        if cj == q {
                            in_str = None;
                        }
                        j += 1;
                        continue;
                    }
                    match cj {
                        b'"' | b'\'' => in_str = Some(cj),
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                let head = css[start..depth_start].trim();
                let body = &css[depth_start + 1..j.saturating_sub(1)];
                push_block(&mut blocks, head, Some(body));
                i = j;
                start = i;
            }
            b';' => {
                let head = css[start..i].trim();
                if !head.is_empty() {
                    push_block(&mut blocks, head, None);
                }
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    let tail = css[start..].trim();
    if !tail.is_empty() {
        push_block(&mut blocks, tail, None);
    }
    blocks
}

fn push_block<'a>(blocks: &mut Vec<Block<'a>>, head: &'a str, body: Option<&'a str>) {
    if head.is_empty() {
        return;
    }
    if let Some(rest) = head.strip_prefix('@') {
        let (name, prelude) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        blocks.push(Block::AtRule {
            name,
            prelude,
            body,
        });
    } else if let Some(body) = body {
        blocks.push(Block::Rule {
            selector: head,
            body,
        });
    }
}

/// Split a top-level selector list on commas that aren't nested inside
/// `:pseudo(...)` parens.
fn split_selectors(selector: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                out.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = selector[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Rewrite one selector, renaming class/id identifiers through `allocator`
/// unless they fall inside `:global(...)`/`:static(...)`, which are
/// unwrapped to their bare contents (the scoping escape hatch).
fn rewrite_selector(
    selector: &str,
    component: &str,
    options: &CssOptions,
    allocator: &mut HashAllocator,
    class_map: &mut HashMap<String, String>,
    id_map: &mut HashMap<String, String>,
) -> String {
    let mut out = String::with_capacity(selector.len());
    let chars: Vec<char> = selector.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i..].starts_with(&[':']) {
            let rest: String = chars[i..].iter().collect();
            if let Some(inner) = unwrap_escape_pseudo(&rest, "global") {
                out.push_str(&inner.0);
                i += inner.1;
                continue;
            }
            if let Some(inner) = unwrap_escape_pseudo(&rest, "static") {
                out.push_str(&inner.0);
                i += inner.1;
                continue;
            }
        }

        if chars[i] == '.' || chars[i] == '#' {
            let is_class = chars[i] == '.';
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '-') {
                j += 1;
            }
            let name: String = chars[i + 1..j].iter().collect();
            if name.is_empty() {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            let seed = format!("{component}:{}:{name}", if is_class { "class" } else { "id" });
            let map = if is_class { &mut *class_map } else { &mut *id_map };
            let renamed = map
                .entry(name.clone())
                .or_insert_with(|| {
                    let candidate = (options.pattern)(PatternArgs {
                        name: &name,
                        min: options.hash.min,
                        max: options.hash.max,
                        component,
                    });
                    allocator.allocate_from(&seed, candidate)
                })
                .clone();
            out.push(chars[i]);
            out.push_str(&renamed);
            i = j;
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}

/// If `rest` starts with `:name(...)`, return `(inner_contents, consumed_len)`.
fn unwrap_escape_pseudo(rest: &str, name: &str) -> Option<(String, usize)> {
    let prefix = format!(":{name}(");
    if !rest.starts_with(&prefix) {
        return None;
    }
    let mut depth = 0i32;
    let mut end = None;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    let inner = &rest[prefix.len()..end];
    Some((inner.to_string(), end + 1))
}

/// Expand the convenience shorthand declarations (`size`, `mx`, `my`, `px`,
/// `py`) into their longhand equivalents; everything else passes through
/// unchanged.
fn expand_declaration(prop: &str, value: &str) -> Vec<(String, String)> {
    match prop {
        "size" => vec![
            ("width".to_string(), value.to_string()),
            ("height".to_string(), value.to_string()),
        ],
        "mx" => vec![
            ("margin-left".to_string(), value.to_string()),
            ("margin-right".to_string(), value.to_string()),
        ],
        "my" => vec![
            ("margin-top".to_string(), value.to_string()),
            ("margin-bottom".to_string(), value.to_string()),
        ],
        "px" => vec![
            ("padding-left".to_string(), value.to_string()),
            ("padding-right".to_string(), value.to_string()),
        ],
        "py" => vec![
            ("padding-top".to_string(), value.to_string()),
            ("padding-bottom".to_string(), value.to_string()),
        ],
        other => vec![(other.to_string(), value.to_string())],
    }
}

/// Resolve every `<number>nt` token in `value` into `options.nt_unit`'s real
/// CSS unit, using `cssparser` to tokenize so we don't misfire on numbers
/// embedded inside strings or `url(...)`.
fn convert_nt_units(value: &str, nt_unit: NtUnit) -> String {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut out = String::new();
    loop {
        let start = parser.position();
        match parser.next_including_whitespace() {
            Ok(Token::Dimension { value: n, unit, .. }) if unit.as_ref() == "nt" => {
                let converted = *n as f64 * nt_unit.multiplier;
                out.push_str(&format!("{converted}{}", nt_unit.unit));
            }
            Ok(_) => {
                let end = parser.position();
                out.push_str(parser.slice(start..end));
            }
            Err(_) => break,
        }
    }
    out
}

fn split_declarations(body: &str) -> Vec<(&str, &str)> {
    body.split(';')
        .filter_map(|decl| {
            let decl = decl.trim();
            if decl.is_empty() {
                return None;
            }
            let (prop, value) = decl.split_once(':')?;
            Some((prop.trim(), value.trim()))
        })
        .collect()
}

/// Render a rule body's declarations, expanding `@include <id>;` references
/// to a `@block <id> { ... }` recorded earlier in the same stylesheet. Plain
/// declaration splitting (`prop: value;`) can't see these since they have no
/// colon, so they're matched before that split is attempted.
fn render_declarations(body: &str, named_blocks: &HashMap<String, String>, nt_unit: NtUnit, out: &mut String) {
    for decl in body.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        if let Some(rest) = decl.strip_prefix('@') {
            if let Some(id) = rest.trim_start().strip_prefix("include") {
                if let Some(block_body) = named_blocks.get(id.trim()) {
                    render_declarations(block_body, named_blocks, nt_unit, out);
                }
            }
            continue;
        }
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        for (p, v) in expand_declaration(prop.trim(), value.trim()) {
            let v = convert_nt_units(&v, nt_unit);
            out.push_str(&format!("  {p}: {v};\n"));
        }
    }
}

/// Process one `<style>` block's raw content into scoped, desugared CSS.
pub fn process_style(
    content: &str,
    options: &CssOptions,
    component: &str,
    allocator: &mut HashAllocator,
) -> StyleOutput {
    let mut class_map = HashMap::new();
    let mut id_map = HashMap::new();
    let mut named_blocks = HashMap::new();
    let mut css = String::new();

    render_stylesheet(
        content,
        options,
        component,
        allocator,
        &mut class_map,
        &mut id_map,
        &mut named_blocks,
        &mut css,
        None,
    );

    StyleOutput {
        css,
        class_map,
        id_map,
    }
}

fn render_stylesheet(
    content: &str,
    options: &CssOptions,
    component: &str,
    allocator: &mut HashAllocator,
    class_map: &mut HashMap<String, String>,
    id_map: &mut HashMap<String, String>,
    named_blocks: &mut HashMap<String, String>,
    out: &mut String,
    wrap_selector_prefix: Option<&str>,
) {
    let features = &options.features;
    for block in split_blocks(content) {
        match block {
            Block::Rule { selector, body } => {
                let rewritten_selectors: Vec<String> = split_selectors(selector)
                    .into_iter()
                    .map(|s| {
                        let s = if features.selectors {
                            rewrite_selector(s, component, options, allocator, class_map, id_map)
                        } else {
                            s.to_string()
                        };
                        match wrap_selector_prefix {
                            Some(prefix) => format!("{prefix} {s}"),
                            None => s,
                        }
                    })
                    .collect();
                out.push_str(&rewritten_selectors.join(", "));
                out.push_str(" {\n");
                render_declarations(body, named_blocks, options.nt_unit, out);
                out.push_str("}\n");
            }
            Block::AtRule {
                name,
                prelude,
                body,
            } => render_at_rule(
                name,
                prelude,
                body,
                options,
                features,
                component,
                allocator,
                class_map,
                id_map,
                named_blocks,
                out,
                wrap_selector_prefix,
            ),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_at_rule(
    name: &str,
    prelude: &str,
    body: Option<&str>,
    options: &CssOptions,
    features: &CssFeatures,
    component: &str,
    allocator: &mut HashAllocator,
    class_map: &mut HashMap<String, String>,
    id_map: &mut HashMap<String, String>,
    named_blocks: &mut HashMap<String, String>,
    out: &mut String,
    wrap_selector_prefix: Option<&str>,
) {
    match name {
        "block" => {
            if let Some(body) = body {
                named_blocks.insert(prelude.trim().to_string(), body.to_string());
            }
        }
        "include" => {
            if let Some(block_body) = named_blocks.get(prelude.trim()) {
                render_declarations(block_body, named_blocks, options.nt_unit, out);
            }
        }
        "light" | "dark" if features.media_queries => {
            let Some(body) = body else { return };
            let query = if name == "light" {
                "(prefers-color-scheme: light)"
            } else {
                "(prefers-color-scheme: dark)"
            };
            out.push_str(&format!("@media {query} {{\n"));
            render_stylesheet(
                body,
                options,
                component,
                allocator,
                class_map,
                id_map,
                named_blocks,
                out,
                wrap_selector_prefix,
            );
            out.push_str("}\n");
        }
        "ltr" | "rtl" => {
            let Some(body) = body else { return };
            let dir = if name == "ltr" { "[dir=ltr]" } else { "[dir=rtl]" };
            let combined_prefix = match wrap_selector_prefix {
                Some(p) => format!("{p} {dir}"),
                None => dir.to_string(),
            };
            render_stylesheet(
                body,
                options,
                component,
                allocator,
                class_map,
                id_map,
                named_blocks,
                out,
                Some(&combined_prefix),
            );
        }
        "screen" if features.media_queries => {
            let Some(body) = body else { return };
            let width = options
                .breakpoints
                .sizes
                .get(prelude.trim())
                .cloned()
                .unwrap_or_else(|| prelude.trim().to_string());
            let unit = options.breakpoints.unit.as_deref().unwrap_or("");
            out.push_str(&format!("@media (min-width: {width}{unit}) {{\n"));
            render_stylesheet(
                body,
                options,
                component,
                allocator,
                class_map,
                id_map,
                named_blocks,
                out,
                wrap_selector_prefix,
            );
            out.push_str("}\n");
        }
        _ => {
            // Pass any other at-rule through untouched (`@media`, `@supports`, ...).
            out.push('@');
            out.push_str(name);
            if !prelude.is_empty() {
                out.push(' ');
                out.push_str(prelude);
            }
            match body {
                Some(body) => {
                    out.push_str(" {\n");
                    render_stylesheet(
                        body,
                        options,
                        component,
                        allocator,
                        class_map,
                        id_map,
                        named_blocks,
                        out,
                        wrap_selector_prefix,
                    );
                    out.push_str("}\n");
                }
                None => out.push_str(";\n"),
            }
        }
    }
}

/// Apply the same shorthand/`nt`-unit desugaring used inside `<style>`
/// blocks to a plain inline `style="..."` attribute value, so `size:` and
/// `10nt` work identically wherever a style value appears (§4.4).
pub fn update_style_attribute(raw: &str, nt_unit: NtUnit) -> String {
    let mut out = String::new();
    for (prop, value) in split_declarations(raw) {
        for (p, v) in expand_declaration(prop, value) {
            let v = convert_nt_units(&v, nt_unit);
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("{p}: {v};"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CssOptions {
        CssOptions::default()
    }

    #[test]
    fn renames_class_selector() {
        let mut alloc = HashAllocator::new();
        let out = process_style(".title { color: red; }", &opts(), "Card", &mut alloc);
        assert!(out.class_map.contains_key("title"));
        let renamed = &out.class_map["title"];
        assert!(out.css.contains(&format!(".{renamed}")));
        assert!(!out.css.contains(".title "));
    }

    #[test]
    fn global_pseudo_class_is_left_unscoped() {
        let mut alloc = HashAllocator::new();
        let out = process_style(":global(.reset) { margin: 0; }", &opts(), "Card", &mut alloc);
        assert!(out.css.contains(".reset"));
        assert!(out.class_map.is_empty());
    }

    #[test]
    fn expands_size_shorthand() {
        let mut alloc = HashAllocator::new();
        let out = process_style(".box { size: 10px; }", &opts(), "Card", &mut alloc);
        assert!(out.css.contains("width: 10px;"));
        assert!(out.css.contains("height: 10px;"));
    }

    #[test]
    fn converts_nt_unit() {
        let mut alloc = HashAllocator::new();
        let mut options = opts();
        options.nt_unit = NtUnit {
            multiplier: 2.0,
            unit: "px",
        };
        let out = process_style(".box { margin: 4nt; }", &options, "Card", &mut alloc);
        assert!(out.css.contains("8px"));
    }

    #[test]
    fn screen_at_rule_resolves_breakpoint() {
        let mut alloc = HashAllocator::new();
        let mut options = opts();
        options.breakpoints.sizes.insert("md".to_string(), "768".to_string());
        options.breakpoints.unit = Some("px".to_string());
        let out = process_style("@screen md { .box { color: red; } }", &options, "Card", &mut alloc);
        assert!(out.css.contains("@media (min-width: 768px)"));
    }

    #[test]
    fn block_and_include_expand_declarations() {
        let mut alloc = HashAllocator::new();
        let out = process_style(
            "@block reset { color: red; } .box { @include reset; }",
            &opts(),
            "Card",
            &mut alloc,
        );
        assert!(out.css.contains("color: red;"));
    }

    #[test]
    fn update_style_attribute_expands_and_converts() {
        let out = update_style_attribute("size: 5nt", NtUnit { multiplier: 1.5, unit: "rem" });
        assert!(out.contains("width: 7.5rem;"));
        assert!(out.contains("height: 7.5rem;"));
    }
}
