//! Server-side-render top-level emission (C9).
//!
//! Wraps a driven [`Component`]'s ssr body in the `renderToString`
//! template, returning one HTML string instead of mounting into a live DOM.

use crate::figure::Component;
use crate::options::{CssCompile, Options};

pub fn emit_ssr_module(component: &Component, script: &str, options: &Options) -> String {
    let mut out = String::new();
    out.push_str("import * as $ from \"sfc/runtime\";\n\n");

    if !script.trim().is_empty() {
        out.push_str(script);
        out.push_str("\n\n");
    }

    let style_tag = if matches!(options.css.compile, CssCompile::Injected) && !component.styles.trim().is_empty()
    {
        format!(
            "$out += {:?};\n",
            format!("<style>{}</style>", component.styles)
        )
    } else {
        String::new()
    };

    out.push_str(&format!(
        "export function renderToString($props) {{\nlet $out = '';\n{style_tag}{}\nreturn $out;\n}}\n",
        component.ssr_body,
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_render_to_string_with_style_tag() {
        let component = Component {
            name: "Card".to_string(),
            csr_body: String::new(),
            ssr_body: "$out += '<div></div>';".to_string(),
            styles: ".x { color: red; }".to_string(),
        };
        let options = Options::default();
        let out = emit_ssr_module(&component, "", &options);
        assert!(out.contains("export function renderToString"));
        assert!(out.contains("<style>"));
        assert!(out.contains("$out += '<div></div>';"));
    }
}
