//! Client-side-render top-level emission (C8).
//!
//! Wraps a driven [`Component`]'s csr body in the mount-function template,
//! plus the scoped `<style>` injection call when `options.css.compile` is
//! `Injected`.

use crate::figure::Component;
use crate::options::{CssCompile, Options};

pub fn emit_csr_module(component: &Component, script: &str, options: &Options) -> String {
    let mut out = String::new();
    out.push_str("import * as $ from \"sfc/runtime\";\n\n");

    if !script.trim().is_empty() {
        out.push_str(script);
        out.push_str("\n\n");
    }

    if matches!(options.css.compile, CssCompile::Injected) && !component.styles.trim().is_empty() {
        out.push_str(&format!(
            "$.style({:?}, {:?});\n\n",
            options.component.name, component.styles
        ));
    }

    out.push_str(&format!(
        "export default function {}($target, $props) {{\nconst $u = $.update();\n{}\nreturn $target;\n}}\n",
        sanitize_fn_name(&component.name),
        component.csr_body,
    ));

    out
}

fn sanitize_fn_name(name: &str) -> String {
    if name.is_empty() {
        "Component".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ComponentScope;

    #[test]
    fn emits_mount_function_with_import() {
        let component = Component {
            name: "Card".to_string(),
            csr_body: "const $r0 = $.element(\"div\");".to_string(),
            ssr_body: String::new(),
            styles: String::new(),
        };
        let mut options = Options::default();
        options.component = ComponentScope {
            file: "Card.sfc".to_string(),
            name: "Card".to_string(),
        };
        let out = emit_csr_module(&component, "", &options);
        assert!(out.contains("import * as $ from"));
        assert!(out.contains("export default function Card"));
        assert!(out.contains("$.element(\"div\")"));
    }
}
