//! Single-file-component compiler.
//!
//! Parses a markup + script + style source artifact (§1-§3) and emits
//! either a client-side-render module with fine-grained reactive DOM
//! updates, or a server-side-render module that renders straight to an
//! HTML string (§4 C7-C9). [`compile`] is the one-shot entry point;
//! [`Session`] is the process-wide entry point for compiling many
//! components while sharing scoped-class uniqueness (C10).

pub mod driver;
pub mod emit_csr;
pub mod emit_ssr;
pub mod error;
pub mod expr;
pub mod figure;
pub mod hash;
pub mod markup;
pub mod node;
pub mod options;
pub mod session;
pub mod source;
pub mod style;

use node::{Attribute, Node};
use options::Options;
use source::{Diagnostic, Diagnostics, ErrorKind, SourceFile};

pub use error::FatalError;
pub use session::Session;

/// Everything one `compile()` call produces (§6.1).
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub js: String,
    pub css: String,
    pub errors: Vec<Diagnostic>,
}

/// One-shot compile with a private, non-shared hash allocator. Prefer
/// [`Session::compile`] when compiling more than one component so scoped
/// class names stay globally unique.
pub fn compile(file: &SourceFile, options: &Options) -> CompileOutput {
    let mut allocator = hash::HashAllocator::new();
    let (output, _) = compile_uncached(file, options, &mut allocator);
    output
}

/// The actual compile pipeline, parameterized over an external hash
/// allocator so [`Session`] can share one across files.
pub(crate) fn compile_uncached(
    file: &SourceFile,
    options: &Options,
    allocator: &mut hash::HashAllocator,
) -> (CompileOutput, Vec<Diagnostic>) {
    let span = tracing::info_span!("compile", path = %file.path, component = %options.component.name);
    let _enter = span.enter();

    let mut diags = Diagnostics::new();
    let mut markup = markup::parse_markup(file, &mut diags);
    resolve_tree_dependencies(&mut markup.document);

    let ssr = options.is_ssr();
    let raw_script = markup.scripts.join("\n");
    let dependencies = collect_reactive_dependencies(&markup.document);
    let function_dependencies = expr::derive_function_dependencies(&raw_script, &dependencies);
    let prepared = expr::prepare_script(&raw_script, &dependencies, &function_dependencies, ssr);

    if prepared.raw.is_empty() && !raw_script.trim().is_empty() {
        diags.push(file, ErrorKind::Syntax, 0, "failed to parse component script");
    }

    let mut css = String::new();
    for (i, style_src) in markup.styles.iter().enumerate() {
        let seed_component = if markup.styles.len() > 1 {
            format!("{}#{i}", options.component.name)
        } else {
            options.component.name.clone()
        };
        let out = style::process_style(style_src, &options.css, &seed_component, allocator);
        css.push_str(&out.css);
        tracing::debug!(classes = out.class_map.len(), ids = out.id_map.len(), "style block compiled");
    }

    let component = driver::drive(&markup.document, options);
    let mut component = component;
    component.styles = css.clone();

    let js = if ssr {
        emit_ssr::emit_ssr_module(&component, &prepared.raw, options)
    } else {
        emit_csr::emit_csr_module(&component, &prepared.raw, options)
    };

    let external_css = match options.css.compile {
        options::CssCompile::External => css,
        options::CssCompile::Injected => String::new(),
    };

    let diagnostics = diags.into_vec();
    (
        CompileOutput {
            js,
            css: external_css,
            errors: diagnostics.clone(),
        },
        diagnostics,
    )
}

fn resolve_tree_dependencies(node: &mut Node) {
    if let Node::Element { attributes, .. } | Node::Component { attributes, .. } = node {
        for attr in attributes.iter_mut() {
            driver::resolve_dependencies(attr);
        }
    }
    match node {
        Node::Document { children }
        | Node::Fragment { children }
        | Node::Element { children, .. }
        | Node::Component { children, .. }
        | Node::Slot { children, .. }
        | Node::SlotContent { children, .. }
        | Node::IfBlock { children, .. }
        | Node::ElseifBlock { children, .. }
        | Node::ElseBlock { children }
        | Node::ForBlock { children, .. } => {
            for child in children.iter_mut() {
                resolve_tree_dependencies(child);
            }
        }
        _ => {}
    }
}

/// All dependency names referenced anywhere in the markup tree, the set
/// `prepareScript`'s function-update injection pass checks function bodies
/// against (§4.3).
fn collect_reactive_dependencies(node: &Node) -> node::DepSet {
    let mut out = node::DepSet::new();
    collect_into(node, &mut out);
    out
}

fn collect_into(node: &Node, out: &mut node::DepSet) {
    let attrs: &[Attribute] = match node {
        Node::Element { attributes, .. } | Node::Component { attributes, .. } => attributes,
        _ => &[],
    };
    for attr in attrs {
        out.extend(attr.dependencies.iter().cloned());
    }
    if let Node::IfBlock { value, .. } | Node::ElseifBlock { value, .. } = node {
        out.extend(expr::find_dependencies(value, None));
    }
    if let Node::ForBlock { value, .. } = node {
        out.extend(expr::find_dependencies(value, None));
    }
    for child in node.children() {
        collect_into(child, out);
    }
}

#[cfg(test)]
mod scenario_tests;
