//! End-to-end scenarios (spec.md §8), exercising the full pipeline from raw
//! source text through [`compile`] rather than any one module in isolation.

use crate::options::{ComponentScope, CssCompile, Options, Target};
use crate::source::SourceFile;
use crate::{compile, Session};

fn options(name: &str, target: Target) -> Options {
    let mut options = Options::default();
    options.target = target;
    options.component = ComponentScope {
        file: format!("{name}.sfc"),
        name: name.to_string(),
    };
    options
}

/// Scenario A: a component with only static markup compiles with no spots
/// and no diagnostics, csr and ssr alike.
#[test]
fn scenario_a_static_markup_compiles_cleanly() {
    let file = SourceFile::new("Static.sfc", "<div class=\"card\"><p>hello</p></div>");
    let out = compile(&file, &options("Static", Target::Csr));
    assert!(out.errors.is_empty());
    assert!(out.js.contains("$.element(\"div\")"));

    let ssr_out = compile(&file, &options("Static", Target::Ssr));
    assert!(ssr_out.js.contains("renderToString"));
    assert!(ssr_out.js.contains("<div"));
}

/// Scenario B: a `{expr}` text interpolation produces a reactive text spot
/// in csr and an inline escape call in ssr.
#[test]
fn scenario_b_reactive_text_interpolation() {
    let source = "<p>{count}</p><script>let count = 0;</script>";
    let file = SourceFile::new("Counter.sfc", source);

    let csr_out = compile(&file, &options("Counter", Target::Csr));
    assert!(csr_out.js.contains("textContent"));
    assert!(csr_out.js.contains("count"));

    let ssr_out = compile(&file, &options("Counter", Target::Ssr));
    assert!(ssr_out.js.contains("$.escape"));
}

/// Scenario C: an `@click` handler with modifiers emits the guard
/// expressions ahead of the handler body, and produces no ssr output.
#[test]
fn scenario_c_event_handler_with_modifiers() {
    let source = "<button @click|prevent|stop=\"inc()\">+</button><script>function inc() {}</script>";
    let file = SourceFile::new("Button.sfc", source);

    let csr_out = compile(&file, &options("Button", Target::Csr));
    assert!(csr_out.js.contains("preventDefault"));
    assert!(csr_out.js.contains("stopPropagation"));
    assert!(csr_out.js.contains("inc();"));
}

/// Scenario D: an `if`/`else` control block compiles to a single
/// conditional spot covering both branches.
#[test]
fn scenario_d_if_else_block() {
    let source = "<if value=\"show\"><p>yes</p></if><else><p>no</p></else><script>let show = true;</script>";
    let file = SourceFile::new("Toggle.sfc", source);
    let out = compile(&file, &options("Toggle", Target::Csr));
    assert!(out.js.contains("$.conditional"));
    assert!(out.js.contains("show"));
}

/// Scenario E: a `for` loop binds an item name, an index, and a key
/// expression into the emitted `$.each` call.
#[test]
fn scenario_e_for_loop_with_key() {
    let source =
        "<ul><for value=\"items\" as=\"item\" index=\"i\" key=\"item.id\"><li>{item.name}</li></for></ul><script>let items = [];</script>";
    let file = SourceFile::new("List.sfc", source);
    let out = compile(&file, &options("List", Target::Csr));
    assert!(out.js.contains("$.each"));
    assert!(out.js.contains("item.id"));
    assert!(out.js.contains("(item, i)"));
}

/// Scenario F: scoped styles rename a class consistently between the
/// external stylesheet and the markup that references it, and two
/// components sharing a [`Session`] never collide on the same short hash.
#[test]
fn scenario_f_scoped_styles_share_allocator_across_components() {
    let session = Session::new();

    let mut opts_a = options("Card", Target::Csr);
    opts_a.css.compile = CssCompile::External;
    let file_a = SourceFile::new("Card.sfc", "<div class=\"title\"></div><style>.title { color: red; }</style>");
    let (out_a, _) = session.compile(&file_a, &opts_a);

    let mut opts_b = options("Banner", Target::Csr);
    opts_b.css.compile = CssCompile::External;
    let file_b = SourceFile::new(
        "Banner.sfc",
        "<div class=\"title\"></div><style>.title { color: blue; }</style>",
    );
    let (out_b, _) = session.compile(&file_b, &opts_b);

    assert_ne!(out_a.css, out_b.css);
    assert!(!out_a.css.contains(".title "));
}
