//! Expression/script analyzer (C3).
//!
//! Parses embedded expressions and the component script with `oxc`, the
//! same parser the teacher crate uses for its JS/TS surface. Dependency
//! extraction is a hand-written recursive walk (rather than the generic
//! `oxc_ast_visit::Visit` trait) because spec.md §4.3's rules need
//! fine-grained control over exactly when a `MemberExpression` chain gets
//! flattened into one dependency versus decomposed into its pieces.

use std::collections::HashSet;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, BindingPatternKind, Expression, FormalParameter, Program, Statement,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use crate::node::DepSet;

/// Parse `code` as a standalone expression, panicking-free: on failure
/// returns `None` and the caller records a [`crate::source::Diagnostic`].
pub fn try_parse_expression(code: &str) -> Option<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, code, source_type).parse_expression();
    ret.ok().map(|_| code.to_string())
}

#[derive(Debug, Default)]
struct DepWalk {
    deps: Vec<String>,
    seen: HashSet<String>,
    member_expressions: Vec<String>,
    has_parameters: bool,
    is_callee: bool,
}

impl DepWalk {
    fn push_dep(&mut self, name: &str) {
        if self.seen.insert(name.to_string()) {
            self.deps.push(name.to_string());
        }
    }
}

fn flatten_member<'a>(expr: &Expression<'a>) -> Option<String> {
    match expr {
        Expression::Identifier(id) => Some(id.name.to_string()),
        Expression::ThisExpression(_) => Some("this".to_string()),
        Expression::StaticMemberExpression(m) => {
            let base = flatten_member(&m.object)?;
            Some(format!("{base}.{}", m.property.name))
        }
        Expression::ComputedMemberExpression(m) => {
            let base = flatten_member(&m.object)?;
            match &m.expression {
                Expression::StringLiteral(s) => Some(format!("{base}[{}]", s.value)),
                Expression::NumericLiteral(n) => Some(format!("{base}[{}]", n.value)),
                Expression::Identifier(id) => Some(format!("{base}[{}]", id.name)),
                _ => Some(base),
            }
        }
        _ => None,
    }
}

fn walk_argument<'a>(arg: &Argument<'a>, ctx: &mut DepWalk) {
    if let Some(expr) = arg.as_expression() {
        walk_expr(expr, ctx);
    } else if let Argument::SpreadElement(s) = arg {
        walk_expr(&s.argument, ctx);
    }
}

fn walk_params<'a>(params: &[FormalParameter<'a>]) -> bool {
    !params.is_empty()
}

fn bound_names(kind: &BindingPatternKind<'_>, out: &mut Vec<String>) {
    match kind {
        BindingPatternKind::BindingIdentifier(id) => out.push(id.name.to_string()),
        BindingPatternKind::ObjectPattern(obj) => {
            for prop in &obj.properties {
                bound_names(&prop.value.kind, out);
            }
        }
        BindingPatternKind::ArrayPattern(arr) => {
            for elem in arr.elements.iter().flatten() {
                bound_names(&elem.kind, out);
            }
        }
        BindingPatternKind::AssignmentPattern(ap) => bound_names(&ap.left.kind, out),
    }
}

fn walk_expr<'a>(expr: &Expression<'a>, ctx: &mut DepWalk) {
    match expr {
        Expression::Identifier(id) => ctx.push_dep(&id.name),
        Expression::StaticMemberExpression(_) => {
            if let Some(path) = flatten_member(expr) {
                ctx.member_expressions.push(path);
            }
        }
        Expression::ComputedMemberExpression(m) => {
            if let Some(path) = flatten_member(expr) {
                ctx.member_expressions.push(path);
            }
            walk_expr(&m.expression, ctx);
        }
        Expression::CallExpression(call) => {
            let member_callee = matches!(
                &call.callee,
                Expression::StaticMemberExpression(_) | Expression::ComputedMemberExpression(_)
            );
            if member_callee {
                ctx.is_callee = true;
            }
            walk_expr(&call.callee, ctx);
            for arg in &call.arguments {
                walk_argument(arg, ctx);
            }
        }
        Expression::NewExpression(call) => {
            walk_expr(&call.callee, ctx);
            for arg in &call.arguments {
                walk_argument(arg, ctx);
            }
        }
        Expression::ArrowFunctionExpression(f) => {
            if walk_params(&f.params.items) {
                ctx.has_parameters = true;
            }
            if f.expression {
                if let Some(Statement::ExpressionStatement(es)) = f.body.statements.first() {
                    if let Expression::Identifier(id) = &es.expression {
                        ctx.push_dep(&id.name);
                    } else {
                        walk_expr(&es.expression, ctx);
                    }
                }
            } else {
                for stmt in &f.body.statements {
                    walk_stmt(stmt, ctx);
                }
            }
        }
        Expression::FunctionExpression(f) => {
            if let Some(body) = &f.body {
                for stmt in &body.statements {
                    walk_stmt(stmt, ctx);
                }
            }
        }
        Expression::BinaryExpression(b) => {
            walk_expr(&b.left, ctx);
            walk_expr(&b.right, ctx);
        }
        Expression::LogicalExpression(b) => {
            walk_expr(&b.left, ctx);
            walk_expr(&b.right, ctx);
        }
        Expression::UnaryExpression(u) => walk_expr(&u.argument, ctx),
        Expression::UpdateExpression(u) => walk_expr(&u.argument, ctx),
        Expression::ConditionalExpression(c) => {
            walk_expr(&c.test, ctx);
            walk_expr(&c.consequent, ctx);
            walk_expr(&c.alternate, ctx);
        }
        Expression::AssignmentExpression(a) => {
            walk_expr(&a.right, ctx);
        }
        Expression::SequenceExpression(s) => {
            for e in &s.expressions {
                walk_expr(e, ctx);
            }
        }
        Expression::ArrayExpression(a) => {
            for el in &a.elements {
                if let Some(expr) = el.as_expression() {
                    walk_expr(expr, ctx);
                }
            }
        }
        Expression::ObjectExpression(o) => {
            for prop in &o.properties {
                if let oxc_ast::ast::ObjectPropertyKind::ObjectProperty(p) = prop {
                    walk_expr(&p.value, ctx);
                }
            }
        }
        Expression::TemplateLiteral(t) => {
            for e in &t.expressions {
                walk_expr(e, ctx);
            }
        }
        Expression::ParenthesizedExpression(p) => walk_expr(&p.expression, ctx),
        Expression::AwaitExpression(a) => walk_expr(&a.argument, ctx),
        _ => {}
    }
}

fn walk_stmt<'a>(stmt: &Statement<'a>, ctx: &mut DepWalk) {
    match stmt {
        Statement::ExpressionStatement(es) => walk_expr(&es.expression, ctx),
        Statement::ReturnStatement(r) => {
            if let Some(arg) = &r.argument {
                walk_expr(arg, ctx);
            }
        }
        Statement::IfStatement(i) => {
            walk_expr(&i.test, ctx);
            walk_stmt(&i.consequent, ctx);
            if let Some(alt) = &i.alternate {
                walk_stmt(alt, ctx);
            }
        }
        Statement::BlockStatement(b) => {
            for s in &b.body {
                walk_stmt(s, ctx);
            }
        }
        Statement::VariableDeclaration(v) => {
            for decl in &v.declarations {
                if let Some(init) = &decl.init {
                    walk_expr(init, ctx);
                }
            }
        }
        _ => {}
    }
}

/// `findDependencies(tree, content?)` (§4.3). `content` is the raw source
/// text of the whole expression, used only for the self-reference check on
/// trivial `{x}` attributes.
pub fn find_dependencies(code: &str, content: Option<&str>) -> DepSet {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let Ok(expr) = Parser::new(&allocator, code, source_type).parse_expression() else {
        return DepSet::new();
    };

    let mut ctx = DepWalk::default();
    walk_expr(&expr, &mut ctx);

    if !ctx.member_expressions.is_empty() && !ctx.has_parameters && !ctx.is_callee {
        let last = ctx.member_expressions.last().unwrap().clone();
        ctx.push_dep(&last);
    }

    if ctx.deps.len() == 1 {
        if let Some(content) = content {
            if ctx.deps[0] == content.trim() {
                return DepSet::new();
            }
        }
    }

    ctx.deps.into_iter().collect()
}

/// `checkDependencies(content, deps)` (§4.3): true if `content` is `dep`,
/// or begins with `dep.` / `dep[`.
pub fn check_dependencies(content: &str, deps: &DepSet) -> bool {
    deps.iter().any(|dep| {
        content == dep || content.starts_with(&format!("{dep}.")) || content.starts_with(&format!("{dep}["))
    })
}

/// `functionExpressionAnalysis(expression)` (§4.3).
#[derive(Debug, Default, Clone)]
pub struct FunctionAnalysis {
    pub is_function: bool,
    pub is_assignment: bool,
    pub is_identifier: bool,
    pub is_call: bool,
    pub is_lambda: bool,
    pub params: Vec<String>,
    pub arguments: Vec<String>,
}

pub fn function_expression_analysis(code: &str) -> FunctionAnalysis {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let mut out = FunctionAnalysis::default();
    let Ok(expr) = Parser::new(&allocator, code, source_type).parse_expression() else {
        return out;
    };

    match &expr {
        Expression::ArrowFunctionExpression(f) => {
            out.is_lambda = true;
            out.is_function = true;
            let mut names = Vec::new();
            for p in &f.params.items {
                bound_names(&p.pattern.kind, &mut names);
            }
            out.params = names;
        }
        Expression::FunctionExpression(f) => {
            out.is_function = true;
            let mut names = Vec::new();
            for p in &f.params.items {
                bound_names(&p.pattern.kind, &mut names);
            }
            out.params = names;
        }
        Expression::AssignmentExpression(_) => out.is_assignment = true,
        Expression::Identifier(_) => out.is_identifier = true,
        Expression::CallExpression(call) => {
            out.is_call = true;
            for arg in &call.arguments {
                if let Some(e) = arg.as_expression() {
                    if let Expression::Identifier(id) = e {
                        out.arguments.push(id.name.to_string());
                    }
                }
            }
        }
        _ => {}
    }

    out
}

/// One `$:` labeled "computed" statement, classified per §4.3 shape 1-4.
#[derive(Debug, Clone)]
pub enum ComputedShape {
    /// `(dep, body)` — `dep` supplies explicit sources, `body` is the effect.
    Sequence { sources: DepSet, body_span: (u32, u32) },
    /// A bare function/arrow expression body.
    Lambda { body_span: (u32, u32) },
    /// `id = expr` — declares `id`, tracks it as an updated dependency.
    Assignment {
        id: String,
        expr_span: (u32, u32),
        dependencies: DepSet,
    },
    /// A bare call expression body.
    Call { body_span: (u32, u32) },
}

#[derive(Debug, Clone, Default)]
pub struct ComputedStatement {
    pub label_span: (u32, u32),
    pub shape: Option<ComputedShape>,
}

/// Scan top-level statements of `program` for `$:`-labeled statements.
fn find_labeled_computed<'a>(program: &Program<'a>, source: &str) -> Vec<ComputedStatement> {
    let mut out = Vec::new();
    for stmt in &program.body {
        if let Statement::LabeledStatement(label) = stmt {
            if label.label.name.as_str() != "$" {
                continue;
            }
            let span = (stmt.span().start, stmt.span().end);
            let shape = match &label.body {
                Statement::ExpressionStatement(es) => classify_computed_expr(&es.expression, source),
                _ => None,
            };
            out.push(ComputedStatement {
                label_span: span,
                shape,
            });
        }
    }
    out
}

fn classify_computed_expr<'a>(expr: &Expression<'a>, _source: &str) -> Option<ComputedShape> {
    match expr {
        Expression::SequenceExpression(seq) if seq.expressions.len() == 2 => {
            let deps_expr = &seq.expressions[0];
            let body = &seq.expressions[1];
            let mut ctx = DepWalk::default();
            walk_expr(deps_expr, &mut ctx);
            let body_span = (body.span().start, body.span().end);
            Some(ComputedShape::Sequence {
                sources: ctx.deps.into_iter().collect(),
                body_span,
            })
        }
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
            let span = (expr.span().start, expr.span().end);
            Some(ComputedShape::Lambda { body_span: span })
        }
        Expression::AssignmentExpression(assign) => {
            let id = match &assign.left {
                oxc_ast::ast::AssignmentTarget::AssignmentTargetIdentifier(id) => id.name.to_string(),
                _ => return None,
            };
            let mut ctx = DepWalk::default();
            walk_expr(&assign.right, &mut ctx);
            Some(ComputedShape::Assignment {
                id,
                expr_span: (assign.right.span().start, assign.right.span().end),
                dependencies: ctx.deps.into_iter().collect(),
            })
        }
        Expression::CallExpression(_) => {
            let span = (expr.span().start, expr.span().end);
            Some(ComputedShape::Call { body_span: span })
        }
        _ => None,
    }
}

/// Result of `prepareScript` (§4.3 point 4).
pub struct PreparedScript {
    pub raw: String,
    pub function_names: Vec<String>,
    pub has_computed: bool,
    pub updated_dependencies: DepSet,
    pub computed: Vec<ComputedStatement>,
}

/// Apply a set of non-overlapping byte-range replacements to `source`,
/// sorted ascending — mirrors the teacher's `RenamerVisitor::replacements`
/// buffer-then-apply pattern (interval replacement on a flat character
/// vector, §9 design notes).
pub fn apply_replacements(source: &str, mut replacements: Vec<(u32, u32, String)>) -> String {
    replacements.sort_by_key(|r| r.0);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for (start, end, text) in replacements {
        let start = start as usize;
        let end = end as usize;
        if start < cursor {
            continue; // overlapping replacement, keep the first one
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&text);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Collect function declaration / `let f = (...) => ...` names (§4.3 point 5).
pub fn collect_function_names<'a>(program: &Program<'a>) -> Vec<String> {
    let mut names = Vec::new();
    for stmt in &program.body {
        match stmt {
            Statement::FunctionDeclaration(f) => {
                if let Some(id) = &f.id {
                    names.push(id.name.to_string());
                }
            }
            Statement::VariableDeclaration(v) => {
                for decl in &v.declarations {
                    if let (BindingPatternKind::BindingIdentifier(id), Some(init)) =
                        (&decl.id.kind, &decl.init)
                    {
                        if matches!(
                            init,
                            Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)
                        ) {
                            names.push(id.name.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names
}

/// Derive `functionDependencies` (§4.3 point 4): names of functions that
/// don't reference a tracked dependency directly in their own body, but call
/// another function that does. Those callers still need their update call
/// forced, since `maybe_inject`'s own body walk has nothing to find there.
pub fn derive_function_dependencies(source: &str, dependencies: &DepSet) -> DepSet {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    let program = ret.program;

    let mut direct = DepSet::new();
    let mut calls: Vec<(String, Vec<String>)> = Vec::new();

    for stmt in &program.body {
        let named_body = match stmt {
            Statement::FunctionDeclaration(f) => f.id.as_ref().zip(f.body.as_ref()),
            _ => None,
        };
        if let Some((id, body)) = named_body {
            let mut ctx = DepWalk::default();
            for s in &body.statements {
                walk_stmt(s, &mut ctx);
            }
            if ctx.deps.iter().any(|d| dependencies.contains(d)) {
                direct.insert(id.name.to_string());
            }
            calls.push((id.name.to_string(), ctx.deps));
            continue;
        }
        if let Statement::VariableDeclaration(v) = stmt {
            for decl in &v.declarations {
                if let (BindingPatternKind::BindingIdentifier(id), Some(Expression::ArrowFunctionExpression(f))) =
                    (&decl.id.kind, &decl.init)
                {
                    if f.expression {
                        continue;
                    }
                    let mut ctx = DepWalk::default();
                    for s in &f.body.statements {
                        walk_stmt(s, &mut ctx);
                    }
                    if ctx.deps.iter().any(|d| dependencies.contains(d)) {
                        direct.insert(id.name.to_string());
                    }
                    calls.push((id.name.to_string(), ctx.deps));
                }
            }
        }
    }

    let mut forced = DepSet::new();
    for (name, referenced) in &calls {
        if direct.contains(name) {
            continue;
        }
        if referenced.iter().any(|r| direct.contains(r)) {
            forced.insert(name.clone());
        }
    }
    forced
}

/// `prepareScript(ast, dependencies, functionDependencies, changedStyles, ssr)`
/// (§4.3 point 1-4). Rewrites `$:` computed statements into either
/// `$.computed(...)` calls (csr) or inline statements (ssr), and — csr only
/// — injects an update call at the end of any function whose body touches a
/// tracked dependency.
pub fn prepare_script(
    source: &str,
    dependencies: &DepSet,
    function_dependencies: &DepSet,
    ssr: bool,
) -> PreparedScript {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    let program = ret.program;

    let computed = find_labeled_computed(&program, source);
    let function_names = collect_function_names(&program);

    let mut replacements = Vec::new();
    let mut updated_dependencies = DepSet::new();

    for stmt in &computed {
        let Some(shape) = &stmt.shape else { continue };
        let replacement = match shape {
            ComputedShape::Sequence { sources, body_span } => {
                let body_text = &source[body_span.0 as usize..body_span.1 as usize];
                if ssr {
                    format!("{body_text};")
                } else {
                    let deps_list = sources
                        .iter()
                        .map(|d| format!("() => {d}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("$.computed(() => ({body_text}), {deps_list});")
                }
            }
            ComputedShape::Lambda { body_span } => {
                let body_text = &source[body_span.0 as usize..body_span.1 as usize];
                if ssr {
                    format!("({body_text})();")
                } else {
                    format!("$.computed({body_text});")
                }
            }
            ComputedShape::Assignment {
                id,
                expr_span,
                dependencies: deps,
            } => {
                updated_dependencies.insert(id.clone());
                for d in deps {
                    updated_dependencies.insert(d.clone());
                }
                let expr_text = &source[expr_span.0 as usize..expr_span.1 as usize];
                if ssr {
                    format!("let {id}; {id} = {expr_text};")
                } else {
                    format!("let {id}; $.computed(() => {{ {id} = {expr_text}; }});")
                }
            }
            ComputedShape::Call { body_span } => {
                let body_text = &source[body_span.0 as usize..body_span.1 as usize];
                if ssr {
                    format!("{body_text};")
                } else {
                    format!("$.computed(() => {{ {body_text}; }});")
                }
            }
        };
        replacements.push((stmt.label_span.0, stmt.label_span.1, replacement));
    }

    if !ssr {
        inject_update_calls(
            &program,
            source,
            dependencies,
            function_dependencies,
            &mut replacements,
        );
    }

    let raw = apply_replacements(source, replacements);
    let has_computed = !computed.is_empty();
    let hash_updated = !updated_dependencies.is_empty();
    let _ = hash_updated;

    PreparedScript {
        raw,
        function_names,
        has_computed,
        updated_dependencies,
        computed,
    }
}

/// For every function declaration/arrow whose body references a tracked
/// dependency, append an update call at the end of the body (or force
/// injection at the start for names in `function_dependencies`). Skips
/// functions that already `return` (§4.3 point 4).
fn inject_update_calls<'a>(
    program: &Program<'a>,
    source: &str,
    dependencies: &DepSet,
    function_dependencies: &DepSet,
    replacements: &mut Vec<(u32, u32, String)>,
) {
    for stmt in &program.body {
        match stmt {
            Statement::FunctionDeclaration(f) => {
                let Some(body) = &f.body else { continue };
                let name = f.id.as_ref().map(|id| id.name.to_string());
                let forced = name
                    .as_deref()
                    .map(|n| function_dependencies.contains(n))
                    .unwrap_or(false);
                maybe_inject(body, source, dependencies, forced, replacements);
            }
            Statement::VariableDeclaration(v) => {
                for decl in &v.declarations {
                    if let (BindingPatternKind::BindingIdentifier(id), Some(Expression::ArrowFunctionExpression(f))) =
                        (&decl.id.kind, &decl.init)
                    {
                        let forced = function_dependencies.contains(id.name.as_str());
                        if !f.expression {
                            maybe_inject(&f.body, source, dependencies, forced, replacements);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn maybe_inject<'a>(
    body: &oxc_ast::ast::FunctionBody<'a>,
    source: &str,
    dependencies: &DepSet,
    forced: bool,
    replacements: &mut Vec<(u32, u32, String)>,
) {
    let has_return = body
        .statements
        .iter()
        .any(|s| matches!(s, Statement::ReturnStatement(_)));
    if has_return {
        return;
    }

    let mut ctx = DepWalk::default();
    for stmt in &body.statements {
        walk_stmt(stmt, &mut ctx);
    }
    let touches_dependency = ctx.deps.iter().any(|d| dependencies.contains(d));

    if !touches_dependency && !forced {
        return;
    }

    let insert_at = body.span.end.saturating_sub(1); // just before the closing `}`
    let _ = source;
    replacements.push((insert_at, insert_at, "$u();".to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_simple_identifier_dependency() {
        let deps = find_dependencies("count", None);
        assert_eq!(deps, DepSet::from(["count".to_string()]));
    }

    #[test]
    fn avoids_self_reference_for_trivial_attribute() {
        let deps = find_dependencies("x", Some("x"));
        assert!(deps.is_empty());
    }

    #[test]
    fn member_path_prefers_outermost_access() {
        let deps = find_dependencies("user.name.length", None);
        assert_eq!(deps, DepSet::from(["user.name.length".to_string()]));
    }

    #[test]
    fn call_with_member_callee_does_not_append_member_path() {
        let deps = find_dependencies("items.map(x => x)", None);
        assert!(deps.contains("items"));
        assert!(!deps.contains("items.map"));
    }

    #[test]
    fn check_dependencies_matches_member_prefix() {
        let mut deps = DepSet::new();
        deps.insert("user".to_string());
        assert!(check_dependencies("user.name", &deps));
        assert!(check_dependencies("user[0]", &deps));
        assert!(!check_dependencies("username", &deps));
    }

    #[test]
    fn prepare_script_lowers_assignment_computed() {
        let prepared = prepare_script("let n = 1; $: d = n * 2;", &DepSet::from(["n".to_string()]), &DepSet::new(), false);
        assert!(prepared.raw.contains("let d;"));
        assert!(prepared.raw.contains("$.computed"));
        assert!(prepared.updated_dependencies.contains("d"));
    }

    #[test]
    fn prepare_script_ssr_inlines_computed() {
        let prepared = prepare_script("let n = 1; $: d = n * 2;", &DepSet::from(["n".to_string()]), &DepSet::new(), true);
        assert!(!prepared.raw.contains("$.computed"));
        assert!(prepared.raw.contains("d = n * 2"));
    }
}
