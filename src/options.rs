//! Compilation options (§3, §6). Frozen for the duration of one compile.

use std::collections::HashMap;
use std::sync::Arc;

/// Compilation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Csr,
    Ssr,
}

/// Where compiled styles are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssCompile {
    /// Styles are emitted as a `$.style(hash, css)` call inside the csr
    /// function, or inlined into the ssr string builder.
    Injected,
    /// Styles are collected on `component.styles` for the caller to write
    /// to a separate `.css` output.
    External,
}

/// Arguments passed to a [`CssPattern`] function for one selector rename.
#[derive(Debug, Clone)]
pub struct PatternArgs<'a> {
    pub name: &'a str,
    pub min: u8,
    pub max: u8,
    pub component: &'a str,
}

/// `options.css.pattern({name,min,max,component}) -> string` (§6).
pub type CssPattern = Arc<dyn Fn(PatternArgs) -> String + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct CssHash {
    pub min: u8,
    pub max: u8,
}

impl Default for CssHash {
    fn default() -> Self {
        CssHash { min: 1, max: 7 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Breakpoints {
    pub sizes: HashMap<String, String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct NtUnit {
    pub multiplier: f64,
    pub unit: &'static str,
}

impl Default for NtUnit {
    fn default() -> Self {
        NtUnit {
            multiplier: 1.0,
            unit: "px",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CssFeatures {
    pub colors: bool,
    pub nesting: bool,
    pub media_queries: bool,
    pub selectors: bool,
}

impl Default for CssFeatures {
    fn default() -> Self {
        CssFeatures {
            colors: true,
            nesting: true,
            media_queries: true,
            selectors: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentScope {
    pub file: String,
    pub name: String,
}

#[derive(Clone)]
pub struct CssOptions {
    pub compile: CssCompile,
    pub hash: CssHash,
    pub pattern: CssPattern,
    pub features: CssFeatures,
    pub breakpoints: Breakpoints,
    pub nt_unit: NtUnit,
    /// `$.external.style` override: `Some(path)` to force a stylesheet path,
    /// `None` to use the component's own scoped CSS.
    pub external_style: Option<String>,
}

impl std::fmt::Debug for CssOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CssOptions")
            .field("compile", &self.compile)
            .field("hash", &self.hash)
            .field("features", &self.features)
            .field("breakpoints", &self.breakpoints)
            .field("nt_unit", &self.nt_unit)
            .field("external_style", &self.external_style)
            .finish()
    }
}

impl Default for CssOptions {
    fn default() -> Self {
        CssOptions {
            compile: CssCompile::Injected,
            hash: CssHash::default(),
            pattern: Arc::new(|args: PatternArgs| {
                crate::hash::default_pattern(args.name, args.min, args.max)
            }),
            features: CssFeatures::default(),
            breakpoints: Breakpoints::default(),
            nt_unit: NtUnit::default(),
            external_style: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub target: Target,
    pub css: CssOptions,
    /// Whether to reuse a previous compile result when the source bytes for
    /// this path are unchanged (§6, §4.10).
    pub cache_memory: bool,
    pub component: ComponentScope,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            target: Target::Csr,
            css: CssOptions::default(),
            cache_memory: false,
            component: ComponentScope::default(),
        }
    }
}

impl Options {
    pub fn is_ssr(&self) -> bool {
        matches!(self.target, Target::Ssr)
    }
}
