//! Process-wide compiler state (C10).
//!
//! A [`Session`] holds the cross-file state a single compile shouldn't have
//! to rebuild from scratch every call: the [`HashAllocator`] (so two
//! components never collide on a scoped class name) and, when
//! `options.cache_memory` is set, a content-hash keyed memoization table of
//! past results. Guarded by a single `Mutex` rather than per-field locks —
//! the teacher's own cache (`IncrementalCache`) takes the same
//! coarse-grained approach since compiles are not latency-sensitive enough
//! to need finer locking.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::hash::HashAllocator;
use crate::options::Options;
use crate::source::{Diagnostic, SourceFile};
use crate::{compile_uncached, CompileOutput};

struct SessionState {
    allocator: HashAllocator,
    cache: HashMap<String, (String, CompileOutput)>,
}

/// Shared, reusable compiler session (§9). Create one per process (or per
/// build) and call [`Session::compile`] for every component file so scoped
/// class names stay unique and, if enabled, repeat compiles of unchanged
/// source are free.
pub struct Session {
    state: Mutex<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            state: Mutex::new(SessionState {
                allocator: HashAllocator::new(),
                cache: HashMap::new(),
            }),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `file` under `options`, reusing the session's shared hash
    /// allocator (and, when `options.cache_memory` is set, a cached result
    /// keyed by the file's path and content hash).
    pub fn compile(&self, file: &SourceFile, options: &Options) -> (CompileOutput, Vec<Diagnostic>) {
        let content_hash = hash_content(&file.code);

        if options.cache_memory {
            let state = self.state.lock().expect("session mutex poisoned");
            if let Some((hash, cached)) = state.cache.get(&file.path) {
                if hash == &content_hash {
                    return (cached.clone(), Vec::new());
                }
            }
        }

        let mut state = self.state.lock().expect("session mutex poisoned");
        let (output, diagnostics) = compile_uncached(file, options, &mut state.allocator);

        if options.cache_memory {
            state
                .cache
                .insert(file.path.clone(), (content_hash, output.clone()));
        }

        (output, diagnostics)
    }
}

fn hash_content(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ComponentScope;

    #[test]
    fn repeat_compile_of_unchanged_source_is_cached() {
        let session = Session::new();
        let file = SourceFile::new("a.sfc", "<div>{x}</div><script>let x = 1;</script>");
        let mut options = Options::default();
        options.cache_memory = true;
        options.component = ComponentScope {
            file: "a.sfc".to_string(),
            name: "A".to_string(),
        };

        let (first, _) = session.compile(&file, &options);
        let (second, _) = session.compile(&file, &options);
        assert_eq!(first.js, second.js);
    }

    #[test]
    fn allocator_is_shared_across_components() {
        let session = Session::new();
        let mut options_a = Options::default();
        options_a.component = ComponentScope {
            file: "a.sfc".to_string(),
            name: "A".to_string(),
        };
        let mut options_b = options_a.clone();
        options_b.component.name = "B".to_string();

        let file_a = SourceFile::new("a.sfc", "<div class=\"box\"></div><style>.box { color: red; }</style>");
        let file_b = SourceFile::new("b.sfc", "<div class=\"box\"></div><style>.box { color: blue; }</style>");

        let (out_a, _) = session.compile(&file_a, &options_a);
        let (out_b, _) = session.compile(&file_b, &options_b);
        assert_ne!(out_a.css, out_b.css);
    }
}
