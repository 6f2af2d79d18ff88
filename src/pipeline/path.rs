//! Path template compilation and matching
//!
//! Compiles a flow's declared path template (`/orders/:orderId/items`) into
//! a reusable regex-backed matcher. Compiled matchers are memoized by the
//! raw template string; compilation is pure and deterministic, so the cache
//! never needs invalidation within a flow's lifetime. Duplicate concurrent
//! compiles of the same template are tolerated — both results are
//! equivalent and the last write wins.

use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;

use crate::definition::PathOperator;
use crate::errors::{Error, Result};

/// Character class standing in for a `:param` segment: any run of URI
/// pchar-like characters, not crossing a `/` boundary.
const PARAM_PATTERN: &str = "[a-zA-Z0-9\\-._~%!$&'()* +,;=:@]+";

/// A compiled path template.
///
/// One compilation serves both operators: EQUALS requires the pattern to
/// consume the whole request path, STARTS_WITH anchors it at the start
/// only, so anything after the matched prefix (further sub-segments
/// included) is accepted.
#[derive(Debug)]
pub struct CompiledPath {
    template: String,
    exact: Regex,
    prefix: Regex,
}

impl CompiledPath {
    /// Compile a path template. Fails on templates the regex engine
    /// rejects; a failed compile is never cached.
    pub fn compile(template: &str) -> Result<Self> {
        let mut body = String::new();
        for segment in template.split('/') {
            if segment.is_empty() {
                continue;
            }
            body.push('/');
            if segment.starts_with(':') {
                body.push_str(PARAM_PATTERN);
            } else {
                body.push_str(&regex::escape(segment));
            }
        }
        if body.is_empty() {
            // An empty (or all-slash) template compiles to the root path.
            body.push('/');
        }
        body.push_str("/?");

        let exact = Regex::new(&format!("^{}$", body))
            .map_err(|e| Error::path_compile(template, e.to_string()))?;
        let prefix = Regex::new(&format!("^{}", body))
            .map_err(|e| Error::path_compile(template, e.to_string()))?;

        Ok(Self { template: template.to_string(), exact, prefix })
    }

    /// The raw template this matcher was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Match a request path under the given operator.
    pub fn matches(&self, operator: PathOperator, path: &str) -> bool {
        match operator {
            PathOperator::Equals => self.exact.is_match(path),
            PathOperator::StartsWith => self.prefix.is_match(path),
        }
    }
}

/// Thread-safe memoizing cache of compiled path templates, keyed by the
/// exact raw template string.
#[derive(Debug, Default)]
pub struct PathMatcherCache {
    cache: DashMap<String, Arc<CompiledPath>>,
}

impl PathMatcherCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled matcher for `template`, compiling it on first
    /// use. Concurrent callers may compile the same template twice; the
    /// results are equivalent, so no single-flight coordination is needed.
    pub fn matcher(&self, template: &str) -> Result<Arc<CompiledPath>> {
        if let Some(found) = self.cache.get(template) {
            return Ok(Arc::clone(found.value()));
        }
        let compiled = Arc::new(CompiledPath::compile(template)?);
        self.cache.insert(template.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Number of distinct templates compiled so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
