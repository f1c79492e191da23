//! Radix tree router.
//!
//! # Responsibilities
//! - Store routes keyed by path pattern and method
//! - Match a request path to at most one route, capturing parameters
//!
//! # Design Decisions
//! - Static children are prefix-compressed and indexed by first byte
//! - Precedence at every node: static, then `{param}`, then `**`. A failed
//!   deeper branch backtracks to the next alternative
//! - `x` also matches `x/**` with an empty remainder
//! - Lookup works on byte offsets into the request path and never allocates

use std::fmt;

use crate::routing::error::RouteError;
use crate::routing::method::MethodTable;
use crate::routing::params::{ParamSpan, Params};
use crate::routing::pattern::{self, Piece};

/// A registered route.
pub struct Route<T> {
    pattern: Box<str>,
    method: Box<str>,
    param_names: Box<[Box<str>]>,
    value: T,
}

impl<T> Route<T> {
    /// Normalized pattern, always starting with `/`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.param_names.iter().map(|n| &**n)
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> fmt::Debug for Route<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// A successful lookup. Borrows names from the router and values from the
/// request path.
pub struct RouteMatch<'r, 'p, T> {
    route: &'r Route<T>,
    path: &'p str,
    params: Params,
}

impl<'r, 'p, T> RouteMatch<'r, 'p, T> {
    pub fn route(&self) -> &'r Route<T> {
        self.route
    }

    pub fn value(&self) -> &'r T {
        &self.route.value
    }

    pub fn pattern(&self) -> &'r str {
        &self.route.pattern
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Value captured for `name`. The catch-all remainder is named `**`.
    pub fn param(&self, name: &str) -> Option<&'p str> {
        let index = self.route.param_names.iter().position(|n| &**n == name)?;
        self.value_at(self.params.get(index)?)
    }

    /// `(name, value)` pairs in pattern order.
    pub fn params(&self) -> impl Iterator<Item = (&'r str, &'p str)> + '_ {
        let names: &'r [Box<str>] = &self.route.param_names;
        names
            .iter()
            .zip(self.params.spans())
            .map(|(name, span)| (&**name, self.value_at(*span).unwrap_or_default()))
    }

    /// Raw spans, for callers that keep the path around themselves.
    pub fn spans(&self) -> &Params {
        &self.params
    }

    fn value_at(&self, span: ParamSpan) -> Option<&'p str> {
        self.path.get(span.start..span.end)
    }
}

impl<T> fmt::Debug for RouteMatch<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.route.pattern)
            .field("params", &self.params.spans())
            .finish()
    }
}

struct Node<T> {
    prefix: Box<[u8]>,
    indices: Vec<u8>,
    children: Vec<Node<T>>,
    param: Option<Box<Node<T>>>,
    catch_all: MethodTable<Route<T>>,
    routes: MethodTable<Route<T>>,
}

impl<T> Node<T> {
    fn with_prefix(prefix: &[u8]) -> Self {
        Self {
            prefix: prefix.into(),
            indices: Vec::new(),
            children: Vec::new(),
            param: None,
            catch_all: MethodTable::default(),
            routes: MethodTable::default(),
        }
    }

    fn insert(&mut self, pieces: &[Piece<'_>], route: Route<T>) -> Result<(), Route<T>> {
        match pieces.split_first() {
            None => self.routes.insert(&route.method.clone(), route),
            Some((Piece::Static(text), rest)) => self.insert_static(text.as_bytes(), rest, route),
            Some((Piece::Param, rest)) => self
                .param
                .get_or_insert_with(|| Box::new(Node::with_prefix(&[])))
                .insert(rest, route),
            Some((Piece::CatchAll, _)) => self.catch_all.insert(&route.method.clone(), route),
        }
    }

    fn insert_static(&mut self, bytes: &[u8], rest: &[Piece<'_>], route: Route<T>) -> Result<(), Route<T>> {
        let Some(&first) = bytes.first() else {
            return self.insert(rest, route);
        };
        let Some(i) = self.indices.iter().position(|b| *b == first) else {
            let mut child = Node::with_prefix(bytes);
            child.insert(rest, route)?;
            let at = self.indices.partition_point(|b| *b < first);
            self.indices.insert(at, first);
            self.children.insert(at, child);
            return Ok(());
        };

        let child = &mut self.children[i];
        let common = child
            .prefix
            .iter()
            .zip(bytes)
            .take_while(|(a, b)| a == b)
            .count();
        if common < child.prefix.len() {
            child.split(common);
        }
        child.insert_static(&bytes[common..], rest, route)
    }

    /// Keep `prefix[..at]` here and push everything else one level down.
    fn split(&mut self, at: usize) {
        let head = Node::with_prefix(&self.prefix[..at]);
        let mut tail = std::mem::replace(self, head);
        tail.prefix = tail.prefix[at..].into();
        self.indices.push(tail.prefix[0]);
        self.children.push(tail);
    }

    fn static_child(&self, first: u8) -> Option<&Node<T>> {
        let i = self.indices.iter().position(|b| *b == first)?;
        self.children.get(i)
    }

    /// Catch-all route with an empty remainder at `at`.
    fn empty_catch_all<'n>(&'n self, method: &str, at: usize, params: &mut Params) -> Option<&'n Route<T>> {
        let route = self.catch_all.get(method)?;
        params.push(at, at).then_some(route)
    }

    /// `self.prefix` has already been consumed; `pos` points just past it.
    fn find<'n>(&'n self, path: &[u8], pos: usize, method: &str, params: &mut Params) -> Option<&'n Route<T>> {
        let rest = &path[pos..];

        let Some(&first) = rest.first() else {
            if let Some(route) = self.routes.get(method) {
                return Some(route);
            }
            if let Some(route) = self.empty_catch_all(method, pos, params) {
                return Some(route);
            }
            let slash = self.static_child(b'/').filter(|c| &*c.prefix == b"/")?;
            return slash.empty_catch_all(method, pos, params);
        };

        if let Some(child) = self.static_child(first) {
            let prefix = &*child.prefix;
            if rest.starts_with(prefix) {
                if let Some(route) = child.find(path, pos + prefix.len(), method, params) {
                    return Some(route);
                }
            } else if prefix.len() == rest.len() + 1 && prefix.ends_with(b"/") && prefix.starts_with(rest) {
                if let Some(route) = child.empty_catch_all(method, path.len(), params) {
                    return Some(route);
                }
            }
        }

        if let Some(param) = &self.param {
            let end = rest
                .iter()
                .position(|b| *b == b'/')
                .map_or(path.len(), |i| pos + i);
            if end > pos && params.push(pos, end) {
                if let Some(route) = param.find(path, end, method, params) {
                    return Some(route);
                }
                params.pop();
            }
        }

        let route = self.catch_all.get(method)?;
        params.push(pos, path.len()).then_some(route)
    }

    fn collect<'n>(&'n self, out: &mut Vec<&'n Route<T>>) {
        out.extend(self.routes.values());
        out.extend(self.catch_all.values());
        for child in &self.children {
            child.collect(out);
        }
        if let Some(param) = &self.param {
            param.collect(out);
        }
    }

    fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.catch_all.is_empty() && self.children.is_empty() && self.param.is_none()
    }
}

/// Method-aware radix tree mapping path patterns to values.
pub struct Router<T> {
    root: Node<T>,
    len: usize,
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self {
            root: Node::with_prefix(&[]),
            len: 0,
        }
    }

    /// Register `value` for `method` (case-insensitive) and `pattern`.
    pub fn insert(&mut self, method: &str, pattern: &str, value: T) -> Result<(), RouteError> {
        let method = method.trim().to_ascii_uppercase();
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic() || b == b'-') {
            return Err(RouteError::invalid(pattern, format!("invalid method '{method}'")));
        }
        if pattern.trim().is_empty() {
            return Err(RouteError::invalid(pattern, "pattern must not be empty"));
        }

        let normalized = pattern::normalize(pattern);
        let (pieces, names) = pattern::parse(pattern::key_of(&normalized), pattern)?;
        let route = Route {
            pattern: normalized.as_str().into(),
            method: method.into(),
            param_names: names.into_boxed_slice(),
            value,
        };

        self.root.insert(&pieces, route).map_err(|taken| RouteError::DuplicateRoute {
            method: taken.method.to_string(),
            pattern: taken.pattern.to_string(),
        })?;
        self.len += 1;
        Ok(())
    }

    /// Match `method` and `path`. A missing leading `/` and one trailing `/`
    /// are tolerated; the path must not carry a query string.
    pub fn lookup<'r, 'p>(&'r self, method: &str, path: &'p str) -> Option<RouteMatch<'r, 'p, T>> {
        let start = usize::from(path.starts_with('/'));
        let end = if path.len() > start && path.ends_with('/') {
            path.len() - 1
        } else {
            path.len()
        };

        let mut params = Params::new();
        let route = self.root.find(&path.as_bytes()[..end], start, method, &mut params)?;
        Some(RouteMatch { route, path, params })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0 && self.root.is_empty()
    }

    /// All routes, statics before parameters at each level.
    pub fn routes(&self) -> Vec<&Route<T>> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.len).finish()
    }
}
