//! Captured path parameters.
//!
//! # Responsibilities
//! - Record where each captured value sits in the request path
//! - Pair spans with the matched route's parameter names on access
//!
//! # Design Decisions
//! - Fixed-size `Copy` array of byte spans: capturing never allocates
//! - Values are borrowed from the request path, names from the route

/// Upper bound on captured values per pattern, catch-all included.
pub const MAX_PARAMS: usize = 32;

/// Name under which a catch-all remainder is reported.
pub const CATCH_ALL: &str = "**";

/// Byte range of one captured value inside the request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamSpan {
    pub start: usize,
    pub end: usize,
}

impl ParamSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Params {
    spans: [ParamSpan; MAX_PARAMS],
    len: usize,
}

impl Params {
    pub const fn new() -> Self {
        Self {
            spans: [ParamSpan { start: 0, end: 0 }; MAX_PARAMS],
            len: 0,
        }
    }

    /// `false` once full. Patterns with more parameters are rejected at
    /// insert time, so a full buffer means the lookup took a wrong branch.
    pub(crate) fn push(&mut self, start: usize, end: usize) -> bool {
        if self.len == MAX_PARAMS {
            return false;
        }
        self.spans[self.len] = ParamSpan { start, end };
        self.len += 1;
        true
    }

    pub(crate) fn pop(&mut self) {
        self.len = self.len.saturating_sub(1);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn spans(&self) -> &[ParamSpan] {
        &self.spans[..self.len]
    }

    pub fn get(&self, index: usize) -> Option<ParamSpan> {
        self.spans().get(index).copied()
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}
