//! Route pattern parsing.
//!
//! Grammar, per `/`-separated segment:
//! - `name` static text
//! - `{name}` one captured segment
//! - `**` the rest of the path, possibly empty; last segment only
//!
//! Patterns are normalized to a leading `/` and no trailing `/` (except the
//! root). The tree stores the part after the leading `/`, its *key*.

use crate::routing::error::RouteError;
use crate::routing::params::{CATCH_ALL, MAX_PARAMS};

/// One insertion step of a parsed pattern key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece<'a> {
    /// Literal bytes, separators included.
    Static(&'a str),
    Param,
    CatchAll,
}

/// Leading `/` added, one trailing `/` removed.
pub fn normalize(pattern: &str) -> String {
    let trimmed = pattern.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(pattern);
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// The tree key of a normalized pattern.
pub(crate) fn key_of(normalized: &str) -> &str {
    normalized.strip_prefix('/').unwrap_or(normalized)
}

/// Split a key into pieces and collect parameter names in order. The
/// catch-all is named `**`.
pub(crate) fn parse<'a>(key: &'a str, pattern: &str) -> Result<(Vec<Piece<'a>>, Vec<Box<str>>), RouteError> {
    let mut pieces = Vec::new();
    let mut names: Vec<Box<str>> = Vec::new();
    if key.is_empty() {
        return Ok((pieces, names));
    }

    let segment_count = key.split('/').count();
    let mut run_start = 0;
    let mut offset = 0;
    for (index, segment) in key.split('/').enumerate() {
        let start = offset;
        offset += segment.len() + 1;

        if segment.is_empty() {
            return Err(RouteError::invalid(pattern, "empty path segment"));
        }

        let piece = if segment == CATCH_ALL {
            if index + 1 != segment_count {
                return Err(RouteError::invalid(pattern, "'**' must be the last segment"));
            }
            names.push(CATCH_ALL.into());
            Piece::CatchAll
        } else if segment.starts_with('{') {
            let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                return Err(RouteError::UnclosedParam {
                    pattern: pattern.to_string(),
                });
            };
            if inner.trim().is_empty() {
                return Err(RouteError::EmptyParamName {
                    pattern: pattern.to_string(),
                });
            }
            if inner.contains(['{', '}']) {
                return Err(RouteError::invalid(pattern, "nested braces in parameter"));
            }
            if names.iter().any(|n| &**n == inner) {
                return Err(RouteError::invalid(
                    pattern,
                    format!("duplicate parameter '{inner}'"),
                ));
            }
            names.push(inner.into());
            Piece::Param
        } else if segment.contains(['{', '}']) || segment.contains("**") {
            return Err(RouteError::invalid(
                pattern,
                format!("'{segment}' mixes literal text with a parameter"),
            ));
        } else {
            continue;
        };

        if start > run_start {
            pieces.push(Piece::Static(&key[run_start..start]));
        }
        pieces.push(piece);
        run_start = start + segment.len();
    }
    if run_start < key.len() {
        pieces.push(Piece::Static(&key[run_start..]));
    }

    if names.len() > MAX_PARAMS {
        return Err(RouteError::TooManyParams {
            pattern: pattern.to_string(),
            count: names.len(),
            max: MAX_PARAMS,
        });
    }
    Ok((pieces, names))
}
