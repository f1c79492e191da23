//! `${key}` placeholder expansion.
//!
//! Only bare `${key}` is recognized; there is no default-value syntax, so
//! `${key:-x}` looks up the key `key:-x`. Values are expanded recursively and
//! keys may themselves contain placeholders. An unclosed `${` is literal text.

use crate::env::error::EnvError;

const PREFIX: &str = "${";
const SUFFIX: char = '}';

/// Expands placeholders against a lookup function.
pub struct PlaceholderResolver<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    strict: bool,
}

impl<'a> PlaceholderResolver<'a> {
    /// Unresolvable or circular placeholders fail.
    pub fn strict(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            strict: true,
        }
    }

    /// Unresolvable or circular placeholders are left unchanged.
    pub fn permissive(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            strict: false,
        }
    }

    pub fn resolve(&self, text: &str) -> Result<String, EnvError> {
        self.expand(text, &mut Vec::new())
    }

    /// Resolve the value of `key`, treating `key` itself as already visited.
    pub(crate) fn resolve_value_of(&self, key: &str, value: &str) -> Result<String, EnvError> {
        self.expand(value, &mut vec![key.to_string()])
    }

    fn expand(&self, text: &str, visiting: &mut Vec<String>) -> Result<String, EnvError> {
        if !text.contains(PREFIX) {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(PREFIX) {
            out.push_str(&rest[..start]);
            let body = &rest[start + PREFIX.len()..];
            let Some(end) = closing_brace(body) else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let original = &rest[start..start + PREFIX.len() + end + 1];
            let key = self.expand(&body[..end], visiting)?;

            if visiting.contains(&key) {
                if self.strict {
                    return Err(EnvError::CircularPlaceholder(key));
                }
                out.push_str(original);
            } else {
                match (self.lookup)(&key) {
                    Some(value) => {
                        visiting.push(key);
                        let expanded = self.expand(&value, visiting);
                        visiting.pop();
                        out.push_str(&expanded?);
                    }
                    None if self.strict => {
                        return Err(EnvError::UnresolvablePlaceholder {
                            key,
                            text: text.to_string(),
                        });
                    }
                    None => out.push_str(original),
                }
            }
            rest = &body[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Index of the `}` closing a placeholder body, honoring nested `${`.
fn closing_brace(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            depth += 1;
            i += 2;
            continue;
        }
        if bytes[i] == SUFFIX as u8 {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn expands_nested_values() {
        let lookup = lookup_in(&[("host", "localhost"), ("port", "80"), ("url", "http://${host}:${port}")]);
        let resolver = PlaceholderResolver::strict(&lookup);
        assert_eq!(resolver.resolve("go to ${url}/").unwrap(), "go to http://localhost:80/");
    }

    #[test]
    fn placeholder_in_key_position() {
        let lookup = lookup_in(&[("env", "prod"), ("db.prod", "primary")]);
        let resolver = PlaceholderResolver::strict(&lookup);
        assert_eq!(resolver.resolve("${db.${env}}").unwrap(), "primary");
    }

    #[test]
    fn permissive_leaves_unknown_unchanged() {
        let lookup = lookup_in(&[("a", "1")]);
        let resolver = PlaceholderResolver::permissive(&lookup);
        assert_eq!(resolver.resolve("${a}-${b}").unwrap(), "1-${b}");
    }

    #[test]
    fn strict_names_the_missing_key() {
        let lookup = lookup_in(&[]);
        let err = PlaceholderResolver::strict(&lookup).resolve("x=${missing}").unwrap_err();
        assert_eq!(
            err,
            EnvError::UnresolvablePlaceholder {
                key: "missing".into(),
                text: "x=${missing}".into()
            }
        );
    }

    #[test]
    fn default_value_syntax_is_not_supported() {
        let lookup = lookup_in(&[("key", "v")]);
        let resolver = PlaceholderResolver::permissive(&lookup);
        assert_eq!(resolver.resolve("${key:-fallback}").unwrap(), "${key:-fallback}");
    }

    #[test]
    fn cycles_are_detected() {
        let lookup = lookup_in(&[("a", "${b}"), ("b", "${a}")]);
        let err = PlaceholderResolver::strict(&lookup).resolve("${a}").unwrap_err();
        assert_eq!(err, EnvError::CircularPlaceholder("a".into()));

        let text = PlaceholderResolver::permissive(&lookup).resolve("${a}").unwrap();
        assert_eq!(text, "${a}");
    }

    #[test]
    fn unclosed_placeholder_is_literal() {
        let lookup = lookup_in(&[("a", "1")]);
        let resolver = PlaceholderResolver::strict(&lookup);
        assert_eq!(resolver.resolve("${a} and ${broken").unwrap(), "1 and ${broken");
    }
}
