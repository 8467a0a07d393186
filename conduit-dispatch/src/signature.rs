//! Feature signatures.
//!
//! A signature is a `/`-separated route pattern:
//!
//! | Token    | Meaning                                             |
//! |----------|-----------------------------------------------------|
//! | `users`  | constant, matched case-insensitively                |
//! | `{id}`   | captures one segment under `id`                     |
//! | `*`      | captures one segment under its position             |
//! | `?`      | one more trailing segment may be present            |
//! | `//*`    | any number of trailing segments may be present      |
//!
//! Optional markers must come last: once a `?` appears only further `?`
//! tokens (or a final `//*`) may follow. Segments beyond the captured
//! positions surface to handlers as suffixes.

use std::collections::HashMap;
use std::fmt;

use crate::error::{FeatureError, Result};

/// `optional_count` of a signature ending in `//*`.
pub const UNBOUNDED: usize = usize::MAX;

const WILDCARD: &str = "*";

#[derive(Clone, PartialEq, Eq)]
pub struct FeatureSignature {
    raw: String,
    /// Lowercased constants and `*` for captured positions.
    segments: Vec<String>,
    /// Captured positions and their parameter names.
    params: Vec<(usize, String)>,
    optional: usize,
    constants: usize,
}

/// Values captured from a concrete request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathArguments {
    /// Unnamed `*` captures followed by segments past the fixed length.
    pub suffixes: Vec<String>,
    /// Decoded captures keyed by lowercased parameter name.
    pub params: HashMap<String, Vec<String>>,
}

impl PathArguments {
    /// First value captured under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value captured under `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl FeatureSignature {
    /// Parse `signature` below the already-encoded `base` segments.
    pub fn parse(base: &[&str], signature: &str) -> Result<Self> {
        let invalid = |reason: String| FeatureError::InvalidSignature {
            signature: signature.to_string(),
            reason,
        };

        let mut segments: Vec<String> = base
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| decode(s).to_lowercase())
            .collect();
        let mut constants = segments.len();
        let mut params = Vec::new();
        let mut optional = 0usize;

        let trimmed = signature.strip_prefix('/').unwrap_or(signature);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let tokens: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        for (i, token) in tokens.iter().enumerate() {
            if token.is_empty() {
                if i + 2 == tokens.len() && tokens[i + 1] == WILDCARD {
                    optional = UNBOUNDED;
                    break;
                }
                return Err(invalid("an empty segment may only precede a final '*'".into()));
            }

            if *token == "?" {
                optional += 1;
                continue;
            }
            if optional > 0 {
                return Err(invalid(format!("'{token}' cannot follow an optional segment")));
            }

            let index = segments.len();
            if *token == WILDCARD {
                params.push((index, index.to_string()));
                segments.push(WILDCARD.to_string());
            } else if let Some(name) = token.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
                let name = name.trim();
                if name.is_empty() || name.contains(['{', '}', '*', '?']) {
                    return Err(invalid(format!("invalid parameter name in '{token}'")));
                }
                params.push((index, name.to_string()));
                segments.push(WILDCARD.to_string());
            } else if token.contains(['{', '}', '*', '?']) {
                return Err(invalid(format!("malformed segment '{token}'")));
            } else {
                segments.push(decode(token).to_lowercase());
                constants += 1;
            }
        }

        Ok(Self {
            raw: signature.to_string(),
            segments,
            params,
            optional,
            constants,
        })
    }

    /// The signature as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Full route pattern including the base segments.
    pub fn pattern(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            out.push('/');
            match self.params.iter().find(|(idx, _)| *idx == i) {
                Some((idx, name)) if *name != idx.to_string() => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
                _ => out.push_str(segment),
            }
        }
        match self.optional {
            0 => {}
            UNBOUNDED => out.push_str("//*"),
            n => (0..n).for_each(|_| out.push_str("/?")),
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Captured positions and their names.
    pub fn params(&self) -> &[(usize, String)] {
        &self.params
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|(_, n)| n.eq_ignore_ascii_case(name))
    }

    /// Number of optional trailing segments, [`UNBOUNDED`] for `//*`.
    pub fn optional_count(&self) -> usize {
        self.optional
    }

    /// Number of segments every matching path has.
    pub fn fixed_len(&self) -> usize {
        self.segments.len()
    }

    pub fn constant_count(&self) -> usize {
        self.constants
    }

    /// Check whether a request path (encoded segments) matches.
    pub fn matches<S: AsRef<str>>(&self, path: &[S]) -> bool {
        let fixed = self.segments.len();
        if path.len() < fixed || path.len() - fixed > self.optional {
            return false;
        }
        self.segments
            .iter()
            .zip(path.iter())
            .all(|(expected, actual)| expected == WILDCARD || decode(actual.as_ref()).to_lowercase() == *expected)
    }

    /// Pull captured values and suffixes out of a matching path.
    ///
    /// Returns `None` when the path does not match.
    pub fn extract_arguments<S: AsRef<str>>(&self, path: &[S]) -> Option<PathArguments> {
        if !self.matches(path) {
            return None;
        }

        let mut args = PathArguments::default();
        for (index, name) in &self.params {
            let value = decode(path[*index].as_ref());
            if *name == index.to_string() {
                args.suffixes.push(value.clone());
            }
            args.params.entry(name.to_ascii_lowercase()).or_default().push(value);
        }
        args.suffixes
            .extend(path[self.segments.len()..].iter().map(|s| decode(s.as_ref())));
        Some(args)
    }
}

fn decode(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

impl fmt::Debug for FeatureSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSignature")
            .field("pattern", &self.pattern())
            .field("params", &self.params)
            .field("optional", &self.optional)
            .finish()
    }
}

impl fmt::Display for FeatureSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_and_params() {
        let sig = FeatureSignature::parse(&["api"], "Users/{id}/posts").unwrap();
        assert_eq!(sig.segments(), &["api", "users", "*", "posts"]);
        assert_eq!(sig.params(), &[(2, "id".to_string())]);
        assert_eq!(sig.constant_count(), 3);
        assert_eq!(sig.optional_count(), 0);
        assert_eq!(sig.pattern(), "/api/users/{id}/posts");
    }

    #[test]
    fn test_wildcard_and_optional() {
        let sig = FeatureSignature::parse(&["svc", "v1"], "{a}/*/?").unwrap();
        assert_eq!(sig.optional_count(), 1);
        assert_eq!(sig.fixed_len(), 4);
        assert_eq!(sig.params(), &[(2, "a".to_string()), (3, "3".to_string())]);

        let args = sig.extract_arguments(&["svc", "v1", "first", "second"]).unwrap();
        assert_eq!(args.get_all("a"), &["first".to_string()]);
        assert_eq!(args.suffixes, vec!["second".to_string()]);

        let args = sig.extract_arguments(&["svc", "v1", "first", "second", "third"]).unwrap();
        assert_eq!(args.suffixes, vec!["second".to_string(), "third".to_string()]);

        assert!(!sig.matches(&["svc", "v1", "first"]));
        assert!(!sig.matches(&["svc", "v1", "a", "b", "c", "d"]));
    }

    #[test]
    fn test_param_after_optional_fails() {
        let err = FeatureSignature::parse(&[], "foo/?/{a}/bar").unwrap_err();
        assert!(matches!(err, FeatureError::InvalidSignature { .. }));
        assert!(FeatureSignature::parse(&[], "?/*").is_err());
        assert!(FeatureSignature::parse(&[], "?/const").is_err());
    }

    #[test]
    fn test_double_slash_requires_final_wildcard() {
        let sig = FeatureSignature::parse(&[], "files//*").unwrap();
        assert_eq!(sig.optional_count(), UNBOUNDED);
        assert_eq!(sig.fixed_len(), 1);

        let args = sig.extract_arguments(&["files", "a", "b%20c"]).unwrap();
        assert_eq!(args.suffixes, vec!["a".to_string(), "b c".to_string()]);
        assert!(sig.matches(&["files"]));

        assert!(FeatureSignature::parse(&[], "files//x").is_err());
        assert!(FeatureSignature::parse(&[], "a//b/*").is_err());
    }

    #[test]
    fn test_double_slash_after_optional() {
        let sig = FeatureSignature::parse(&[], "x/?//*").unwrap();
        assert_eq!(sig.optional_count(), UNBOUNDED);
    }

    #[test]
    fn test_root_signature() {
        let sig = FeatureSignature::parse(&["svc"], "/").unwrap();
        assert_eq!(sig.fixed_len(), 1);
        assert!(sig.matches(&["SVC"]));
        assert!(!sig.matches(&["svc", "extra"]));
    }

    #[test]
    fn test_case_insensitive_constants() {
        let sig = FeatureSignature::parse(&[], "Status/Health").unwrap();
        assert!(sig.matches(&["status", "HEALTH"]));
        assert!(!sig.matches(&["status", "ready"]));
    }

    #[test]
    fn test_repeated_names_are_multi_valued() {
        let sig = FeatureSignature::parse(&[], "{tag}/{TAG}").unwrap();
        let args = sig.extract_arguments(&["red", "green"]).unwrap();
        assert_eq!(args.get_all("tag"), &["red".to_string(), "green".to_string()]);
        assert_eq!(args.get("Tag"), Some("red"));
        assert!(args.suffixes.is_empty());
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(FeatureSignature::parse(&[], "{}").is_err());
        assert!(FeatureSignature::parse(&[], "a{b").is_err());
        assert!(FeatureSignature::parse(&[], "a/**").is_err());
    }
}
