//! Expands a namespace spec into a `/`-joined path fragment.
//!
//! A spec is a literal, the `HOST` sentinel, a zero-argument callback, an
//! MFA-shaped callback-with-arguments, or an ordered sequence of any of
//! those. A `(module, function, arguments)` triple has no equivalent in a
//! statically-linked binary — there is no runtime function registry to
//! dispatch through — so it's modeled here as a named closure plus its
//! captured arguments; the "module"/"function" strings are carried along
//! purely for log/debug readability (see DESIGN.md).

use std::sync::Arc;

use crate::error::CacheError;

type NamespaceFn = Arc<dyn Fn() -> Result<String, CacheError> + Send + Sync>;
type NamespaceCall = Arc<dyn Fn(&[String]) -> Result<String, CacheError> + Send + Sync>;

#[derive(Clone)]
pub enum NamespaceSpec {
    /// Empty/null spec: yields the empty fragment.
    Empty,
    /// A literal path segment.
    Literal(String),
    /// Resolves to the local hostname.
    Host,
    /// A zero-argument function reference, resolved by invoking it.
    Fn(NamespaceFn),
    /// The `(module, function, arguments)` triple: a named callback
    /// invoked with the given arguments. `module`/`function` are kept only
    /// for diagnostics.
    Call {
        module: String,
        function: String,
        args: Vec<String>,
        invoke: NamespaceCall,
    },
    /// An ordered sequence of specs, each contributing one or more path
    /// segments, joined in order.
    Seq(Vec<NamespaceSpec>),
}

impl std::fmt::Debug for NamespaceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamespaceSpec::Empty => write!(f, "Empty"),
            NamespaceSpec::Literal(s) => write!(f, "Literal({s:?})"),
            NamespaceSpec::Host => write!(f, "Host"),
            NamespaceSpec::Fn(_) => write!(f, "Fn(..)"),
            NamespaceSpec::Call {
                module, function, ..
            } => write!(f, "Call({module}::{function}, ..)"),
            NamespaceSpec::Seq(parts) => f.debug_list().entries(parts.iter()).finish(),
        }
    }
}

impl Default for NamespaceSpec {
    fn default() -> Self {
        NamespaceSpec::Empty
    }
}

impl NamespaceSpec {
    pub fn literal(s: impl Into<String>) -> Self {
        NamespaceSpec::Literal(s.into())
    }

    pub fn seq(parts: impl IntoIterator<Item = NamespaceSpec>) -> Self {
        NamespaceSpec::Seq(parts.into_iter().collect())
    }
}

fn validate_part(part: &str) -> Result<(), CacheError> {
    if part.contains('/') || part.contains('\\') {
        return Err(CacheError::BadNamespacePart(part.to_owned()));
    }
    Ok(())
}

/// Resolves a spec into a `/`-joined fragment. Pure given its inputs
/// modulo the hostname lookup and user-supplied callables.
pub fn resolve(spec: &NamespaceSpec) -> Result<String, CacheError> {
    let mut segments = Vec::new();
    resolve_into(spec, &mut segments)?;
    Ok(segments.join("/"))
}

fn resolve_into(spec: &NamespaceSpec, out: &mut Vec<String>) -> Result<(), CacheError> {
    match spec {
        NamespaceSpec::Empty => {}
        NamespaceSpec::Literal(s) => {
            validate_part(s)?;
            if !s.is_empty() {
                out.push(s.clone());
            }
        }
        NamespaceSpec::Host => {
            let host = gethostname::gethostname()
                .into_string()
                .unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
            validate_part(&host)?;
            out.push(host);
        }
        NamespaceSpec::Fn(f) => {
            let part = f()?;
            validate_part(&part)?;
            if !part.is_empty() {
                out.push(part);
            }
        }
        NamespaceSpec::Call { invoke, args, .. } => {
            let part = invoke(args)?;
            validate_part(&part)?;
            if !part.is_empty() {
                out.push(part);
            }
        }
        NamespaceSpec::Seq(parts) => {
            for part in parts {
                resolve_into(part, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_yields_empty_fragment() {
        assert_eq!(resolve(&NamespaceSpec::Empty).unwrap(), "");
    }

    #[test]
    fn literal_sequence_joins_with_slash() {
        let spec = NamespaceSpec::seq([
            NamespaceSpec::literal("a"),
            NamespaceSpec::literal("b"),
            NamespaceSpec::literal("c"),
        ]);
        assert_eq!(resolve(&spec).unwrap(), "a/b/c");
    }

    #[test]
    fn fn_and_call_variants_are_invoked() {
        let spec = NamespaceSpec::seq([
            NamespaceSpec::Fn(Arc::new(|| Ok("b".to_owned()))),
            NamespaceSpec::Call {
                module: "M".into(),
                function: "F".into(),
                args: vec!["c".into()],
                invoke: Arc::new(|args| Ok(args[0].clone())),
            },
        ]);
        assert_eq!(resolve(&spec).unwrap(), "b/c");
    }

    #[test]
    fn invalid_part_is_rejected() {
        let spec = NamespaceSpec::literal("a/b");
        assert!(matches!(resolve(&spec), Err(CacheError::BadNamespacePart(_))));
    }
}
