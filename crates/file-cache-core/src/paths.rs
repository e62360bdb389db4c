//! Filename-encoded index: compose and parse the two file families this
//! cache ever writes, and build the glob patterns used to enumerate them.
//!
//! There is no metadata table anywhere else: the expiration timestamp and
//! the id live entirely in the basename, so a directory listing plus a
//! parse pass *is* the index.

use std::path::{Path, PathBuf};

use crate::error::ParseError;
use crate::owner::OwnerToken;

/// Reserved separator. `$` cannot occur in a path on any of our target
/// platforms, so splitting on it is unambiguous as long as the bounded
/// splits below keep an id-containing-`$` intact as the trailing part.
pub const SEP: char = '$';

const PERM_PREFIX: &str = "perm-file-cache";
const TEMP_PREFIX: &str = "temp-file-cache";

/// A permanent file's decoded basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPerm {
    pub expires_at_ms: i64,
    pub id: String,
}

/// A temp file's decoded basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemp {
    pub owner: String,
    pub unique: String,
    pub id: String,
}

/// Ids are accepted even if they contain [`SEP`] because both parsers use a
/// bounded split that keeps the id as the trailing part. Still reject the
/// one thing the encoding cannot survive: a path separator, which would
/// let an id escape the cache directory.
pub fn validate_id(id: &str) -> Result<(), ParseError> {
    if id.is_empty() || id.contains('/') || id.contains('\\') {
        return Err(ParseError::BadFormat { sep: SEP });
    }
    Ok(())
}

pub fn perm_path(dir: &Path, id: &str, expires_at_ms: i64) -> PathBuf {
    dir.join(format!("{PERM_PREFIX}{SEP}{expires_at_ms}{SEP}{id}"))
}

pub fn temp_path(dir: &Path, id: &str, owner: &OwnerToken, unique: u64) -> PathBuf {
    dir.join(format!(
        "{TEMP_PREFIX}{SEP}{owner}{SEP}{unique}{SEP}{id}"
    ))
}

/// Escapes glob metacharacters (`? [ ] { } *`) by wrapping each one in a
/// single-character bracket expression, which the
/// `glob` crate (and POSIX `fnmatch`) treat as matching that literal byte.
/// This is the standard workaround for glob implementations that have no
/// dedicated escape character.
pub fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '?' | '[' | ']' | '{' | '}' | '*' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escapes every normal (non-root, non-`.`/`..`) component of a directory
/// path for safe use as the non-wildcard prefix of a `glob::glob` pattern.
///
/// `dir` here is always a fully-resolved `CacheConfig::dir`/`temp_dir` —
/// root joined with the namespace fragment and the cache name (see
/// `file_cache::supervisor::join_namespace`) — any of which may legally
/// contain glob metacharacters (`namespace::validate_part` only rejects
/// `/`/`\`). Since `glob::glob` parses the *entire* path string as a
/// pattern, not just the basename, an unescaped namespace segment or cache
/// name would corrupt matching for every file in that cache, not just ones
/// whose id happens to contain a metacharacter.
fn escape_glob_path(dir: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in dir.components() {
        match component {
            std::path::Component::Normal(part) => {
                out.push(escape_glob(&part.to_string_lossy()));
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Builds the glob pattern that matches every generation of `id` (or, if
/// `id` is `None`, every permanent file in the cache).
pub fn perm_wildcard(dir: &Path, id: Option<&str>) -> PathBuf {
    let dir = escape_glob_path(dir);
    match id {
        Some(id) => dir.join(format!("{PERM_PREFIX}{SEP}*{SEP}{}", escape_glob(id))),
        None => dir.join(format!("{PERM_PREFIX}{SEP}*")),
    }
}

/// Builds the glob pattern that matches every temp file in the cache.
pub fn temp_wildcard(dir: &Path) -> PathBuf {
    escape_glob_path(dir).join(format!("{TEMP_PREFIX}{SEP}*"))
}

/// Parses a permanent-file basename. The part count is bounded to 3 so an
/// id containing [`SEP`] is preserved whole as the third part.
pub fn parse_perm(basename: &str) -> Result<ParsedPerm, ParseError> {
    let mut parts = basename.splitn(3, SEP);
    let prefix = parts.next().ok_or(ParseError::BadFormat { sep: SEP })?;
    if prefix != PERM_PREFIX {
        return Err(ParseError::BadPrefix);
    }
    let expires_at = parts.next().ok_or(ParseError::BadFormat { sep: SEP })?;
    let id = parts.next().ok_or(ParseError::BadFormat { sep: SEP })?;
    let expires_at_ms: i64 = expires_at.parse().map_err(|_| ParseError::BadTimestamp)?;
    Ok(ParsedPerm {
        expires_at_ms,
        id: id.to_owned(),
    })
}

/// Parses a temp-file basename. The part count is bounded to 4 so an id
/// containing [`SEP`] is preserved whole as the fourth part.
pub fn parse_temp(basename: &str) -> Result<ParsedTemp, ParseError> {
    let mut parts = basename.splitn(4, SEP);
    let prefix = parts.next().ok_or(ParseError::BadFormat { sep: SEP })?;
    if prefix != TEMP_PREFIX {
        return Err(ParseError::BadPrefix);
    }
    let owner = parts.next().ok_or(ParseError::BadFormat { sep: SEP })?;
    let unique = parts.next().ok_or(ParseError::BadFormat { sep: SEP })?;
    let id = parts.next().ok_or(ParseError::BadFormat { sep: SEP })?;
    if owner.is_empty() {
        return Err(ParseError::BadOwner);
    }
    Ok(ParsedTemp {
        owner: owner.to_owned(),
        unique: unique.to_owned(),
        id: id.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perm_round_trip() {
        let path = perm_path(Path::new("/tmp/c"), "my-id", 1234);
        let basename = path.file_name().unwrap().to_str().unwrap();
        let parsed = parse_perm(basename).unwrap();
        assert_eq!(parsed.expires_at_ms, 1234);
        assert_eq!(parsed.id, "my-id");
    }

    #[test]
    fn perm_id_may_contain_sep() {
        let path = perm_path(Path::new("/tmp/c"), "weird$id", 9);
        let basename = path.file_name().unwrap().to_str().unwrap();
        let parsed = parse_perm(basename).unwrap();
        assert_eq!(parsed.id, "weird$id");
    }

    #[test]
    fn perm_rejects_foreign_prefix() {
        assert_eq!(parse_perm("something-else$1$x"), Err(ParseError::BadPrefix));
    }

    #[test]
    fn perm_rejects_bad_timestamp() {
        assert_eq!(
            parse_perm("perm-file-cache$not-a-number$x"),
            Err(ParseError::BadTimestamp)
        );
    }

    #[test]
    fn temp_round_trip() {
        let owner = OwnerToken::for_current_process(7);
        let path = temp_path(Path::new("/tmp/c"), "my-id", &owner, 42);
        let basename = path.file_name().unwrap().to_str().unwrap();
        let parsed = parse_temp(basename).unwrap();
        assert_eq!(parsed.id, "my-id");
        assert_eq!(parsed.unique, "42");
        assert_eq!(parsed.owner, owner.to_string());
    }

    #[test]
    fn wildcard_escapes_glob_metacharacters() {
        let pattern = perm_wildcard(Path::new("/tmp/c"), Some("a*b"));
        let pattern = pattern.to_str().unwrap();
        assert!(pattern.ends_with("a[*]b"));
    }

    #[test]
    fn wildcard_escapes_glob_metacharacters_in_dir_components() {
        // A namespace literal or cache name may legally contain glob
        // metacharacters (only `/` and `\` are rejected by namespace
        // validation), so the whole directory, not just the id, must be
        // escaped before it reaches `glob::glob`.
        let dir = Path::new("/tmp/ns[1]/cache*name");
        let pattern = perm_wildcard(dir, Some("k")).to_str().unwrap().to_owned();
        assert!(pattern.contains("ns[[]1[]]"));
        assert!(pattern.contains("cache[*]name"));

        let pattern = temp_wildcard(dir).to_str().unwrap().to_owned();
        assert!(pattern.contains("ns[[]1[]]"));
        assert!(pattern.contains("cache[*]name"));
    }

    #[test]
    fn validate_id_rejects_slash() {
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("").is_err());
        assert!(validate_id("fine").is_ok());
    }
}
