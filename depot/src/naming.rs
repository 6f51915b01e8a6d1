//! Collision-free name resolution.
//!
//! Policies operate on file basenames only. Existence is checked through a
//! callback supplied by the backend, so the same policy serves local
//! directories and remote SFTP trees alike.

use std::fmt;

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Attempts before a policy gives up with [`StoreError::Policy`].
pub const MAX_ATTEMPTS: usize = 100;

/// Length of generated name tokens.
const TOKEN_LEN: usize = 10;

/// Strategy for deriving a collision-free name from a desired one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Replace the name with a random alphanumeric token.
    Random,
    /// Keep the name; disambiguate collisions with a timestamp suffix.
    Preserve,
    /// Random token, but the original extension is kept.
    PreserveExt,
}

impl NamingPolicy {
    /// Parse a policy from its configuration tag.
    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "random" => Some(NamingPolicy::Random),
            "preserve" => Some(NamingPolicy::Preserve),
            "preserve_ext" => Some(NamingPolicy::PreserveExt),
            _ => None,
        }
    }

    /// The configuration tag for this policy.
    pub fn tag(&self) -> &'static str {
        match self {
            NamingPolicy::Random => "random",
            NamingPolicy::Preserve => "preserve",
            NamingPolicy::PreserveExt => "preserve_ext",
        }
    }

    /// Resolve `desired` to a name for which `exists` reports false.
    ///
    /// `desired` must be a basename; the returned name is one too.
    /// Resolution is bounded at [`MAX_ATTEMPTS`] candidates.
    ///
    /// A concurrent writer may still claim the name between this check and
    /// the write; that race is the caller's to tolerate.
    pub fn resolve<F>(&self, desired: &str, mut exists: F) -> Result<String>
    where
        F: FnMut(&str) -> bool,
    {
        for attempt in 0..MAX_ATTEMPTS {
            let candidate = self.candidate(desired, attempt);
            if !exists(&candidate) {
                return Ok(candidate);
            }
        }
        Err(StoreError::Policy {
            name: desired.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }

    fn candidate(&self, desired: &str, attempt: usize) -> String {
        match self {
            NamingPolicy::Random => token(),
            NamingPolicy::Preserve => {
                if attempt == 0 {
                    desired.to_string()
                } else {
                    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
                    format!("{desired}.{stamp}")
                }
            }
            NamingPolicy::PreserveExt => format!("{}{}", token(), extension(desired)),
        }
    }
}

impl fmt::Display for NamingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LEN)
        .map(|_| rng.sample(Alphanumeric) as char)
        .collect()
}

/// The extension of `name` including the leading dot, or `""`.
///
/// A leading dot alone ("dotfiles") does not count as an extension.
fn extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx..],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(NamingPolicy::from_tag("random"), Some(NamingPolicy::Random));
        assert_eq!(
            NamingPolicy::from_tag("preserve"),
            Some(NamingPolicy::Preserve)
        );
        assert_eq!(
            NamingPolicy::from_tag("preserve_ext"),
            Some(NamingPolicy::PreserveExt)
        );
        assert_eq!(NamingPolicy::from_tag("keep"), None);
    }

    #[test]
    fn test_tag_roundtrip() {
        for policy in [
            NamingPolicy::Random,
            NamingPolicy::Preserve,
            NamingPolicy::PreserveExt,
        ] {
            assert_eq!(NamingPolicy::from_tag(policy.tag()), Some(policy));
            assert_eq!(policy.to_string(), policy.tag());
        }
    }

    #[test]
    fn test_random_token_shape() {
        let name = NamingPolicy::Random.resolve("note.txt", |_| false).unwrap();
        assert_eq!(name.len(), TOKEN_LEN);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_retries_on_collision() {
        let mut probes = 0;
        let name = NamingPolicy::Random
            .resolve("note.txt", |_| {
                probes += 1;
                probes <= 3
            })
            .unwrap();
        assert_eq!(probes, 4);
        assert_eq!(name.len(), TOKEN_LEN);
    }

    #[test]
    fn test_preserve_keeps_free_name() {
        let name = NamingPolicy::Preserve
            .resolve("note.txt", |_| false)
            .unwrap();
        assert_eq!(name, "note.txt");
    }

    #[test]
    fn test_preserve_appends_timestamp_on_collision() {
        let name = NamingPolicy::Preserve
            .resolve("note.txt", |candidate| candidate == "note.txt")
            .unwrap();
        let suffix = name.strip_prefix("note.txt.").unwrap();
        // YYYYmmdd-HHMMSS
        assert_eq!(suffix.len(), 15);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_preserve_ext_keeps_extension() {
        let name = NamingPolicy::PreserveExt
            .resolve("photo.jpeg", |_| false)
            .unwrap();
        assert!(name.ends_with(".jpeg"));
        let stem = name.strip_suffix(".jpeg").unwrap();
        assert_eq!(stem.len(), TOKEN_LEN);
        assert!(stem.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unlimited_collisions_hit_the_bound() {
        for policy in [
            NamingPolicy::Random,
            NamingPolicy::Preserve,
            NamingPolicy::PreserveExt,
        ] {
            let mut probes = 0;
            let err = policy
                .resolve("note.txt", |_| {
                    probes += 1;
                    true
                })
                .unwrap_err();
            assert_eq!(probes, MAX_ATTEMPTS);
            match err {
                StoreError::Policy { name, attempts } => {
                    assert_eq!(name, "note.txt");
                    assert_eq!(attempts, MAX_ATTEMPTS);
                }
                other => panic!("expected Policy error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("note.txt"), ".txt");
        assert_eq!(extension("archive.tar.gz"), ".gz");
        assert_eq!(extension("README"), "");
        assert_eq!(extension(".bashrc"), "");
    }
}
