//! Cache keys for the two cached query shapes.
//!
//! `CacheKey`'s private inner struct means a key can only come from
//! [`CacheKey::all_names`] or [`CacheKey::by_names`], so every key in the
//! cache has a known shape and a canonical encoding.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

const ALL_NAMES: &str = "all_names";
const BY_NAMES: &str = "by_names";

/// Which query a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryShape {
    AllNames,
    ByNames,
}

/// A cache key scoped to a namespace.
///
/// # Encoding
///
/// - all names: `<namespace>:all_names`
/// - name set:  `<namespace>:by_names:<sha256 hex>`
///
/// The name-set digest is taken over the sorted, deduplicated names, each
/// prefixed with its byte length as a little-endian `u64`. The length prefix
/// keeps `["a_b"]` and `["a", "b"]` apart, which a plain join would not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: CacheKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKeyInner {
    namespace: String,
    shape: QueryShape,
    digest: Option<[u8; 32]>,
    name_count: usize,
}

impl CacheKey {
    /// Key for the listing of every preference name.
    pub fn all_names(namespace: &str) -> Self {
        Self {
            inner: CacheKeyInner {
                namespace: namespace.to_string(),
                shape: QueryShape::AllNames,
                digest: None,
                name_count: 0,
            },
        }
    }

    /// Key for a bulk lookup. Order and duplicates in `names` do not matter.
    pub fn by_names<I, S>(namespace: &str, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical: BTreeSet<String> = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        let mut hasher = Sha256::new();
        for name in &canonical {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());

        Self {
            inner: CacheKeyInner {
                namespace: namespace.to_string(),
                shape: QueryShape::ByNames,
                digest: Some(digest),
                name_count: canonical.len(),
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn shape(&self) -> QueryShape {
        self.inner.shape
    }

    /// Number of distinct names behind a `ByNames` key; zero for `AllNames`.
    pub fn name_count(&self) -> usize {
        self.inner.name_count
    }

    /// The string form used by backends.
    pub fn encode(&self) -> String {
        match (self.inner.shape, self.inner.digest) {
            (QueryShape::ByNames, Some(digest)) => {
                format!("{}:{}:{}", self.inner.namespace, BY_NAMES, hex::encode(digest))
            }
            _ => format!("{}:{}", self.inner.namespace, ALL_NAMES),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Distinct name sets map to distinct keys.
        #[test]
        fn prop_distinct_sets_distinct_keys(
            a in proptest::collection::btree_set("[a-c_ ]{0,4}", 0..5),
            b in proptest::collection::btree_set("[a-c_ ]{0,4}", 0..5),
        ) {
            let ka = CacheKey::by_names("preference", &a);
            let kb = CacheKey::by_names("preference", &b);
            prop_assert_eq!(a == b, ka.encode() == kb.encode());
        }
    }
}
