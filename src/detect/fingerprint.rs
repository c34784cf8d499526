use std::collections::BTreeMap;

use sha2::{Digest, Sha224};

use crate::models::ArticleFields;

/// Content hash of an article's tracked fields.
pub fn fingerprint(fields: &ArticleFields) -> String {
    fingerprint_pairs(fields.to_map())
}

/// Hash a field mapping independently of the order its pairs arrive in.
///
/// Pairs are sorted by key and every key and value is length-prefixed, so
/// no two distinct mappings share a canonical byte stream.
pub fn fingerprint_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let sorted: BTreeMap<&str, &str> = pairs.into_iter().collect();

    let mut hasher = Sha224::new();
    for (key, value) in sorted {
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
