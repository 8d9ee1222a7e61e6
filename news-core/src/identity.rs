use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::article::{ArticleId, ArticleKey};

impl ArticleId {
    /// Hashes the key fields in a fixed order (team, news id, published) and
    /// renders the first 128 bits as `8-4-4-4-12` hex groups.
    ///
    /// Every field is length-prefixed so `("ab", "c")` and `("a", "bc")`
    /// never hash the same.
    pub fn derive(key: &ArticleKey) -> Self {
        let published = key
            .published
            .to_rfc3339_opts(SecondsFormat::Nanos, true);

        let mut hasher = Sha256::new();
        for field in [key.team_id.as_str(), key.news_id.as_str(), published.as_str()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());

        Self::from(format!(
            "{}-{}-{}-{}-{}",
            &digest[..8],
            &digest[8..12],
            &digest[12..16],
            &digest[16..20],
            &digest[20..32],
        ))
    }
}
