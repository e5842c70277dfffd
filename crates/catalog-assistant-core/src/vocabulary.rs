//! Matching vocabulary: stop words, bilingual term dictionary, and the
//! application-phrase map.
//!
//! The vocabulary is configuration data, not code. The application crate
//! parses it from a versioned TOML document at startup and hands it to
//! [`QueryNormalizer`](crate::normalize::QueryNormalizer) and
//! [`MatchEngine`](crate::search::MatchEngine).
//!
//! ```toml
//! version = 1
//! stop_words = ["fiyat", "price", "need"]
//!
//! [terms]
//! "gümüş" = "silver"
//!
//! [applications]
//! "iletken mürekkep" = ["silver", "copper", "graphene"]
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

/// The only vocabulary document version this build understands.
pub const VOCABULARY_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vocabulary {
    pub version: u32,
    #[serde(default)]
    pub stop_words: Vec<String>,
    /// Source-language term → target-language equivalent.
    #[serde(default)]
    pub terms: BTreeMap<String, String>,
    /// Application phrase → material/keyword fragments.
    #[serde(default)]
    pub applications: BTreeMap<String, Vec<String>>,
}

impl Vocabulary {
    /// Checks the version and returns a copy with every entry lower-cased
    /// and trimmed, dropping empty entries.
    pub fn validated(self) -> anyhow::Result<Self> {
        if self.version != VOCABULARY_VERSION {
            anyhow::bail!(
                "unsupported vocabulary version {} (expected {})",
                self.version,
                VOCABULARY_VERSION
            );
        }

        let clean = |s: &str| s.trim().to_lowercase();

        let stop_words = self
            .stop_words
            .iter()
            .map(|w| clean(w))
            .filter(|w| !w.is_empty())
            .collect();

        let terms = self
            .terms
            .iter()
            .map(|(s, t)| (clean(s), clean(t)))
            .filter(|(s, t)| !s.is_empty() && !t.is_empty())
            .collect();

        let applications = self
            .applications
            .iter()
            .map(|(phrase, fragments)| {
                (
                    clean(phrase),
                    fragments
                        .iter()
                        .map(|f| clean(f))
                        .filter(|f| !f.is_empty())
                        .collect::<Vec<_>>(),
                )
            })
            .filter(|(phrase, fragments)| !phrase.is_empty() && !fragments.is_empty())
            .collect();

        Ok(Self {
            version: self.version,
            stop_words,
            terms,
            applications,
        })
    }
}
