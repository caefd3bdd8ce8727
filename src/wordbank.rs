//! Static word bank: `language -> tier -> candidate words`.
//!
//! Built once at startup from the seeds plus the optional TOML word bank and
//! treated as immutable afterwards. Missing languages/tiers read as empty.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::Tier;
use crate::seeds::seed_word_bank;

#[derive(Clone, Debug, Default)]
pub struct WordBank {
    tables: HashMap<String, HashMap<Tier, Vec<String>>>,
}

impl WordBank {
    #[cfg(test)]
    pub fn new(tables: HashMap<String, HashMap<Tier, Vec<String>>>) -> Self {
        Self { tables }
    }

    /// Seeds first, then config lists replace the seed list for the same (language, tier).
    pub fn from_config(cfg: Option<&AppConfig>) -> Self {
        let mut tables = seed_word_bank();
        if let Some(cfg) = cfg {
            for (lang, tiers) in &cfg.word_bank {
                for (key, words) in tiers {
                    let Some(tier) = Tier::from_key(key) else {
                        warn!(target: "word_bank", language = %lang, %key, "Skipping unknown tier key");
                        continue;
                    };
                    let words: Vec<String> = words
                        .iter()
                        .map(|w| w.trim().to_string())
                        .filter(|w| !w.is_empty())
                        .collect();
                    tables.entry(lang.clone()).or_default().insert(tier, words);
                }
            }
        }

        let bank = Self { tables };
        for (lang, tiers) in &bank.tables {
            for tier in Tier::ALL {
                let n = tiers.get(&tier).map_or(0, Vec::len);
                if n == 0 {
                    warn!(target: "word_bank", language = %lang, tier = tier.key(), "Tier has no candidate words");
                } else {
                    info!(target: "word_bank", language = %lang, tier = tier.key(), words = n, "Startup word inventory");
                }
            }
        }
        bank
    }

    pub fn words(&self, language: &str, tier: Tier) -> &[String] {
        self.tables
            .get(language)
            .and_then(|t| t.get(&tier))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[cfg(test)]
    pub fn contains(&self, language: &str, tier: Tier, word: &str) -> bool {
        self.words(language, tier).iter().any(|w| w == word)
    }
}
