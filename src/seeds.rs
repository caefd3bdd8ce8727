//! Built-in word lists so the diagnostic test works without external config.

use std::collections::HashMap;

use crate::domain::Tier;

/// language -> tier -> candidate words, easiest tier first.
pub fn seed_word_bank() -> HashMap<String, HashMap<Tier, Vec<String>>> {
  let en: [(Tier, &[&str]); 4] = [
    (Tier::T1, &["cat", "sun", "map", "dog", "bed", "cup"]),
    (Tier::T2, &["ship", "thin", "rain", "leaf", "very", "zoo"]),
    (Tier::T3, &["thirty", "rural", "measure", "vision", "brother", "judge"]),
    (Tier::T4, &["thoroughly", "squirrel", "anthology", "rhythm", "sixths", "worcestershire"]),
  ];
  let zh: [(Tier, &[&str]); 4] = [
    (Tier::T1, &["八", "妈", "大", "你好"]),
    (Tier::T2, &["谢谢", "朋友", "喝水", "老师"]),
    (Tier::T3, &["日出", "知识", "四十", "吃饭"]),
    (Tier::T4, &["十四是四十", "吃葡萄不吐葡萄皮", "出租车", "认真学习"]),
  ];

  let mut bank = HashMap::new();
  for (lang, tiers) in [("en", en), ("zh", zh)] {
    let table: HashMap<Tier, Vec<String>> = tiers
      .into_iter()
      .map(|(tier, words)| (tier, words.iter().map(|w| w.to_string()).collect()))
      .collect();
    bank.insert(lang.to_string(), table);
  }
  bank
}
