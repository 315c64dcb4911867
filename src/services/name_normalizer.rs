use std::collections::{HashMap, HashSet};

use strsim::jaro_winkler;

/// Maps raw, inconsistently-spelled team names onto a fixed canonical set
/// (C1). This is the only layer permitted to alter team strings —
/// downstream code assumes canonical names.
pub struct NameNormalizer {
    mapping: HashMap<String, String>,
    canonical_names: Vec<String>,
    fuzzy_threshold: f64,
}

impl NameNormalizer {
    /// `fuzzy_threshold` is on the spec's 0-100 scale (default 85).
    pub fn new(mapping: HashMap<String, String>, fuzzy_threshold: f64) -> Self {
        let canonical_names: Vec<String> = mapping
            .values()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        Self {
            mapping,
            canonical_names,
            fuzzy_threshold,
        }
    }

    /// Loads the `raw -> canonical` dictionary from a JSON file. A missing
    /// file is not an error — it just means every raw name falls through to
    /// the fuzzy/unchanged paths.
    pub fn load(path: &str, fuzzy_threshold: f64) -> Self {
        let mapping = std::fs::read_to_string(path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();
        Self::new(mapping, fuzzy_threshold)
    }

    /// §4.1: empty -> "Unknown"; exact dictionary hit; else best fuzzy match
    /// against the canonical set at score >= threshold; else unchanged.
    pub fn standardize(&self, raw: &str) -> String {
        if raw.trim().is_empty() {
            return "Unknown".to_string();
        }
        if let Some(canonical) = self.mapping.get(raw) {
            return canonical.clone();
        }

        let mut best: Option<(&str, f64)> = None;
        for candidate in &self.canonical_names {
            let score = jaro_winkler(raw, candidate) * 100.0;
            if best.map(|(_, b)| score > b).unwrap_or(true) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((candidate, score)) if score >= self.fuzzy_threshold => candidate.to_string(),
            _ => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> NameNormalizer {
        let mut mapping = HashMap::new();
        mapping.insert("Man Utd".to_string(), "Manchester United".to_string());
        mapping.insert("Spurs".to_string(), "Tottenham Hotspur".to_string());
        NameNormalizer::new(mapping, 85.0)
    }

    #[test]
    fn empty_name_is_unknown() {
        assert_eq!(mapper().standardize(""), "Unknown");
        assert_eq!(mapper().standardize("   "), "Unknown");
    }

    #[test]
    fn exact_dictionary_hit() {
        assert_eq!(mapper().standardize("Man Utd"), "Manchester United");
    }

    #[test]
    fn fuzzy_fallback_above_threshold() {
        // Close misspelling of a canonical value, not a dictionary key.
        assert_eq!(
            mapper().standardize("Manchester Unitedd"),
            "Manchester United"
        );
    }

    #[test]
    fn unrelated_name_passes_through_unchanged() {
        assert_eq!(mapper().standardize("FC Barcelona"), "FC Barcelona");
    }
}
