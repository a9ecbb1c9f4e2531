//! Folding raw emotion labels into the reported label set

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scores for the three reported labels (percent)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AffectScores {
    pub happy: f32,
    pub sad: f32,
    pub neutral: f32,
}

impl AffectScores {
    /// Fold a raw distribution: `neutral` averages neutral and surprise,
    /// other labels are dropped. Label lookup is case-insensitive and
    /// accepts the FER+ spellings (`happiness`, `sadness`).
    pub fn fold(raw: &HashMap<String, f32>) -> Self {
        let get = |names: &[&str]| -> f32 {
            raw.iter()
                .filter(|(label, _)| names.iter().any(|n| label.eq_ignore_ascii_case(n)))
                .map(|(_, score)| *score)
                .sum()
        };

        Self {
            happy: get(&["happy", "happiness"]),
            sad: get(&["sad", "sadness"]),
            neutral: (get(&["neutral"]) + get(&["surprise"])) / 2.0,
        }
    }

    /// Highest scoring label; ties resolve happy, sad, neutral
    pub fn dominant(&self) -> &'static str {
        let mut best = ("happy", self.happy);
        for candidate in [("sad", self.sad), ("neutral", self.neutral)] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }

    pub fn score(&self, label: &str) -> Option<f32> {
        match label {
            "happy" => Some(self.happy),
            "sad" => Some(self.sad),
            "neutral" => Some(self.neutral),
            _ => None,
        }
    }
}
