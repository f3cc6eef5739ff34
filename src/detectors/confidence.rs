//! Named additive confidence factors.
//!
//! Several detectors build their confidence score as a sum of
//! boolean-weighted factors. The weights are part of the documented business
//! contract, so they are carried as named records that end up in evidence
//! rather than being folded into opaque arithmetic.

use serde::{Deserialize, Serialize};

/// One named factor with its contract weight and whether it applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub name: &'static str,
    pub weight: f64,
    pub applied: bool,
}

/// An additive confidence score under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfidenceFactors {
    factors: Vec<ConfidenceFactor>,
    bonus: f64,
}

impl ConfidenceFactors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factor; only applied factors contribute weight.
    pub fn factor(mut self, name: &'static str, weight: f64, applied: bool) -> Self {
        self.factors.push(ConfidenceFactor {
            name,
            weight,
            applied,
        });
        self
    }

    /// Flat bonus on top of the factor sum (e.g. long-aged refunds).
    pub fn bonus(mut self, amount: f64, applied: bool) -> Self {
        if applied {
            self.bonus += amount;
        }
        self
    }

    /// Final score: applied weights + bonus, clamped to [0, 1].
    pub fn score(&self) -> f64 {
        let sum: f64 = self
            .factors
            .iter()
            .filter(|f| f.applied)
            .map(|f| f.weight)
            .sum();
        (sum + self.bonus).clamp(0.0, 1.0)
    }

    /// Names of the factors that fired, for evidence.
    pub fn applied_names(&self) -> Vec<&'static str> {
        self.factors
            .iter()
            .filter(|f| f.applied)
            .map(|f| f.name)
            .collect()
    }

    /// JSON field for `Evidence`: factor names mapped to applied weights.
    pub fn evidence_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for f in &self.factors {
            map.insert(
                f.name.to_string(),
                serde_json::json!(if f.applied { f.weight } else { 0.0 }),
            );
        }
        if self.bonus > 0.0 {
            map.insert("bonus".to_string(), serde_json::json!(self.bonus));
        }
        serde_json::Value::Object(map)
    }
}
