//! Typed feature registry
//!
//! Every form feature is identified by a [`FeatureId`] and owns one pure
//! extraction over a [`RollingWindowSnapshot`]. Training and live paths both
//! walk the same registry, so the feature list cannot drift between them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::features::rolling::{Metric, RollingConfig, RollingWindowSnapshot, VenuePolicy};

/// Side-awareness policy per feature family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturePolicyConfig {
    pub rolling: VenuePolicy,
    pub season_to_date: VenuePolicy,
    pub momentum: VenuePolicy,
}

impl FeaturePolicyConfig {
    pub fn policy(&self, family: FeatureFamily) -> VenuePolicy {
        match family {
            FeatureFamily::Rolling => self.rolling,
            FeatureFamily::SeasonToDate => self.season_to_date,
            FeatureFamily::Momentum => self.momentum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFamily {
    Rolling,
    SeasonToDate,
    Momentum,
}

impl FeatureFamily {
    fn prefix(self) -> &'static str {
        match self {
            FeatureFamily::Rolling => "rolling",
            FeatureFamily::SeasonToDate => "season",
            FeatureFamily::Momentum => "momentum",
        }
    }
}

/// Identity of one form feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FeatureId {
    Rolling { metric: Metric, window: usize },
    SeasonToDate { metric: Metric },
    Momentum { metric: Metric },
}

impl FeatureId {
    pub fn family(&self) -> FeatureFamily {
        match self {
            FeatureId::Rolling { .. } => FeatureFamily::Rolling,
            FeatureId::SeasonToDate { .. } => FeatureFamily::SeasonToDate,
            FeatureId::Momentum { .. } => FeatureFamily::Momentum,
        }
    }

    pub fn metric(&self) -> Metric {
        match *self {
            FeatureId::Rolling { metric, .. }
            | FeatureId::SeasonToDate { metric }
            | FeatureId::Momentum { metric } => metric,
        }
    }

    /// Column name of the home-minus-away differential
    pub fn name(&self, policy: VenuePolicy) -> String {
        let prefix = match policy {
            VenuePolicy::AnyVenue => self.family().prefix().to_string(),
            VenuePolicy::MatchingVenue => format!("{}_venue", self.family().prefix()),
        };
        match self {
            FeatureId::Rolling { metric, window } => {
                format!("{}_{}_{}_diff", prefix, metric.name(), window)
            }
            FeatureId::SeasonToDate { metric } | FeatureId::Momentum { metric } => {
                format!("{}_{}_diff", prefix, metric.name())
            }
        }
    }
}

type Extractor = Arc<dyn Fn(&RollingWindowSnapshot) -> f64 + Send + Sync>;

/// A feature bound to its policy, column name and extraction
#[derive(Clone)]
pub struct RegisteredFeature {
    pub id: FeatureId,
    pub policy: VenuePolicy,
    pub name: String,
    extract: Extractor,
}

impl RegisteredFeature {
    /// One side's value from a snapshot taken under `self.policy`
    pub fn extract(&self, snapshot: &RollingWindowSnapshot) -> f64 {
        (self.extract)(snapshot)
    }
}

impl fmt::Debug for RegisteredFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFeature")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("name", &self.name)
            .finish()
    }
}

/// Ordered set of form features for one configuration
#[derive(Debug, Clone)]
pub struct FeatureRegistry {
    features: Vec<RegisteredFeature>,
}

impl FeatureRegistry {
    /// Rolling windows, then season-to-date, then momentum, each in metric
    /// order
    pub fn from_config(rolling: &RollingConfig, policies: &FeaturePolicyConfig) -> Self {
        let mut registry = FeatureRegistry {
            features: Vec::new(),
        };
        for &metric in &rolling.metrics {
            for &window in &rolling.windows {
                registry.register(FeatureId::Rolling { metric, window }, policies.rolling);
            }
        }
        for &metric in &rolling.metrics {
            registry.register(FeatureId::SeasonToDate { metric }, policies.season_to_date);
        }
        for &metric in &rolling.metrics {
            registry.register(FeatureId::Momentum { metric }, policies.momentum);
        }
        registry
    }

    fn register(&mut self, id: FeatureId, policy: VenuePolicy) {
        let extract: Extractor = match id {
            FeatureId::Rolling { metric, window } => {
                Arc::new(move |s: &RollingWindowSnapshot| s.window(metric, window))
            }
            FeatureId::SeasonToDate { metric } => {
                Arc::new(move |s: &RollingWindowSnapshot| s.season_to_date(metric))
            }
            FeatureId::Momentum { metric } => {
                Arc::new(move |s: &RollingWindowSnapshot| s.momentum(metric))
            }
        };
        self.features.push(RegisteredFeature {
            id,
            policy,
            name: id.name(policy),
            extract,
        });
    }

    pub fn features(&self) -> &[RegisteredFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredFeature> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Distinct policies in use, so each side needs one snapshot per policy
    pub fn policies(&self) -> Vec<VenuePolicy> {
        let mut policies: Vec<VenuePolicy> = Vec::new();
        for feature in &self.features {
            if !policies.contains(&feature.policy) {
                policies.push(feature.policy);
            }
        }
        policies
    }
}

/// Stable, shared column order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        FeatureSchema {
            names: Arc::new(names),
            index: Arc::new(index),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}
