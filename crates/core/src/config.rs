use crate::learned::LEARNED_MAX_CONFIDENCE;
use crate::models::to_percent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub rules: RuleConfig,
    /// project id -> template id
    #[serde(default)]
    pub projects: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default = "default_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            classifier_timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

fn default_classifier_timeout_ms() -> u64 {
    10_000
}

/// Routing thresholds.
///
/// A single confirmation yields a learned confidence of 0.85 and repeated
/// confirmations climb to at most 0.97. A `short_circuit` above 0.85 thus
/// needs several confirmations before a learned placement skips the other
/// signals, and one above 0.97 could never be reached, so it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// A learned pattern at or above this is accepted without asking the
    /// rules or the classifier.
    pub short_circuit: f32,
    /// The classifier is skipped once a learned or rule candidate reaches this.
    pub accept: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            short_circuit: 0.85,
            accept: 0.75,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [("short_circuit", self.short_circuit), ("accept", self.accept)] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("routing.thresholds.{name} = {value} is outside [0, 1]");
            }
        }
        if to_percent(self.short_circuit) > to_percent(LEARNED_MAX_CONFIDENCE) {
            anyhow::bail!(
                "routing.thresholds.short_circuit = {} is above the highest learned confidence {}",
                self.short_circuit,
                LEARNED_MAX_CONFIDENCE
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub provider: String,
    pub model: String,
    pub preview_bytes: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: "noop".to_string(),
            model: "gpt-4o-mini".to_string(),
            preview_bytes: 4096,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    pub path: Option<String>,
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(config::Environment::with_prefix("DOCROUTER").separator("__"));
    let cfg: AppConfig = settings.build()?.try_deserialize()?;
    cfg.routing.thresholds.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(
            &path,
            r#"
                [database]
                path = "data/router.db"

                [routing.thresholds]
                short_circuit = 0.9
                accept = 0.7

                [projects]
                villa-rossi = "COMPLETO"
            "#,
        )
        .unwrap();
        let cfg = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(cfg.database.path, "data/router.db");
        assert!((cfg.routing.thresholds.short_circuit - 0.9).abs() < 1e-6);
        assert_eq!(cfg.routing.classifier_timeout_ms, 10_000);
        assert_eq!(cfg.classifier.provider, "noop");
        assert_eq!(cfg.projects.get("villa-rossi").map(String::as_str), Some("COMPLETO"));
        assert!(cfg.rules.path.is_none());
    }

    #[test]
    fn rejects_thresholds_out_of_range() {
        let t = Thresholds {
            short_circuit: 1.2,
            accept: 0.5,
        };
        assert!(t.validate().is_err());
        assert!(Thresholds::default().validate().is_ok());

        let unreachable = Thresholds {
            short_circuit: 0.99,
            accept: 0.75,
        };
        assert!(unreachable.validate().is_err());
        let needs_repeats = Thresholds {
            short_circuit: 0.97,
            accept: 0.75,
        };
        assert!(needs_repeats.validate().is_ok());
    }
}
