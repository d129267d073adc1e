use crate::error::Result;
use crate::gate::Criterion;
use crate::paths;
use crate::task::DOMAIN_KEYWORDS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_structural_weight")]
    pub structural_weight: f64,
    #[serde(default = "default_compliance_weight")]
    pub compliance_weight: f64,
    #[serde(default = "default_traceability_weight")]
    pub traceability_weight: f64,
    /// Below this word count the structural validator reports an error.
    #[serde(default = "default_min_words")]
    pub min_words: usize,
}

fn default_structural_weight() -> f64 {
    30.0
}

fn default_compliance_weight() -> f64 {
    30.0
}

fn default_traceability_weight() -> f64 {
    40.0
}

fn default_min_words() -> usize {
    50
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            structural_weight: default_structural_weight(),
            compliance_weight: default_compliance_weight(),
            traceability_weight: default_traceability_weight(),
            min_words: default_min_words(),
        }
    }
}

impl PipelineConfig {
    pub fn total_weight(&self) -> f64 {
        self.structural_weight + self.compliance_weight + self.traceability_weight
    }
}

// ---------------------------------------------------------------------------
// ComplianceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Any of these (lowercase substring) marks a document as domain-sensitive.
    #[serde(default = "default_domain_keywords")]
    pub domain_keywords: Vec<String>,
    /// Terms a domain-sensitive document must contain.
    #[serde(default = "default_required_terms")]
    pub required_terms: Vec<Criterion>,
}

fn default_domain_keywords() -> Vec<String> {
    DOMAIN_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_required_terms() -> Vec<Criterion> {
    let term = |id: &str, any_of: &[&str]| Criterion {
        id: id.to_string(),
        any_of: any_of.iter().map(|s| s.to_string()).collect(),
    };
    vec![
        term("disclaimer", &["disclaimer"]),
        term(
            "professional_consultation",
            &["consult a", "healthcare professional", "medical professional"],
        ),
        term("emergency_guidance", &["emergency services", "call 911", "seek immediate"]),
    ]
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            domain_keywords: default_domain_keywords(),
            required_terms: default_required_terms(),
        }
    }
}

// ---------------------------------------------------------------------------
// HooksConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Shell command run after every phase, with the result JSON on stdin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_phase: Option<String>,
    #[serde(default = "default_hook_timeout")]
    pub timeout_seconds: u64,
}

fn default_hook_timeout() -> u64 {
    30
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            post_phase: None,
            timeout_seconds: default_hook_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_gate_timeout")]
    pub gate_timeout_seconds: u64,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

fn default_version() -> u32 {
    1
}

fn default_gate_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            gate_timeout_seconds: default_gate_timeout(),
            pipeline: PipelineConfig::default(),
            compliance: ComplianceConfig::default(),
            hooks: HooksConfig::default(),
        }
    }
}

impl Config {
    /// `.sparc/config.yaml`, or defaults when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn gate_timeout(&self) -> Duration {
        Duration::from_secs(self.gate_timeout_seconds)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hooks.timeout_seconds)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.gate_timeout_seconds == 0 {
            warn(
                WarnLevel::Error,
                "gate_timeout_seconds is 0; every gate would time out".to_string(),
            );
        }

        let p = &self.pipeline;
        for (name, weight) in [
            ("structural_weight", p.structural_weight),
            ("compliance_weight", p.compliance_weight),
            ("traceability_weight", p.traceability_weight),
        ] {
            if weight < 0.0 {
                warn(
                    WarnLevel::Error,
                    format!("pipeline.{name} is negative ({weight})"),
                );
            }
        }
        let total = p.total_weight();
        if (total - 100.0).abs() > 1e-6 {
            warn(
                WarnLevel::Warning,
                format!("pipeline weights sum to {total}, expected 100"),
            );
        }

        if self.compliance.domain_keywords.is_empty() {
            warn(
                WarnLevel::Warning,
                "compliance.domain_keywords is empty; no document is treated as domain-sensitive"
                    .to_string(),
            );
        }
        for term in &self.compliance.required_terms {
            if term.any_of.iter().all(|p| p.trim().is_empty()) {
                warn(
                    WarnLevel::Warning,
                    format!("required term '{}' has no phrases", term.id),
                );
            }
        }

        if let Some(cmd) = &self.hooks.post_phase {
            if cmd.trim().is_empty() {
                warn(
                    WarnLevel::Warning,
                    "hooks.post_phase is set but empty".to_string(),
                );
            }
            if self.hooks.timeout_seconds == 0 {
                warn(
                    WarnLevel::Warning,
                    "hooks.timeout_seconds is 0; the hook will always time out".to_string(),
                );
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.gate_timeout_seconds, 30);
        assert_eq!(cfg.pipeline.total_weight(), 100.0);
        assert!(cfg.hooks.post_phase.is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "gate_timeout_seconds: 5\npipeline:\n  traceability_weight: 20\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.gate_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.pipeline.structural_weight, 30.0);
        assert_eq!(cfg.pipeline.traceability_weight, 20.0);
        assert_eq!(cfg.compliance.required_terms.len(), 3);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.hooks.post_phase = Some("echo done".to_string());
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.hooks.post_phase.as_deref(), Some("echo done"));
    }

    #[test]
    fn validate_flags_bad_weights_and_timeouts() {
        let mut cfg = Config::default();
        cfg.gate_timeout_seconds = 0;
        cfg.pipeline.compliance_weight = 50.0;
        cfg.compliance.domain_keywords.clear();
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("gate_timeout_seconds")));
        assert!(warnings.iter().any(|w| w.message.contains("sum to 120")));
        assert!(warnings.iter().any(|w| w.message.contains("domain_keywords")));
    }

    #[test]
    fn validate_flags_empty_hook() {
        let mut cfg = Config::default();
        cfg.hooks.post_phase = Some("  ".to_string());
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("post_phase"));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".sparc")).unwrap();
        std::fs::write(dir.path().join(".sparc/config.yaml"), "pipeline: [oops").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
