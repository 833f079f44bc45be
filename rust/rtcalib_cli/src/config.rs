use rtcalib::{
    LibraryCalculator,
    MeasuredPoint,
    ProjectCalculator,
    ReferencePeptide,
    RegressionConfig,
    RetentionScoreCalculator,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub regression: RegressionConfig,
    pub runs: Vec<RunConfig>,
    pub output: Option<OutputConfig>,
}

/// One independent regression request.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum RunConfig {
    /// Calibrate against iRT standards, falling back to shared library peptides.
    #[serde(rename = "standards")]
    Standards {
        name: String,
        standards: Vec<ReferencePeptide>,
        #[serde(default)]
        existing: Vec<ReferencePeptide>,
        measured: Vec<MeasuredPoint>,
    },
    /// Pick the best of several calculators, optionally trimming outliers.
    #[serde(rename = "calculators")]
    Calculators {
        name: String,
        calculators: Vec<CalculatorConfig>,
        measured: Vec<MeasuredPoint>,
        #[serde(default)]
        all_peptides: bool,
        #[serde(default)]
        refine: bool,
    },
}

impl RunConfig {
    pub fn name(&self) -> &str {
        match self {
            RunConfig::Standards { name, .. } => name,
            RunConfig::Calculators { name, .. } => name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum CalculatorConfig {
    #[serde(rename = "library")]
    Library {
        name: String,
        standards: Vec<ReferencePeptide>,
    },
    #[serde(rename = "project")]
    Project {
        name: String,
        #[serde(default)]
        standards: Vec<ReferencePeptide>,
        #[serde(default)]
        library: Vec<ReferencePeptide>,
    },
}

impl CalculatorConfig {
    pub fn build(&self, config: &RegressionConfig) -> Box<dyn RetentionScoreCalculator> {
        match self {
            CalculatorConfig::Library { name, standards } => Box::new(
                LibraryCalculator::new(name.clone(), standards.clone())
                    .with_count_rule(config.standard_count_rule()),
            ),
            CalculatorConfig::Project {
                name,
                standards,
                library,
            } => Box::new(ProjectCalculator::new(name.clone(), standards, library)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    /// Rejects configurations whose runs would clash or do nothing.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.runs.is_empty() {
            return Err(CliError::Config {
                source: "No runs specified".to_string(),
            });
        }
        let mut names = HashSet::new();
        for run in &self.runs {
            if run.name().is_empty() {
                return Err(CliError::Config {
                    source: "Every run needs a non-empty name".to_string(),
                });
            }
            if !names.insert(run.name()) {
                return Err(CliError::Config {
                    source: format!("Duplicate run name: {}", run.name()),
                });
            }
            if let RunConfig::Calculators { calculators, .. } = run {
                if calculators.is_empty() {
                    return Err(CliError::Config {
                        source: format!("Run {} has no calculators", run.name()),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "regression": { "correlation_threshold": 0.95 },
        "runs": [
            {
                "type": "standards",
                "name": "irt",
                "standards": [{ "sequence": "AAAK", "score": 1.0 }],
                "measured": [{ "sequence": "AAAK", "retention_time": 12.5 }]
            },
            {
                "type": "calculators",
                "name": "best",
                "calculators": [
                    { "type": "library", "name": "lib", "standards": [] },
                    { "type": "project", "name": "proj" }
                ],
                "measured": [],
                "refine": true
            }
        ],
        "output": null
    }"#;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_json::from_str(CONFIG).unwrap();
        assert_eq!(config.regression.correlation_threshold, 0.95);
        assert_eq!(config.regression.min_refined_points, 20);
        assert_eq!(config.runs.len(), 2);
        assert_eq!(config.runs[1].name(), "best");
        match &config.runs[1] {
            RunConfig::Calculators {
                calculators,
                refine,
                all_peptides,
                ..
            } => {
                assert_eq!(calculators.len(), 2);
                assert!(*refine);
                assert!(!*all_peptides);
            }
            _ => panic!("Expected a calculators run"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_time_rejected() {
        let bad = CONFIG.replace("12.5", "-1.0");
        assert!(serde_json::from_str::<Config>(&bad).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config: Config = serde_json::from_str(CONFIG).unwrap();
        config.runs.push(config.runs[0].clone());
        assert!(matches!(config.validate(), Err(CliError::Config { .. })));
    }
}
