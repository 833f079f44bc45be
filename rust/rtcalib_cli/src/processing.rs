use super::config::{
    CalculatorConfig,
    OutputConfig,
    RunConfig,
};
use crate::errors::CliError;
use indicatif::{
    ParallelProgressIterator,
    ProgressStyle,
};
use rayon::prelude::*;
use rtcalib::plotting::format_fit_plot;
use rtcalib::standards::PROJECT_CALCULATOR_NAME;
use rtcalib::{
    MeasuredPoint,
    RegressionConfig,
    RegressionEngine,
    RegressionFit,
    RegressionSource,
    RetentionScoreCalculator,
    ScoreCache,
    StandardsRegression,
    ThresholdSearch,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Fitted,
    NoRegression,
}

/// Serialized summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    pub outcome: RunOutcome,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub r: Option<f64>,
    pub time_window: Option<f64>,
    pub calculator: Option<String>,
    pub points: usize,
    pub excluded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RegressionSource>,
    #[serde(skip)]
    pub plot: Option<String>,
}

impl RunReport {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: RunOutcome::NoRegression,
            slope: None,
            intercept: None,
            r: None,
            time_window: None,
            calculator: None,
            points: 0,
            excluded: 0,
            source: None,
            plot: None,
        }
    }

    fn from_fit(name: &str, fit: &RegressionFit, excluded: usize, plot: bool) -> Self {
        let model = fit.model();
        Self {
            name: name.to_string(),
            outcome: RunOutcome::Fitted,
            slope: Some(model.slope),
            intercept: Some(model.intercept),
            r: Some(fit.r()),
            time_window: Some(fit.time_window()),
            calculator: Some(fit.calculator().name().to_string()),
            points: fit.statistics().len(),
            excluded,
            source: None,
            plot: plot.then(|| format_fit_plot(fit.statistics(), &model, 60, 20)),
        }
    }
}

/// Runs every request in parallel. Each run gets its own score cache.
pub fn process_runs(runs: &[RunConfig], config: &RegressionConfig, plot: bool) -> Vec<RunReport> {
    let start = Instant::now();
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let reports: Vec<RunReport> = runs
        .par_iter()
        .progress_with_style(style)
        .map(|run| process_run(run, config, plot))
        .collect();

    let fitted = reports
        .iter()
        .filter(|r| r.outcome == RunOutcome::Fitted)
        .count();
    info!(
        "Fitted {} of {} runs in {:?}",
        fitted,
        reports.len(),
        start.elapsed()
    );
    reports
}

pub fn process_run(run: &RunConfig, config: &RegressionConfig, plot: bool) -> RunReport {
    match run {
        RunConfig::Standards {
            name,
            standards,
            existing,
            measured,
        } => {
            info!("Calibrating {} against {} standards", name, standards.len());
            let Some(fit) = StandardsRegression::new(*config).fit(&measured[..], standards, existing)
            else {
                warn!("Run {} produced no usable regression", name);
                return RunReport::empty(name);
            };
            let (calculator, points, excluded) = match &fit.source {
                RegressionSource::Standards { used, dropped } => {
                    ("standards".to_string(), *used, dropped.len())
                }
                RegressionSource::SharedPeptides { retained, excluded } => {
                    (PROJECT_CALCULATOR_NAME.to_string(), *retained, *excluded)
                }
            };
            RunReport {
                outcome: RunOutcome::Fitted,
                slope: Some(fit.model.slope),
                intercept: Some(fit.model.intercept),
                r: Some(fit.r),
                calculator: Some(calculator),
                points,
                excluded,
                source: Some(fit.source),
                ..RunReport::empty(name)
            }
        }
        RunConfig::Calculators {
            name,
            calculators,
            measured,
            all_peptides,
            refine,
        } => fit_calculators(name, calculators, measured, *all_peptides, *refine, config, plot),
    }
}

fn fit_calculators(
    name: &str,
    calculators: &[CalculatorConfig],
    measured: &[MeasuredPoint],
    all_peptides: bool,
    refine: bool,
    config: &RegressionConfig,
    plot: bool,
) -> RunReport {
    let built: Vec<Box<dyn RetentionScoreCalculator>> =
        calculators.iter().map(|c| c.build(config)).collect();
    let calculators: Vec<&dyn RetentionScoreCalculator> = built.iter().map(|c| c.as_ref()).collect();

    let sequences: Vec<&str> = measured.iter().map(|p| p.sequence()).collect();
    let mut cache = ScoreCache::with_peptides(&calculators, &sequences, None);

    let engine = RegressionEngine::new(*config);
    let Some(fit) = engine.fit(name, &calculators, measured, Some(&mut cache), all_peptides) else {
        warn!("Run {} produced no usable regression", name);
        return RunReport::empty(name);
    };
    info!(
        "Run {}: calculator {} r = {:.4} over {} peptides",
        name,
        fit.calculator().name(),
        fit.r(),
        fit.statistics().len()
    );
    if !refine || config.is_above_threshold(fit.r()) {
        return RunReport::from_fit(name, &fit, 0, plot);
    }

    // The winning calculator's standards are never trimmed.
    let calculator = fit.calculator();
    let standard_set = calculator.standard_peptides(&sequences);
    let (standard, variable): (Vec<MeasuredPoint>, Vec<MeasuredPoint>) = measured
        .iter()
        .cloned()
        .partition(|p| standard_set.contains(&p.sequence()));
    debug!(
        "Refining {} with {} fixed and {} variable points",
        name,
        standard.len(),
        variable.len()
    );

    let search = ThresholdSearch::from_config(config);
    match search.run(measured, &standard, &variable, calculator, Some(&mut cache), None) {
        Some(result) => {
            if !result.is_above_threshold() {
                warn!(
                    "Run {} stayed below the correlation threshold (r = {:.4})",
                    name,
                    result.fit().r()
                );
            }
            let excluded = result.excluded().len();
            RunReport::from_fit(name, result.fit(), excluded, plot)
        }
        None => {
            warn!("Refinement of {} failed, keeping the unrefined fit", name);
            RunReport::from_fit(name, &fit, 0, plot)
        }
    }
}

/// Writes `<directory>/<name>.json`, or prints to stdout without an output directory.
pub fn write_report(report: &RunReport, output: Option<&OutputConfig>) -> Result<(), CliError> {
    if let Some(plot) = &report.plot {
        println!("{}\n{}", report.name, plot);
    }
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(output) => {
            let path = output.directory.join(format!("{}.json", report.name));
            std::fs::write(&path, json).map_err(|e| CliError::Io {
                source: e.to_string(),
                path: Some(path.to_string_lossy().to_string()),
            })?;
            info!("Wrote report for {} to {}", report.name, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
