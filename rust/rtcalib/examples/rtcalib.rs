use rand::Rng;
use rtcalib::plotting::plot_fit;
use rtcalib::{
    LibraryCalculator,
    MeasuredPoint,
    ReferencePeptide,
    RegressionEngine,
    RetentionScoreCalculator,
    ScoreCache,
    StandardsRegression,
    ThresholdSearch,
};
use std::collections::HashMap;

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_thread_ids(true)
        .with_thread_names(true)
        .try_init();
}

fn main() {
    println!("Running RT calibration example");
    setup_tracing();

    // 1. Two calculators over the same 200 peptides, one much noisier
    let mut rng = rand::thread_rng();
    let library: Vec<ReferencePeptide> = (0..200)
        .map(|i| ReferencePeptide::new(format!("PEPTIDE{}K", i), i as f64 * 0.5 - 20.0))
        .collect();
    let noisy: Vec<ReferencePeptide> = library
        .iter()
        .map(|p| ReferencePeptide::new(p.sequence.clone(), p.score + rng.gen_range(-15.0..15.0)))
        .collect();
    let good = LibraryCalculator::new("library", library.clone());
    let bad = LibraryCalculator::new("noisy", noisy);

    // 2. Measured times along t = 0.8 * irt + 25, with a few gross outliers
    let mut measured = Vec::new();
    for (i, pep) in library.iter().enumerate() {
        let mut time = 0.8 * pep.score + 25.0 + rng.gen_range(-0.5..0.5);
        if i % 37 == 0 {
            time += rng.gen_range(20.0..40.0);
        }
        match MeasuredPoint::new(pep.sequence.clone(), time) {
            Ok(point) => measured.push(point),
            Err(e) => eprintln!("Skipping point: {}", e),
        }
    }
    println!("Generated {} measured points.", measured.len());

    // 3. Pick the best calculator
    let calculators: [&dyn RetentionScoreCalculator; 2] = [&bad, &good];
    let sequences: Vec<&str> = measured.iter().map(|p| p.sequence()).collect();
    let mut cache = ScoreCache::with_peptides(&calculators, &sequences, None);
    let engine = RegressionEngine::default();
    match engine.fit("example", &calculators, &measured, Some(&mut cache), false) {
        Some(fit) => {
            println!(
                "Best calculator: {} (r = {:.4}, window = {:.2})",
                fit.calculator().name(),
                fit.r(),
                fit.time_window()
            );
            plot_fit(fit.statistics(), &fit.model(), 60, 20);
        }
        None => eprintln!("No calculator produced a regression"),
    }

    // 4. Trim the outliers until r >= 0.99
    match ThresholdSearch::new(0.99, Some(4)).run(
        &measured,
        &[],
        &measured,
        &good,
        Some(&mut cache),
        None,
    ) {
        Some(result) => {
            println!(
                "Refined fit kept {} points, excluded {} (r = {:.4})",
                result.retained_points(),
                result.excluded().len(),
                result.fit().r()
            );
            println!("\n--- Predictions ---");
            for seq in ["PEPTIDE10K", "PEPTIDE150K", "NOTINTHELIBRARY"] {
                match result.fit().predict_time_for_sequence(seq, Some(&mut cache)) {
                    Some(time) => println!("- {} elutes around {:.2}", seq, time),
                    None => println!("- {} has no prediction", seq),
                }
            }
        }
        None => eprintln!("Threshold search failed"),
    }

    // 5. Standards calibration with a shared-peptide fallback
    println!("\n--- Standards calibration (3 of 11 standards measured) ---");
    let standards: Vec<ReferencePeptide> = (0..11)
        .map(|i| ReferencePeptide::new(format!("STANDARD{}R", i), i as f64 * 10.0))
        .collect();
    let mut lookup: HashMap<String, f64> = standards[..3]
        .iter()
        .map(|s| (s.sequence.clone(), 0.8 * s.score + 25.0))
        .collect();
    for point in &measured {
        lookup.insert(point.sequence().to_string(), point.retention_time());
    }
    match StandardsRegression::default().fit(&lookup, &standards, &library) {
        Some(fit) => println!("Calibration: {:#?}", fit),
        None => eprintln!("No usable calibration"),
    }
}
