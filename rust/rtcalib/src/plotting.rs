// ANSI color codes
const COLOR_GRAY: &str = "\x1b[90m";
const COLOR_CYAN: &str = "\x1b[96m";
const COLOR_RED: &str = "\x1b[91m";
const COLOR_RESET: &str = "\x1b[0m";

use crate::regression::{
    RegressionModel,
    RetentionTimeStatistics,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell {
    Empty,
    Line,
    Point,
    Axis,
}

/// Prints the fit as a scatter plot with its regression line.
pub fn plot_fit(stats: &RetentionTimeStatistics, model: &RegressionModel, width: usize, height: usize) {
    println!("\n{}", format_fit_plot(stats, model, width, height));
}

/// Formats observed times against scores, overlaying the fitted line.
///
/// Points are red, the line is cyan, and the zero axes are gray when they
/// fall within range.
///
/// # Example
/// ```
/// use rtcalib::plotting::format_fit_plot;
/// use rtcalib::regression::{RegressionModel, RetentionTimeStatistics};
///
/// let stats = RetentionTimeStatistics::new(
///     1.0,
///     vec!["A".into(), "B".into(), "C".into()],
///     vec![0.0, 1.0, 2.0],
///     vec![1.0, 2.0, 3.0],
///     vec![1.0, 2.0, 3.0],
/// );
/// let plot = format_fit_plot(&stats, &RegressionModel::new(1.0, 1.0), 30, 10);
/// assert!(plot.contains("n: 3"));
/// ```
pub fn format_fit_plot(
    stats: &RetentionTimeStatistics,
    model: &RegressionModel,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(2);
    let height = height.max(2);
    let mut output = String::new();

    let finite = |v: &&f64| v.is_finite();
    let (mut x_min, mut x_max) = min_max(stats.scores().iter().filter(finite).copied());
    let (mut y_min, mut y_max) = min_max(stats.observed_times().iter().filter(finite).copied());

    // Handle edge cases
    if !x_min.is_finite() || !x_max.is_finite() || x_min == x_max {
        x_min -= 1.0;
        x_max += 1.0;
        if !x_min.is_finite() {
            (x_min, x_max) = (-1.0, 1.0);
        }
    }
    for x in [x_min, x_max] {
        let y = model.predict(x);
        if y.is_finite() {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_min == y_max {
        y_min = if y_min.is_finite() { y_min - 1.0 } else { -1.0 };
        y_max = if y_max.is_finite() { y_max + 1.0 } else { 1.0 };
    }

    let x_span = x_max - x_min;
    let y_span = y_max - y_min;
    let to_col = |x: f64| (((x - x_min) / x_span) * (width - 1) as f64).round() as usize;
    let to_row = |y: f64| {
        let normalized = (y - y_min) / y_span;
        (((1.0 - normalized) * (height - 1) as f64).round() as usize).min(height - 1)
    };

    let mut grid = vec![vec![Cell::Empty; width]; height];

    if y_min <= 0.0 && y_max >= 0.0 {
        let row = to_row(0.0);
        for cell in grid[row].iter_mut() {
            *cell = Cell::Axis;
        }
    }
    if x_min <= 0.0 && x_max >= 0.0 {
        let col = to_col(0.0).min(width - 1);
        for row in grid.iter_mut() {
            row[col] = Cell::Axis;
        }
    }

    for col in 0..width {
        let x = x_min + (col as f64 / (width - 1) as f64) * x_span;
        let y = model.predict(x);
        if y.is_finite() && y >= y_min && y <= y_max {
            grid[to_row(y)][col] = Cell::Line;
        }
    }

    for (&x, &y) in stats.scores().iter().zip(stats.observed_times().iter()) {
        if x.is_finite() && y.is_finite() {
            grid[to_row(y)][to_col(x).min(width - 1)] = Cell::Point;
        }
    }

    // Top border
    output.push('╔');
    output.push_str(&"═".repeat(width));
    output.push_str("╗\n");

    for row in &grid {
        output.push('║');
        for cell in row {
            match cell {
                Cell::Empty => output.push(' '),
                Cell::Line => output.push_str(&format!("{}·{}", COLOR_CYAN, COLOR_RESET)),
                Cell::Point => output.push_str(&format!("{}●{}", COLOR_RED, COLOR_RESET)),
                Cell::Axis => output.push_str(&format!("{}┼{}", COLOR_GRAY, COLOR_RESET)),
            }
        }
        output.push_str("║\n");
    }

    // Bottom border
    output.push('╚');
    output.push_str(&"═".repeat(width));
    output.push_str("╝\n");

    output.push_str(&format!(
        "\n  Score: [{:.2}, {:.2}]  Time: [{:.2}, {:.2}]  y = {:.4}x + {:.4}  r: {:.4}  n: {}\n",
        x_min,
        x_max,
        y_min,
        y_max,
        model.slope,
        model.intercept,
        stats.r(),
        stats.len()
    ));

    output
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_dimensions() {
        let stats = RetentionTimeStatistics::new(
            0.99,
            (0..5).map(|i| format!("P{}", i)).collect(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, 4.0, 6.0, 8.0, 10.0],
            vec![2.1, 3.9, 6.2, 7.8, 10.0],
        );
        let plot = format_fit_plot(&stats, &RegressionModel::new(2.0, 0.0), 40, 12);
        let rows = plot.lines().filter(|l| l.starts_with('║')).count();
        assert_eq!(rows, 12);
        assert_eq!(plot.matches('●').count(), 5);
    }

    #[test]
    fn test_plot_empty_stats() {
        let stats = RetentionTimeStatistics::new(f64::NAN, vec![], vec![], vec![], vec![]);
        let plot = format_fit_plot(&stats, &RegressionModel::new(1.0, 0.0), 10, 5);
        assert!(plot.contains("n: 0"));
    }
}
