//! Terminal summaries of training and prediction runs

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::artifacts::GenerationInfo;
use crate::pipeline::prediction::PredictionResult;
use crate::report::training_report::{TargetReport, TrainingReport};

fn print_section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "n/a".to_string(), |s| format!("{:.4}", s))
}

fn score_color(score: Option<f64>) -> Color {
    match score {
        Some(s) if s >= 0.8 => Color::Green,
        Some(s) if s >= 0.5 => Color::Yellow,
        _ => Color::Red,
    }
}

/// Training summary built from the run's report
#[derive(Debug)]
pub struct TrainingSummary<'a> {
    report: &'a TrainingReport,
}

impl<'a> TrainingSummary<'a> {
    pub fn new(report: &'a TrainingReport) -> Self {
        Self { report }
    }

    pub fn display(&self) {
        print_section("📋", "TRAINING SUMMARY");
        println!(
            "    Generation {}",
            style(&self.report.generation_id).cyan().bold()
        );

        for target in &self.report.targets {
            println!();
            self.display_target(target);
        }
    }

    fn display_target(&self, target: &TargetReport) {
        println!(
            "    {} {}",
            style("🎯").cyan(),
            style(format!("Target {}", target.target)).white().bold()
        );

        let mut overview = Table::new();
        overview.load_preset(UTF8_FULL_CONDENSED);
        overview.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);
        overview.add_row(vec![Cell::new("📁 Rows"), Cell::new(target.rows)]);
        overview.add_row(vec![Cell::new("📐 Input features"), Cell::new(target.input_features)]);
        overview.add_row(vec![
            Cell::new("🗑️  Dropped (Missing)"),
            Cell::new(target.dropped_missing.len()).fg(if target.dropped_missing.is_empty() {
                Color::White
            } else {
                Color::Red
            }),
        ]);
        overview.add_row(vec![Cell::new("🩹 Imputed"), Cell::new(target.imputed.len())]);
        overview.add_row(vec![
            Cell::new("✂️  Drop list"),
            Cell::new(target.drop_list_size).fg(if target.drop_list_size == 0 {
                Color::White
            } else {
                Color::Red
            }),
        ]);
        overview.add_row(vec![
            Cell::new("✅ Features used"),
            Cell::new(target.features_used)
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        overview.add_row(vec![
            Cell::new("🧩 Clusters (k)"),
            Cell::new(target.k).fg(Color::Cyan).add_attribute(Attribute::Bold),
        ]);
        print_indented(&overview);

        let mut clusters = Table::new();
        clusters.load_preset(UTF8_FULL_CONDENSED);
        clusters.set_header(vec![
            Cell::new("Cluster").add_attribute(Attribute::Bold),
            Cell::new("Train").add_attribute(Attribute::Bold),
            Cell::new("Test").add_attribute(Attribute::Bold),
            Cell::new("Winner").add_attribute(Attribute::Bold),
            Cell::new("CV adj. R²").add_attribute(Attribute::Bold),
            Cell::new("Test adj. R²").add_attribute(Attribute::Bold),
        ]);
        for cluster in &target.clusters {
            let entry = cluster.winner_entry();
            let cv = entry.and_then(|e| e.cv_score);
            let test = entry.and_then(|e| e.test_score);
            clusters.add_row(vec![
                Cell::new(cluster.cluster).set_alignment(CellAlignment::Right),
                Cell::new(cluster.train_rows).set_alignment(CellAlignment::Right),
                Cell::new(cluster.test_rows).set_alignment(CellAlignment::Right),
                Cell::new(cluster.winner).fg(Color::Cyan),
                Cell::new(format_score(cv)).set_alignment(CellAlignment::Right),
                Cell::new(format_score(test))
                    .fg(score_color(test))
                    .set_alignment(CellAlignment::Right),
            ]);
        }
        println!();
        print_indented(&clusters);
    }
}

/// Counts of predicted and skipped rows per target
#[derive(Debug)]
pub struct PredictionSummary<'a> {
    result: &'a PredictionResult,
}

impl<'a> PredictionSummary<'a> {
    pub fn new(result: &'a PredictionResult) -> Self {
        Self { result }
    }

    pub fn display(&self) {
        print_section("📋", "PREDICTION SUMMARY");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Target").add_attribute(Attribute::Bold),
            Cell::new("Input rows").add_attribute(Attribute::Bold),
            Cell::new("Predicted").add_attribute(Attribute::Bold),
            Cell::new("Skipped").add_attribute(Attribute::Bold),
        ]);
        for target in &self.result.targets {
            let skipped = self.result.failure_count(target);
            table.add_row(vec![
                Cell::new(target).add_attribute(Attribute::Bold),
                Cell::new(self.result.input_rows).set_alignment(CellAlignment::Right),
                Cell::new(self.result.predicted_count(target))
                    .fg(Color::Green)
                    .set_alignment(CellAlignment::Right),
                Cell::new(skipped)
                    .fg(if skipped == 0 { Color::White } else { Color::Red })
                    .set_alignment(CellAlignment::Right),
            ]);
        }
        print_indented(&table);

        if !self.result.failures.is_empty() {
            print_section("📝", "SKIPPED ROWS");
            for failure in self.result.failures.iter().take(10) {
                println!(
                    "      {} id {} ({}): {}",
                    style("•").dim(),
                    failure.id,
                    failure.target,
                    style(&failure.reason).dim()
                );
            }
            if self.result.failures.len() > 10 {
                println!(
                    "      {}",
                    style(format!("... and {} more", self.result.failures.len() - 10)).dim()
                );
            }
        }
    }
}

/// Table of committed generations
pub fn display_generations(generations: &[GenerationInfo]) {
    print_section("🗂️ ", "GENERATIONS");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Id").add_attribute(Attribute::Bold),
        Cell::new("Created (UTC)").add_attribute(Attribute::Bold),
        Cell::new("Targets").add_attribute(Attribute::Bold),
        Cell::new("Current").add_attribute(Attribute::Bold),
    ]);
    for info in generations {
        let current = if info.is_current {
            Cell::new("●").fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(&info.id),
            Cell::new(info.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(info.targets.join(", ")),
            current.set_alignment(CellAlignment::Center),
        ]);
    }
    print_indented(&table);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(Some(0.123456)), "0.1235");
        assert_eq!(format_score(None), "n/a");
    }

    #[test]
    fn test_score_color_thresholds() {
        assert_eq!(score_color(Some(0.9)), Color::Green);
        assert_eq!(score_color(Some(0.6)), Color::Yellow);
        assert_eq!(score_color(None), Color::Red);
    }
}
