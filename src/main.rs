use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tabled::{settings::Style, Table, Tabled};

use pacetrack::analysis::{
    AnalysisWindow, BiometricReading, BiometricStatus, CorrelationResult, TimePattern, TrendDirection, TrendResult,
};
use pacetrack::baseline::JsonSettingsStore;
use pacetrack::biometrics::StaticBiometricSource;
use pacetrack::store::JsonEventStore;
use pacetrack::{
    AppConfig, BiometricSource, BootstrapStatus, DiagnosticReport, LoadScore, LogLevel, MetricKind, Pacetrack,
    RiskLevel,
};

/// pacetrack - capacity load and symptom analytics
///
/// Turns logged activities, meals and sleep into a decaying daily load and
/// looks for trends, correlations and patterns in logged symptoms.
#[derive(Parser)]
#[command(name = "pacetrack")]
#[command(version)]
#[command(about = "Capacity load and symptom analytics", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Event log exported from the tracker (overrides config)
    #[arg(long, value_name = "FILE")]
    events: Option<PathBuf>,

    /// Biometric samples file (overrides config)
    #[arg(long, value_name = "FILE")]
    samples: Option<PathBuf>,

    /// Offset of the local time zone from UTC in minutes (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<i32>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily capacity load
    Load {
        /// Date range start (YYYY-MM-DD)
        #[arg(short, long)]
        from: Option<NaiveDate>,

        /// Date range end (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        to: Option<NaiveDate>,

        /// Days to show when no start is given
        #[arg(short, long, default_value = "14")]
        days: u32,

        /// Show every day, including days with nothing to display
        #[arg(long)]
        all: bool,
    },

    /// Symptom trends
    Trends {
        /// Analysis window in days (default from config)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Activity/symptom correlations
    Correlations {
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Time-of-day and day-of-week patterns
    Patterns {
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Symptom correlations with HRV, resting HR and sleep, plus current readings
    Physio {
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Every analysis over one window
    Report {
        #[arg(short, long, default_value = "30")]
        days: u32,

        /// Also save a diagnostic report
        #[arg(long)]
        diagnostics: bool,
    },

    /// Show or recompute metric baselines
    Baseline {
        /// Recompute from the biometric samples before showing
        #[arg(short, long)]
        recompute: bool,
    },

    /// Configure application settings
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,

        /// Print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
    let mut config = AppConfig::load_or_default_from(&config_path);

    config.logging.level = match cli.verbose {
        0 => config.logging.level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    pacetrack::logging::init_logging(&config.logging)?;

    if let Some(events) = &cli.events {
        config.storage.events_file = events.clone();
    }
    if let Some(samples) = &cli.samples {
        config.storage.samples_file = samples.clone();
    }
    if let Some(offset) = cli.utc_offset {
        config.set_utc_offset_minutes(offset);
        config.validate()?;
    }

    if let Commands::Config { init, path } = &cli.command {
        return run_config(&mut config, &config_path, *init, *path);
    }

    let pacetrack = build(&config)?;
    let json = cli.json;

    match cli.command {
        Commands::Load { from, to, days, all } => run_load(&pacetrack, from, to, days, all, json),
        Commands::Trends { days } => {
            let window = AnalysisWindow::ending_now(days.unwrap_or(config.analysis.trend_days))?;
            let trends = pacetrack.analysis.trends_in(&window);
            emit(json, &trends, || print_trends(&trends))
        }
        Commands::Correlations { days } => {
            let window = AnalysisWindow::ending_now(days.unwrap_or(config.analysis.correlation_days))?;
            let correlations = pacetrack.analysis.correlations_in(&window);
            emit(json, &correlations, || print_correlations("Activity correlations", &correlations))
        }
        Commands::Patterns { days } => {
            let window = AnalysisWindow::ending_now(days.unwrap_or(config.analysis.pattern_days))?;
            let patterns = pacetrack.analysis.patterns_in(&window);
            emit(json, &patterns, || print_patterns(&patterns))
        }
        Commands::Physio { days } => {
            let window = AnalysisWindow::ending_now(days.unwrap_or(config.analysis.physiological_days))?;
            run_physio(&pacetrack, &window, json).await
        }
        Commands::Report { days, diagnostics } => run_report(&pacetrack, days, diagnostics, json),
        Commands::Baseline { recompute } => run_baseline(&pacetrack, recompute, json).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn build(config: &AppConfig) -> Result<Pacetrack> {
    let events_path = config.storage.events_path();
    let store = Arc::new(JsonEventStore::new(&events_path));

    let samples_path = config.storage.samples_path();
    let source: Arc<dyn BiometricSource> = if samples_path.exists() {
        Arc::new(
            StaticBiometricSource::from_json_file(&samples_path)
                .with_context(|| format!("Failed to read samples: {}", samples_path.display()))?,
        )
    } else {
        tracing::warn!(path = %samples_path.display(), "No biometric samples file; biometrics unavailable");
        Arc::new(StaticBiometricSource::default())
    };

    let settings = Arc::new(JsonSettingsStore::new(config.storage.settings_path()));
    Ok(Pacetrack::new(config, store, source, settings))
}

/// Print `value` as JSON, or run the table printer
fn emit<T: serde::Serialize>(json: bool, value: &T, print: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print();
    }
    Ok(())
}

fn colored_risk(level: RiskLevel) -> ColoredString {
    let label = level.to_string();
    match level {
        RiskLevel::Safe => label.green(),
        RiskLevel::Caution => label.yellow(),
        RiskLevel::High => label.red(),
        RiskLevel::Critical => label.red().bold(),
    }
}

#[derive(Tabled)]
struct LoadRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Raw")]
    raw: String,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Felt")]
    felt: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Symptoms")]
    symptoms: String,
}

impl From<&LoadScore> for LoadRow {
    fn from(score: &LoadScore) -> Self {
        LoadRow {
            date: score.date.format("%a %Y-%m-%d").to_string(),
            raw: format!("{:.1}", score.raw_load),
            load: format!("{:.1}", score.decayed_load),
            felt: score.felt_load.map(|f| format!("{:.1}", f)).unwrap_or_else(|| "-".to_string()),
            risk: colored_risk(score.effective_risk_level).to_string(),
            symptoms: match score.peak_severity {
                Some(peak) => format!("{} (peak {})", score.symptom_count, peak),
                None => "-".to_string(),
            },
        }
    }
}

fn run_load(
    pacetrack: &Pacetrack,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    days: u32,
    all: bool,
    json: bool,
) -> Result<()> {
    let config = pacetrack.load.config();
    let end = to.unwrap_or_else(|| config.local_day(Utc::now()));
    let start = from.unwrap_or_else(|| end - Duration::days(days.saturating_sub(1) as i64));

    let warmup_start = start - Duration::days(config.warmup_days as i64);
    let range = pacetrack::DateRange::new(
        warmup_start.and_time(NaiveTime::MIN).and_utc() - Duration::days(1),
        end.and_time(NaiveTime::MIN).and_utc() + Duration::days(2),
    )?;

    let contributors = pacetrack.store.contributors(&range).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not read contributors");
        Vec::new()
    });
    let symptoms = pacetrack.store.symptoms(&range).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not read symptoms");
        Vec::new()
    });
    let overrides = pacetrack.store.felt_load_overrides(start, end).unwrap_or_default();

    let daily = pacetrack.load.aggregate_daily(&contributors, &symptoms);
    let series = pacetrack.load.calculate_series(&daily, &overrides, start, end)?;
    let summary = pacetrack.load.summarize(&series);
    let shown = if all { series.clone() } else { pacetrack.load.display_scores(series.clone()) };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "scores": shown, "summary": summary }))?
        );
        return Ok(());
    }

    println!("{}", format!("Capacity load {} to {}", start, end).bold());
    if shown.is_empty() {
        println!("{}", "No load recorded in this range".dimmed());
        return Ok(());
    }
    println!("{}", Table::new(shown.iter().map(LoadRow::from)).with(Style::rounded()));

    if let Some(summary) = summary {
        println!(
            "Peak {:.1} on {}, average {:.1}, latest risk {}",
            summary.peak_load,
            summary.peak_date,
            summary.average_load,
            colored_risk(summary.latest_risk)
        );
    }
    if let Some(latest) = series.last() {
        for recommendation in pacetrack.load.generate_recommendations(latest) {
            println!("  • {}", recommendation);
        }
    }
    Ok(())
}

fn colored_direction(trend: &TrendResult) -> ColoredString {
    let label = trend.direction.to_string();
    match trend.direction {
        TrendDirection::Improving => label.green(),
        TrendDirection::Worsening => label.red(),
        TrendDirection::Stable => label.normal(),
    }
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Symptom")]
    symptom: String,
    #[tabled(rename = "Direction")]
    direction: String,
    #[tabled(rename = "Older")]
    older: String,
    #[tabled(rename = "Recent")]
    recent: String,
}

fn mean_cell(mean: Option<f64>, count: usize) -> String {
    mean.map(|m| format!("{:.2} (n={})", m, count)).unwrap_or_else(|| "-".to_string())
}

fn print_trends(trends: &[TrendResult]) {
    println!("{}", "Symptom trends".cyan().bold());
    if trends.is_empty() {
        println!("{}", "No symptoms logged in this window".dimmed());
        return;
    }
    let rows = trends.iter().map(|t| TrendRow {
        symptom: t.symptom.clone(),
        direction: colored_direction(t).to_string(),
        older: mean_cell(t.older_mean, t.older_count),
        recent: mean_cell(t.recent_mean, t.recent_count),
    });
    println!("{}", Table::new(rows).with(Style::rounded()));
}

#[derive(Tabled)]
struct CorrelationRow {
    #[tabled(rename = "With")]
    subject: String,
    #[tabled(rename = "Symptom")]
    symptom: String,
    #[tabled(rename = "Strength")]
    strength: String,
    #[tabled(rename = "n")]
    occurrences: usize,
}

fn print_correlations(title: &str, correlations: &[CorrelationResult]) {
    println!("{}", title.cyan().bold());
    if correlations.is_empty() {
        println!("{}", "Not enough data for correlations yet".dimmed());
        return;
    }
    let rows = correlations.iter().map(|c| CorrelationRow {
        subject: c.subject.to_string(),
        symptom: c.symptom.clone(),
        strength: format!("{:+.2} ({})", c.strength, c.describe_strength()),
        occurrences: c.occurrences,
    });
    println!("{}", Table::new(rows).with(Style::rounded()));
}

#[derive(Tabled)]
struct PatternRow {
    #[tabled(rename = "Symptom")]
    symptom: String,
    #[tabled(rename = "Peak hour")]
    hour: String,
    #[tabled(rename = "Peak day")]
    weekday: String,
    #[tabled(rename = "n")]
    occurrences: usize,
}

fn print_patterns(patterns: &[TimePattern]) {
    println!("{}", "Time patterns".cyan().bold());
    if patterns.is_empty() {
        println!("{}", "No symptom logged often enough to show a pattern".dimmed());
        return;
    }
    let rows = patterns.iter().map(|p| PatternRow {
        symptom: p.symptom.clone(),
        hour: format!("{:02}:00 ({}x)", p.peak_hour, p.peak_hour_count),
        weekday: format!("{} ({}x)", p.peak_weekday, p.peak_weekday_count),
        occurrences: p.occurrences,
    });
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn print_reading(reading: &BiometricReading) {
    let status = reading.status.to_string();
    let status = match reading.status {
        BiometricStatus::WithinBaseline => status.green(),
        BiometricStatus::Elevated | BiometricStatus::Depressed => status.yellow(),
        BiometricStatus::NoBaseline => status.dimmed(),
    };
    match reading.z_score {
        Some(z) => println!("  {:<12} {:>7.1}  z={:+.2}  {}", reading.metric.to_string(), reading.value, z, status),
        None => println!("  {:<12} {:>7.1}  {}", reading.metric.to_string(), reading.value, status),
    }
}

async fn run_physio(pacetrack: &Pacetrack, window: &AnalysisWindow, json: bool) -> Result<()> {
    let correlations = pacetrack.analysis.physiological_in(window);

    let mut readings = Vec::new();
    for metric in [MetricKind::Hrv, MetricKind::RestingHeartRate] {
        if let Some(sample) = pacetrack.cache.latest(metric).await {
            readings.push(pacetrack.analysis.biometric_status(metric, sample.value));
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "correlations": correlations,
                "readings": readings,
            }))?
        );
        return Ok(());
    }

    print_correlations("Physiological correlations", &correlations);
    println!("{}", "Latest readings".cyan().bold());
    if readings.is_empty() {
        println!("{}", "No recent biometric readings".dimmed());
    }
    readings.iter().for_each(print_reading);
    Ok(())
}

fn run_report(pacetrack: &Pacetrack, days: u32, diagnostics: bool, json: bool) -> Result<()> {
    let started = Instant::now();
    let mut diagnostic = DiagnosticReport::new("report");
    diagnostic.add_context("days", days);

    let result = AnalysisWindow::ending_now(days).map(|window| pacetrack.analysis.report_in(&window));

    if diagnostics {
        match &result {
            Ok(report) => {
                diagnostic.add_context("trends", report.trends.len());
                diagnostic.add_context("correlations", report.correlations.len());
                diagnostic.add_context("patterns", report.patterns.len());
                diagnostic.add_context("physiological", report.physiological.len());
                if report.is_empty() {
                    diagnostic.add_warning("report is empty");
                }
            }
            Err(e) => diagnostic.add_error(e),
        }
        diagnostic.finish(result.is_ok(), started.elapsed());
        let path = diagnostic.save_default()?;
        eprintln!("{}", format!("Diagnostic report: {}", path.display()).dimmed());
    }

    let report = result?;
    emit(json, &report, || {
        println!(
            "{}",
            format!("Report for the {} days to {}", report.window.days, report.window.end.format("%Y-%m-%d")).bold()
        );
        print_trends(&report.trends);
        print_correlations("Activity correlations", &report.correlations);
        print_patterns(&report.patterns);
        print_correlations("Physiological correlations", &report.physiological);
    })
}

#[derive(Tabled)]
struct BaselineRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std dev")]
    std_dev: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Computed")]
    computed_at: String,
}

async fn run_baseline(pacetrack: &Pacetrack, recompute: bool, json: bool) -> Result<()> {
    if recompute {
        let status = pacetrack.initialize().await;
        if !json {
            match &status {
                BootstrapStatus::Ready(summary) => {
                    println!("{}", "✓ Baselines recomputed".green());
                    for metric in &summary.insufficient {
                        println!("  {} {}: not enough samples, previous baseline kept", "!".yellow(), metric);
                    }
                }
                BootstrapStatus::Degraded { reason } => {
                    println!("{}", format!("Baselines not recomputed: {}", reason).yellow());
                }
            }
        }
    }

    let baselines = pacetrack.baselines.snapshot();
    emit(json, &baselines, || {
        if baselines.is_empty() {
            println!("{}", "No baselines yet".dimmed());
            return;
        }
        let rows = baselines.iter().map(|b| BaselineRow {
            metric: b.metric.to_string(),
            mean: format!("{:.1}", b.mean),
            std_dev: format!("{:.1}", b.std_dev),
            samples: b.sample_count,
            computed_at: b.computed_at.format("%Y-%m-%d %H:%M").to_string(),
        });
        println!("{}", Table::new(rows).with(Style::rounded()));
    })
}

fn run_config(config: &mut AppConfig, config_path: &Path, init: bool, path: bool) -> Result<()> {
    if path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("{}", format!("Config already exists: {}", config_path.display()).yellow());
        } else {
            config.save_to_file(config_path)?;
            println!("{}", format!("✓ Wrote {}", config_path.display()).green());
        }
        return Ok(());
    }

    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
