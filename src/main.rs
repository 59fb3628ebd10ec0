//! messcheck CLI

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use messcheck::cache::FreshnessStrategy;
use messcheck::rules::builtin_rules;
use messcheck::{Analyzer, Config, Report};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "messcheck",
    version,
    about = "Incremental mess detector",
    long_about = "Runs structural rules over syntax trees, hides violations accepted by a baseline \
                  and reuses results of unchanged files from a persistent cache."
)]
struct Cli {
    /// Files, directories or glob patterns to analyze
    paths: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Baseline document listing accepted violations
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Write every current violation to this baseline document and exit
    #[arg(long, conflicts_with = "baseline")]
    generate_baseline: Option<PathBuf>,

    /// Enable the result cache
    #[arg(long)]
    cache: bool,

    /// Result cache file (implies --cache)
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// How unchanged files are detected
    #[arg(long, value_enum)]
    cache_strategy: Option<Strategy>,

    /// Ignore suppression annotations
    #[arg(long)]
    strict: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Analyze files sequentially
    #[arg(long)]
    no_parallel: bool,

    /// Disable specific rules (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Content,
    Timestamp,
}

impl From<Strategy> for FreshnessStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Content => FreshnessStrategy::Content,
            Strategy::Timestamp => FreshnessStrategy::Timestamp,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let base_dir = std::env::current_dir().context("Unable to determine working directory")?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::discover(&base_dir).context("Failed to load config")?,
    };
    apply_cli(&mut config, cli);

    if cli.list_rules {
        list_rules(&config);
        return Ok(0);
    }

    if cli.paths.is_empty() {
        eprintln!("{}: No paths specified", "error".red().bold());
        eprintln!();
        eprintln!("Usage: messcheck [OPTIONS] <PATHS>...");
        eprintln!();
        eprintln!("For more information, try '--help'");
        return Ok(2);
    }

    let analyzer = Analyzer::new(config, &base_dir);
    let files = analyzer.collect_files(&cli.paths)?;
    if files.is_empty() {
        eprintln!("{}: No files found to analyze", "error".red().bold());
        return Ok(2);
    }

    if let Some(path) = &cli.generate_baseline {
        let (report, written) = analyzer.generate_baseline(&files, path)?;
        for error in &report.errors {
            eprintln!("{}: {}", "error".red().bold(), error);
        }
        eprintln!(
            "{} {} entries to {}",
            "Wrote".green().bold(),
            written,
            path.display()
        );
        return Ok(if report.has_errors() { 2 } else { 0 });
    }

    let report = analyzer.run(&files)?;
    match cli.format {
        Format::Text => print_text(&report, &base_dir),
        Format::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Unable to serialize report")?
        ),
    }
    Ok(report.exit_code())
}

fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(baseline) = &cli.baseline {
        config.baseline = Some(baseline.clone());
    }
    if cli.generate_baseline.is_some() {
        config.baseline = None;
    }
    if cli.cache || cli.cache_file.is_some() {
        config.cache.enabled = true;
    }
    if let Some(file) = &cli.cache_file {
        config.cache.file = Some(file.clone());
    }
    if let Some(strategy) = cli.cache_strategy {
        config.cache.strategy = strategy.into();
    }
    if cli.strict {
        config.strict = true;
    }
    if let Some(jobs) = cli.jobs {
        config.engine.jobs = jobs;
    }
    if cli.no_parallel {
        config.engine.parallel = false;
    }
    if let Some(disabled) = &cli.disable {
        config.rules.disabled.extend(disabled.iter().cloned());
    }
}

fn list_rules(config: &Config) {
    println!("{}", "Available rules:".bold());
    println!();
    let mut all = config.rules.clone();
    all.disabled.clear();
    for rule in builtin_rules(&all) {
        let state = if config.rules.is_enabled(rule.id()) {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("  {} ({}) [{}]", rule.id().cyan(), rule.rule_set(), state);
        if !rule.description().is_empty() {
            println!("      {}", rule.description());
        }
    }
}

fn print_text(report: &Report, base_dir: &Path) {
    let mut current: Option<&Path> = None;
    for violation in &report.violations {
        if current != Some(violation.file()) {
            if current.is_some() {
                println!();
            }
            let file = violation.file();
            let shown = file.strip_prefix(base_dir).unwrap_or(file);
            println!("{}", shown.display().to_string().underline());
            current = Some(file);
        }

        let method = violation
            .method()
            .map(|m| format!(" in {}", m))
            .unwrap_or_default();
        println!(
            "  {:>5}  {}  {}{}",
            violation.begin_line().to_string().dimmed(),
            violation.rule_id().yellow(),
            violation.message(),
            method.dimmed()
        );
    }

    for warning in &report.warnings {
        eprintln!("{}: {}", "warning".yellow().bold(), warning);
    }
    for error in &report.errors {
        eprintln!("{}: {}", "error".red().bold(), error);
    }

    let mut summary = format!(
        "\n{} {} processed, {} {}",
        report.files_processed,
        if report.files_processed == 1 { "file" } else { "files" },
        report.violations.len(),
        if report.violations.len() == 1 { "violation" } else { "violations" },
    );
    if report.baseline_suppressed > 0 {
        summary.push_str(&format!(", {} baselined", report.baseline_suppressed));
    }
    if let Some(cache) = report.cache {
        summary.push_str(&format!(", {} cached", cache.hits));
    }
    println!("{}", summary);
}
