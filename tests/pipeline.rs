//! End-to-end tests for the analyzer pipeline

use messcheck::cache::FreshnessStrategy;
use messcheck::config::CacheConfig;
use messcheck::rule::RuleSettings;
use messcheck::rules::DuplicatedArrayKey;
use messcheck::{Analyzer, Config, Report, ResultCacheState};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Copy the fixtures into a scratch project
fn project(names: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    for name in names {
        fs::copy(fixtures_path().join(name), temp.path().join("src").join(name)).unwrap();
    }
    temp
}

fn files(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|name| Path::new("src").join(name)).collect()
}

fn cached(strategy: FreshnessStrategy) -> Config {
    Config {
        cache: CacheConfig {
            enabled: true,
            file: Some(PathBuf::from(".cache/messcheck.json")),
            strategy,
        },
        ..Config::default()
    }
}

/// (relative file, line, rule, method) of every violation
fn summary(report: &Report, base: &Path) -> Vec<(String, usize, String, Option<String>)> {
    report
        .violations
        .iter()
        .map(|v| {
            (
                v.file().strip_prefix(base).unwrap().to_string_lossy().to_string(),
                v.begin_line(),
                v.rule_id().to_string(),
                v.method().map(String::from),
            )
        })
        .collect()
}

const ALL: &[&str] = &["service.ast.json", "helpers.ast.json", "clean.ast.json"];

#[test]
fn test_pipeline_reports_sorted_violations() {
    let temp = project(ALL);
    let report = Analyzer::new(Config::default(), temp.path())
        .run(&files(ALL))
        .unwrap();

    assert_eq!(
        summary(&report, temp.path()),
        vec![
            (
                "src/helpers.ast.json".to_string(),
                6,
                "DuplicatedArrayKey".to_string(),
                Some("flags".to_string())
            ),
            (
                "src/service.ast.json".to_string(),
                10,
                "DuplicatedArrayKey".to_string(),
                Some("load".to_string())
            ),
        ]
    );
    assert_eq!(
        report.violations[1].message(),
        "Duplicated array key id, repeated at line 10."
    );
    assert_eq!(report.files_processed, 3);
    assert!(report.errors.is_empty());
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_strict_mode_ignores_suppressions() {
    let temp = project(&["service.ast.json"]);
    let config = Config {
        strict: true,
        ..Config::default()
    };
    let report = Analyzer::new(config, temp.path())
        .run(&files(&["service.ast.json"]))
        .unwrap();

    let lines: Vec<_> = report.violations.iter().map(|v| v.begin_line()).collect();
    assert_eq!(lines, vec![10, 20]);
    assert_eq!(report.violations[1].method(), Some("legacy"));
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let temp = project(ALL);
    let mut targets = files(ALL);
    // Repeat the set under different spellings to give the pool more work
    targets.extend(ALL.iter().map(|name| temp.path().join("src").join(name)));

    let sequential = Config {
        engine: messcheck::config::EngineConfig {
            parallel: false,
            jobs: 1,
        },
        ..Config::default()
    };
    let parallel = Config {
        engine: messcheck::config::EngineConfig {
            parallel: true,
            jobs: 4,
        },
        ..Config::default()
    };

    let expected = Analyzer::new(sequential, temp.path()).run(&targets).unwrap();
    for _ in 0..5 {
        let report = Analyzer::new(parallel.clone(), temp.path())
            .run(&targets)
            .unwrap();
        assert_eq!(report.violations, expected.violations);
        assert_eq!(report.files_processed, 3);
    }
}

#[test]
fn test_rule_settings_change_recomputes_every_file() {
    let temp = project(ALL);
    let targets = files(ALL);

    let first = Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
        .run(&targets)
        .unwrap();
    assert_eq!(first.cache.unwrap().recorded, 3);

    let warm = Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
        .run(&targets)
        .unwrap();
    assert_eq!(warm.cache.unwrap().hits, 3);

    let mut tuned = cached(FreshnessStrategy::Content);
    tuned.rules.settings.insert(
        DuplicatedArrayKey::ID.to_string(),
        RuleSettings {
            priority: 1,
            ..RuleSettings::default()
        },
    );
    let report = Analyzer::new(tuned, temp.path()).run(&targets).unwrap();
    let stats = report.cache.unwrap();
    assert!(stats.invalidated);
    assert_eq!((stats.hits, stats.misses), (0, 3));
    assert_eq!(report.violations, first.violations);
}

#[test]
fn test_content_strategy_hits_on_identical_rewrite() {
    let temp = project(&["helpers.ast.json"]);
    let targets = files(&["helpers.ast.json"]);
    let file = temp.path().join("src/helpers.ast.json");
    let run = || {
        Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
            .run(&targets)
            .unwrap()
    };

    run();
    let bytes = fs::read(&file).unwrap();
    fs::write(&file, &bytes).unwrap();
    assert_eq!(run().cache.unwrap().hits, 1);

    fs::write(&file, fs::read(fixtures_path().join("clean.ast.json")).unwrap()).unwrap();
    let report = run();
    assert_eq!(report.cache.unwrap().misses, 1);
    assert!(report.violations.is_empty());
}

#[test]
fn test_timestamp_strategy_follows_mtime() {
    let temp = project(&["helpers.ast.json"]);
    let targets = files(&["helpers.ast.json"]);
    let file = temp.path().join("src/helpers.ast.json");
    let run = || {
        Analyzer::new(cached(FreshnessStrategy::Timestamp), temp.path())
            .run(&targets)
            .unwrap()
    };

    let pinned = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    fs::File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(pinned)
        .unwrap();
    let first = run();
    assert_eq!(first.violations.len(), 1);

    // Changed bytes with a preserved mtime are served from the cache
    fs::write(&file, fs::read(fixtures_path().join("clean.ast.json")).unwrap()).unwrap();
    fs::File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(pinned)
        .unwrap();
    let preserved = run();
    assert_eq!(preserved.cache.unwrap().hits, 1);
    assert_eq!(preserved.violations, first.violations);

    fs::File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(pinned + Duration::from_secs(60))
        .unwrap();
    let advanced = run();
    assert_eq!(advanced.cache.unwrap().misses, 1);
    assert!(advanced.violations.is_empty());
}

#[test]
fn test_baseline_change_invalidates_cache() {
    let temp = project(ALL);
    let targets = files(ALL);
    fs::write(temp.path().join("baseline.xml"), "<baseline/>").unwrap();

    let mut config = cached(FreshnessStrategy::Content);
    config.baseline = Some(PathBuf::from("baseline.xml"));

    let first = Analyzer::new(config.clone(), temp.path()).run(&targets).unwrap();
    assert_eq!(first.violations.len(), 2);

    fs::write(
        temp.path().join("baseline.xml"),
        r#"<baseline>
  <violation rule="DuplicatedArrayKey" file="src/service.ast.json" method="load"/>
</baseline>"#,
    )
    .unwrap();
    let second = Analyzer::new(config, temp.path()).run(&targets).unwrap();

    assert_eq!(second.cache.unwrap().hits, 0);
    assert_eq!(
        summary(&second, temp.path())
            .into_iter()
            .map(|(file, ..)| file)
            .collect::<Vec<_>>(),
        vec!["src/helpers.ast.json".to_string()]
    );
    assert_eq!(second.baseline_suppressed, 1);
}

#[test]
fn test_warm_run_keeps_baseline_suppressed_count() {
    let temp = project(ALL);
    let targets = files(ALL);
    fs::write(
        temp.path().join("baseline.xml"),
        r#"<baseline>
  <violation rule="DuplicatedArrayKey" file="src/service.ast.json" method="load"/>
</baseline>"#,
    )
    .unwrap();

    let mut config = cached(FreshnessStrategy::Content);
    config.baseline = Some(PathBuf::from("baseline.xml"));
    let run = || Analyzer::new(config.clone(), temp.path()).run(&targets).unwrap();

    let cold = run();
    let warm = run();

    assert_eq!(warm.cache.unwrap().hits, 3);
    assert_eq!(cold.baseline_suppressed, 1);
    assert_eq!(warm.baseline_suppressed, cold.baseline_suppressed);
    assert_eq!(warm.violations, cold.violations);
}

#[test]
fn test_baseline_without_file_attribute_aborts_before_analysis() {
    let temp = project(ALL);
    fs::write(
        temp.path().join("baseline.xml"),
        r#"<baseline><violation rule="DuplicatedArrayKey"/></baseline>"#,
    )
    .unwrap();
    let mut config = cached(FreshnessStrategy::Content);
    config.baseline = Some(PathBuf::from("baseline.xml"));

    let err = Analyzer::new(config, temp.path())
        .run(&files(ALL))
        .unwrap_err();

    assert!(err.to_string().contains("Missing `file` attribute"));
    assert!(!temp.path().join(".cache/messcheck.json").exists());
}

#[test]
fn test_corrupt_cache_runs_cold_with_warning() {
    let temp = project(ALL);
    fs::create_dir_all(temp.path().join(".cache")).unwrap();
    fs::write(temp.path().join(".cache/messcheck.json"), "{\"version\": 1, \"key\":").unwrap();

    let report = Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
        .run(&files(ALL))
        .unwrap();

    assert_eq!(report.violations.len(), 2);
    assert_eq!(report.cache.unwrap().misses, 3);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Corrupt cache file"));

    // The rewritten cache is valid again
    let state = ResultCacheState::load(&temp.path().join(".cache/messcheck.json")).unwrap();
    assert_eq!(state.len(), 3);
}

#[test]
fn test_parse_errors_are_reported_and_not_cached() {
    let temp = project(&["broken.ast.json", "helpers.ast.json"]);
    let targets = files(&["broken.ast.json", "helpers.ast.json"]);
    let run = || {
        Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
            .run(&targets)
            .unwrap()
    };

    let first = run();
    assert_eq!(first.errors.len(), 1);
    assert_eq!(first.violations.len(), 1);
    assert_eq!(first.exit_code(), 2);

    let second = run();
    let stats = second.cache.unwrap();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(second.errors, first.errors);
}

#[test]
fn test_persisted_cache_round_trips() {
    let temp = project(ALL);
    let cache_file = temp.path().join(".cache/messcheck.json");
    Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
        .run(&files(ALL))
        .unwrap();

    let state = ResultCacheState::load(&cache_file).unwrap();
    let resolved = temp.path().join(".cache/copy.json");
    state.persist(&resolved).unwrap();
    assert_eq!(ResultCacheState::load(&resolved).unwrap(), state);

    let service = temp.path().join("src/service.ast.json");
    let signature = messcheck::cache::freshness::signature(&service, FreshnessStrategy::Content)
        .unwrap();
    let reused = state
        .try_reuse(&service.to_string_lossy(), &signature)
        .unwrap();
    assert_eq!(reused.violations.len(), 1);
    assert_eq!(reused.violations[0].begin_line(), 10);
    assert_eq!(reused.suppressed, 0);
}

#[test]
fn test_removed_files_are_pruned() {
    let temp = project(ALL);
    let cache_file = temp.path().join(".cache/messcheck.json");
    Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
        .run(&files(ALL))
        .unwrap();

    fs::remove_file(temp.path().join("src/clean.ast.json")).unwrap();
    Analyzer::new(cached(FreshnessStrategy::Content), temp.path())
        .run(&files(&["service.ast.json"]))
        .unwrap();

    let state = ResultCacheState::load(&cache_file).unwrap();
    let mut kept: Vec<_> = state
        .files()
        .map(|file| Path::new(file).file_name().unwrap().to_string_lossy().to_string())
        .collect();
    kept.sort();
    assert_eq!(
        kept,
        vec!["helpers.ast.json".to_string(), "service.ast.json".to_string()]
    );
}
