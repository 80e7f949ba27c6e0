//! Whole-suite runs with a shell-script "compiler": test sources are shell
//! scripts, compiling and linking copy them, and execution is native.

use std::{path::Path, sync::Arc};

use rivalbench_core::{
    config::{Config, ExecutionMode},
    driver::Driver,
    executor,
    orchestrator::{self, Mode, Summary},
    rival::RivalCache,
    template::CommandTemplate,
    testing::{TestCase, Verdict},
};

struct Suite {
    root: tempfile::TempDir,
}

impl Suite {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn dir(&self) -> std::path::PathBuf {
        self.root.path().join("functional")
    }

    fn add(&self, name: &str, script: &str, input: Option<&str>, answer: &str) {
        let dir = self.dir();
        fsutil::write_with_mkdir(dir.join(format!("{}.sy", name)), format!("#!/bin/sh\n{}\n", script))
            .unwrap();
        fsutil::write(dir.join(format!("{}.out", name)), answer).unwrap();
        if let Some(input) = input {
            fsutil::write(dir.join(format!("{}.in", name)), input).unwrap();
        }
    }

    fn config(&self) -> Config {
        let mut cfg = Config::default();
        cfg.bench.testcases = self.dir();
        cfg.bench.tempdir = self.root.path().join("build");
        cfg.bench.timeout_secs = 3;
        cfg.candidate.command = CommandTemplate::parse("cp {source} {output}").unwrap();
        cfg.toolchain.link =
            CommandTemplate::parse("cp {input} {output} && chmod +x {output}").unwrap();
        cfg.toolchain.execution = ExecutionMode::Native;
        cfg.rival.name = "fakecc".into();
        cfg.rival.dir = self.root.path().join("rivals");
        cfg.rival.generic_command = CommandTemplate::parse("cp {source} {output}").unwrap();
        cfg
    }
}

async fn run(cfg: Config, mode: Mode) -> (Summary, Arc<RivalCache>) {
    cfg.validate().unwrap();
    fsutil::reset_dir(&cfg.bench.tempdir).unwrap();
    let testcases = TestCase::enumerate(&cfg.bench.testcases, &cfg.bench.source_ext).unwrap();

    let cache = Arc::new(RivalCache::load(cfg.rival_cache_file(), cfg.suite_key()).unwrap());
    let cfg = Arc::new(cfg);
    let exe = executor::from_config(Arc::clone(&cfg)).unwrap();
    let driver = Driver::new(Arc::clone(&cfg), Arc::clone(&exe), Arc::clone(&cache));

    let mut seen = vec![];
    let summary = orchestrator::run_all(&driver, testcases, mode, |r| seen.push(r.name.clone()))
        .await
        .unwrap();
    exe.finish().await;

    assert_eq!(seen.len(), summary.reports.len());
    (summary, cache)
}

fn failure_names(summary: &Summary) -> Vec<&str> {
    summary.failures.iter().map(|r| r.name.as_str()).collect()
}

#[tokio::test]
async fn one_pass_one_fail() {
    let suite = Suite::new();
    suite.add("a_pass", "read x; echo $((x + 1))", Some("41\n"), "42\n0\n");
    suite.add("b_fail", "echo 41", None, "42\n0\n");

    for mode in [Mode::Sequential, Mode::Parallel { workers: 2 }] {
        let (summary, _) = run(suite.config(), mode).await;
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(failure_names(&summary), ["b_fail"]);
        assert!(!summary.all_passed());
    }
}

#[tokio::test]
async fn parallel_run_sorts_failures() {
    let suite = Suite::new();
    for i in 0..12 {
        if i % 3 == 0 {
            suite.add(&format!("t{:02}", i), "exit 5", None, "0\n");
        } else {
            suite.add(&format!("t{:02}", i), "echo hi", None, "hi\n0\n");
        }
    }

    let (summary, _) = run(suite.config(), Mode::Parallel { workers: 4 }).await;
    assert_eq!(summary.reports.len(), 12);
    assert_eq!(failure_names(&summary), ["t00", "t03", "t06", "t09"]);
    for failure in &summary.failures {
        assert_eq!(failure.verdict, Verdict::WrongAnswer);
    }
}

#[tokio::test]
async fn malformed_answer_aborts_the_run() {
    let suite = Suite::new();
    suite.add("a", "echo 1", None, "1\n0\n");
    suite.add("b", "echo 1", None, "1\nnot-a-number\n");

    for mode in [Mode::Sequential, Mode::Parallel { workers: 2 }] {
        let cfg = suite.config();
        fsutil::reset_dir(&cfg.bench.tempdir).unwrap();
        let testcases = TestCase::enumerate(&cfg.bench.testcases, "sy").unwrap();
        let cfg = Arc::new(cfg);
        let exe = executor::from_config(Arc::clone(&cfg)).unwrap();
        let driver = Driver::new(cfg, exe, Arc::new(RivalCache::new("s")));

        let err = orchestrator::run_all(&driver, testcases, mode, |_| ())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Test `b` aborted"), "{:#}", err);
    }
}

#[tokio::test]
async fn benchmark_scores_against_rival() {
    let suite = Suite::new();
    suite.add("fast", "echo ok", None, "ok\n0\n");

    let mut cfg = suite.config();
    cfg.bench.benchmark = true;
    cfg.bench.rounds = 2;
    let (summary, cache) = run(cfg, Mode::Sequential).await;

    assert!(summary.all_passed());
    let scores = summary.scores();
    assert_eq!(scores.len(), 1);
    assert!(scores[0].score > 0.0 && scores[0].score <= 100.0);
    assert!(cache.get("fast").is_some());
}

#[tokio::test]
async fn rival_failure_keeps_test_passing() {
    let suite = Suite::new();
    suite.add("t", "echo ok", None, "ok\n0\n");

    let mut cfg = suite.config();
    cfg.bench.benchmark = true;
    cfg.rival.generic_command = CommandTemplate::parse("exit 1").unwrap();
    let (summary, _) = run(cfg, Mode::Sequential).await;

    assert!(summary.all_passed());
    assert!(matches!(summary.reports[0].verdict, Verdict::RivalFailed(_)));
    assert!(summary.scores().is_empty());
}

#[tokio::test]
async fn store_time_twice_overwrites_sidecar() {
    let suite = Suite::new();
    suite.add("a", "echo 1", None, "1\n0\n");
    suite.add("b", "echo 2", None, "2\n0\n");

    let mut cfg = suite.config();
    cfg.bench.benchmark = true;
    cfg.bench.store_time = true;
    let sidecar = cfg.rival_cache_file();
    assert!(!Path::new(&sidecar).exists());

    for _ in 0..2 {
        let (_, cache) = run(cfg.clone(), Mode::Parallel { workers: 2 }).await;
        cache.persist(&sidecar).unwrap();
    }

    let file: rivalbench_core::rival::cache::CacheFile =
        fsutil::read_json_with_deserialize(&sidecar).unwrap();
    assert_eq!(file.len(), 1);
    let times = &file[&cfg.suite_key()];
    assert_eq!(times.keys().collect::<Vec<_>>(), ["a", "b"]);
}

#[tokio::test]
async fn cached_rival_time_is_reused() {
    let suite = Suite::new();
    suite.add("a", "echo 1", None, "1\n0\n");

    let mut cfg = suite.config();
    cfg.bench.benchmark = true;
    let sidecar = cfg.rival_cache_file();
    fsutil::write_with_mkdir(
        &sidecar,
        format!(r#"{{"{}": {{"a": 1000000.0}}}}"#, cfg.suite_key().replace('\\', "\\\\")),
    )
    .unwrap();
    // The rival would fail if it were compiled, so a score proves the cache was used.
    cfg.rival.generic_command = CommandTemplate::parse("exit 1").unwrap();

    let (summary, _) = run(cfg, Mode::Sequential).await;
    assert_eq!(summary.scores()[0].score, 100.0);
}
