//! Probe scenarios
//!
//! Runs the probe specs shipped in `probes/` through the runner against a
//! scripted chat page. The live versions at the bottom need a Chromium
//! install and network access and are ignored by default.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uiprobe_harness::driver::{DriverCall, FakeElement, ScriptedFactory, ScriptedPage};
use uiprobe_harness::runner::RESULTS_FILE;
use uiprobe_harness::{
    ActionOutcome, ChromiumFactory, ProbeConfig, ProbeRunner, ProbeSpec, ProbeStage, ProbeVerdict,
    RunnerConfig, SuiteResult, Timeouts,
};

const SEND: &str = r#"button[data-testid*="send"], button[aria-label*="Send"]"#;
const MENU: &str = r#"[data-testid="composer-plus-btn"]"#;

fn probes_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../probes")
}

fn load(name: &str) -> ProbeSpec {
    let mut spec = ProbeSpec::from_file(&probes_dir().join(name)).unwrap();
    spec.indicator_wait_ms = 5;
    spec
}

fn fast() -> Timeouts {
    Timeouts {
        navigation_ms: 500,
        stable_poll_ms: 1,
        stable_samples: 2,
        locate_ms: 30,
        locate_poll_ms: 1,
    }
}

/// Composer with the input, a send button and the tools menu
fn chat_page(after_send: &str) -> ScriptedPage {
    ScriptedPage::new()
        .with_element(
            FakeElement::new("#prompt-textarea")
                .also_matches(r#"div[contenteditable="true"]"#)
                .editable(),
        )
        .with_element(
            FakeElement::new(SEND)
                .with_text("Send prompt")
                .reveals(FakeElement::text_only(after_send)),
        )
        .with_element(
            FakeElement::new(MENU)
                .with_text("+")
                .reveals(FakeElement::text_only("Deep research")),
        )
}

fn runner(factory: Arc<ScriptedFactory>, out: &Path) -> ProbeRunner {
    ProbeRunner::new(
        factory,
        RunnerConfig {
            specs_path: probes_dir(),
            output_dir: out.to_path_buf(),
            timeouts: fast(),
            concurrency: 2,
        },
    )
}

fn labels(spec: &uiprobe_harness::ProbeReport) -> Vec<&str> {
    spec.evidence.iter().map(|r| r.label.as_str()).collect()
}

#[test]
fn test_repository_probes_parse() {
    let specs = ProbeSpec::load_all(&probes_dir()).unwrap();
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "deep-research-activation",
            "deep-research-keyword",
            "implementation-notes",
            "think-longer-automatic",
        ]
    );

    let documentation: Vec<_> = specs.iter().filter(|s| s.is_documentation()).collect();
    assert_eq!(documentation.len(), 1);
    assert_eq!(ProbeSpec::filter_by_tag(&specs, "ui_dependent").len(), 3);
}

#[tokio::test]
async fn test_deep_research_via_menu() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| chat_page("Researching 8 sources")));
    let runner = runner(factory.clone(), out.path());

    let report = runner.run_spec(&load("deep_research.yaml")).await.unwrap();

    assert_eq!(report.verdict, ProbeVerdict::Passed, "{:?}", report.error);
    assert_eq!(report.activated, Some(true));
    assert_eq!(report.input_matches, Some(1));
    assert_eq!(report.submit, Some(ActionOutcome::Acted));
    assert_eq!(report.indicators.count("research"), 1);
    assert_eq!(report.stage, ProbeStage::EvidenceCaptured);
    assert_eq!(
        labels(&report),
        vec!["deep_research_enabled", "research_query", "deep_research_active"]
    );
    for record in &report.evidence {
        assert!(record.path.starts_with(runner.run_dir().join("deep-research-activation")));
        assert!(record.path.exists());
    }

    let page = factory.launched()[0].clone();
    let page = page.lock();
    assert_eq!(page.url(), Some("https://chatgpt.com/?model=gpt-5-pro"));
    assert_eq!(page.clicks_on(MENU), 1);
    assert_eq!(page.clicks_on(SEND), 1);
    assert!(page.is_closed());
}

#[tokio::test]
async fn test_deep_research_fails_without_menu() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| {
        ScriptedPage::new()
            .with_element(FakeElement::new("#prompt-textarea").editable())
            .with_element(FakeElement::new(SEND))
    }));
    let runner = runner(factory.clone(), out.path());

    let report = runner.run_spec(&load("deep_research.yaml")).await.unwrap();

    assert_eq!(report.verdict, ProbeVerdict::Failed);
    assert_eq!(report.stage, ProbeStage::Navigated);
    assert!(report.error.as_deref().unwrap().contains("activation"));
    assert_eq!(labels(&report), vec!["deep_research_enabled"]);
    assert_eq!(factory.launched()[0].lock().clicks_on(SEND), 0);
    assert!(factory.launched()[0].lock().is_closed());
}

#[tokio::test]
async fn test_deep_research_keyword_prefix() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| chat_page("Поиск источников")));
    let runner = runner(factory.clone(), out.path());

    let report = runner.run_spec(&load("deep_research_keyword.yaml")).await.unwrap();

    assert_eq!(report.verdict, ProbeVerdict::Passed, "{:?}", report.error);
    assert_eq!(report.activated, Some(true));
    assert_eq!(
        report.indicators.get("research").unwrap().breakdown(),
        "EN: 0, RU: 1"
    );

    let page = factory.launched()[0].clone();
    let filled: Vec<_> = page
        .lock()
        .calls()
        .iter()
        .filter_map(|c| match c {
            DriverCall::Fill { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        filled,
        vec!["Deep research: What are the latest breakthroughs in quantum computing in 2025?"]
    );
}

#[tokio::test]
async fn test_think_longer_passes_without_indicators() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| chat_page("")));
    let runner = runner(factory.clone(), out.path());

    let report = runner.run_spec(&load("think_longer.yaml")).await.unwrap();

    assert_eq!(report.verdict, ProbeVerdict::Passed, "{:?}", report.error);
    assert_eq!(report.activated, Some(true));
    assert_eq!(report.submit, Some(ActionOutcome::Acted));
    assert_eq!(report.indicators.count("thinking"), 0);
    assert_eq!(report.indicators.indicators.len(), 1);
    assert_eq!(labels(&report), vec!["thinking_query", "thinking_active"]);
    assert!(report.evidence[0].path.ends_with("01_thinking_query.png"));

    let page = factory.launched()[0].clone();
    assert_eq!(
        page.lock().url(),
        Some("https://chatgpt.com/?model=gpt-5-thinking")
    );
}

#[tokio::test]
async fn test_disabled_send_skips_polling() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| {
        ScriptedPage::new()
            .with_element(FakeElement::new(r#"div[contenteditable="true"]"#).editable())
            .with_element(FakeElement::new(SEND).disabled())
    }));
    let runner = runner(factory.clone(), out.path());

    let report = runner.run_spec(&load("think_longer.yaml")).await.unwrap();

    assert_eq!(report.verdict, ProbeVerdict::Passed);
    assert_eq!(report.submit, Some(ActionOutcome::Skipped));
    assert!(report.indicators.indicators.is_empty());
    assert_eq!(report.stage, ProbeStage::EvidenceCaptured);
    assert_eq!(factory.launched()[0].lock().clicks_on(SEND), 0);
}

#[tokio::test]
async fn test_missing_input_fails_probe() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| {
        ScriptedPage::new().with_element(FakeElement::new(SEND))
    }));
    let runner = runner(factory.clone(), out.path());

    let report = runner.run_spec(&load("think_longer.yaml")).await.unwrap();

    assert_eq!(report.verdict, ProbeVerdict::Failed);
    assert!(report.error.as_deref().unwrap().contains("input field"));
    assert_eq!(report.submit.as_ref(), None);
    assert!(factory.launched()[0].lock().is_closed());
}

#[tokio::test]
async fn test_documentation_probe_needs_no_browser() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| chat_page("")));
    let runner = runner(factory.clone(), out.path());

    let report = runner.run_spec(&load("implementation_notes.yaml")).await.unwrap();

    assert_eq!(report.verdict, ProbeVerdict::Documented);
    assert!(report.success());
    assert!(factory.launched().is_empty());
}

#[tokio::test]
async fn test_suite_keeps_order_and_writes_results() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| chat_page("Searching")));
    let runner = runner(factory.clone(), out.path());

    let mut specs = ProbeSpec::load_all(&probes_dir()).unwrap();
    for spec in &mut specs {
        spec.indicator_wait_ms = 5;
    }
    let suite = runner.run_specs(&specs).await.unwrap();

    let names: Vec<_> = suite.results.iter().map(|r| r.name.as_str()).collect();
    let expected: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, expected);
    assert_eq!((suite.total, suite.passed, suite.documented), (4, 3, 1));
    assert_eq!(suite.exit_code(), 0);
    assert_eq!(factory.launched().len(), 3);
    assert!(factory.launched().iter().all(|p| p.lock().is_closed()));

    let path = runner.write_results(&suite).unwrap();
    assert_eq!(path, runner.run_dir().join(RESULTS_FILE));
    let written: SuiteResult =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written.total, 4);
    assert_eq!(written.results[0].evidence.len(), 3);
}

#[tokio::test]
async fn test_clashing_artifact_dirs_rejected_before_launch() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| chat_page("")));
    let runner = runner(factory.clone(), out.path());

    let mut spaced = load("think_longer.yaml");
    spaced.name = "think longer".to_string();
    let mut underscored = load("think_longer.yaml");
    underscored.name = "think_longer".to_string();
    assert_eq!(spaced.dir_name(), underscored.dir_name());

    assert!(runner.run_specs(&[spaced, underscored]).await.is_err());
    assert!(factory.launched().is_empty());
}

#[tokio::test]
async fn test_launch_failure_is_harness_error() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::failing("chrome not found"));
    let runner = runner(factory, out.path());

    let suite = runner
        .run_specs(&[load("think_longer.yaml"), load("implementation_notes.yaml")])
        .await
        .unwrap();

    assert_eq!(suite.errored, 1);
    assert_eq!(suite.documented, 1);
    assert_eq!(suite.results[0].verdict, ProbeVerdict::Errored);
    assert!(suite.results[0].error.as_deref().unwrap().contains("chrome not found"));
    assert_eq!(suite.exit_code(), 2);
}

#[tokio::test]
async fn test_run_tagged_and_named() {
    let out = tempfile::tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(|| chat_page("")));
    let runner = runner(factory, out.path());

    let suite = runner.run_tagged("documentation").await.unwrap();
    assert_eq!(suite.total, 1);
    assert_eq!(suite.documented, 1);

    let report = runner.run_named("implementation-notes").await.unwrap();
    assert_eq!(report.verdict, ProbeVerdict::Documented);

    assert!(runner.run_named("no-such-probe").await.is_err());
}

fn live_runner(out: &Path) -> ProbeRunner {
    let config = ProbeConfig::default();
    ProbeRunner::new(
        Arc::new(ChromiumFactory::new(config.browser.clone())),
        RunnerConfig {
            output_dir: out.to_path_buf(),
            ..RunnerConfig::from_probe_config(&config, probes_dir())
        },
    )
}

#[tokio::test]
#[ignore = "needs Chromium and network access to chatgpt.com"]
async fn live_deep_research_activation() {
    let out = tempfile::tempdir().unwrap();
    let report = live_runner(out.path())
        .run_named("deep-research-activation")
        .await
        .unwrap();
    assert_ne!(report.verdict, ProbeVerdict::Errored, "{:?}", report.error);
}

#[tokio::test]
#[ignore = "needs Chromium and network access to chatgpt.com"]
async fn live_think_longer_automatic() {
    let out = tempfile::tempdir().unwrap();
    let report = live_runner(out.path())
        .run_named("think-longer-automatic")
        .await
        .unwrap();
    assert_ne!(report.verdict, ProbeVerdict::Errored, "{:?}", report.error);
}
