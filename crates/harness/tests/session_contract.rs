//! Session contract tests
//!
//! Drives sessions against scripted pages and checks the lenient behaviour
//! probes rely on: soft submit, zero-tolerant polling, ordered evidence and
//! teardown on every exit path.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::{Duration, Instant};

use futures::FutureExt;
use uiprobe_harness::driver::{DriverCall, FakeElement, ScriptedDriver, ScriptedFactory, ScriptedPage};
use uiprobe_harness::evidence::{read_manifest, MANIFEST_FILE};
use uiprobe_harness::{
    ActionOutcome, Indicator, Locator, ProbeError, ProbeRequest, ProbeStage, Selector, Session,
    Timeouts,
};

const INPUT: &str = "#prompt-textarea";
const SEND: &str = r#"button[data-testid*="send"], button[aria-label*="Send"]"#;

fn fast() -> Timeouts {
    Timeouts {
        navigation_ms: 200,
        stable_poll_ms: 1,
        stable_samples: 2,
        locate_ms: 30,
        locate_poll_ms: 1,
    }
}

fn chat_page() -> ScriptedPage {
    ScriptedPage::new()
        .with_element(FakeElement::new(INPUT).editable())
        .with_element(
            FakeElement::new(SEND)
                .with_text("Send")
                .reveals(FakeElement::text_only("Searching 12 sources")),
        )
}

fn open(page: ScriptedPage, dir: &Path) -> (Session, ScriptedDriver) {
    let driver = ScriptedDriver::new(page);
    let session = Session::new(Box::new(driver.clone()), "contract", fast(), dir);
    (session, driver)
}

fn locator(raw: &str) -> Locator {
    Locator::new(Selector::parse(raw).unwrap()).first()
}

#[tokio::test]
async fn test_fill_then_locate_reads_back_text() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _driver) = open(chat_page(), dir.path());
    let input = locator(INPUT);
    let text = "What are the latest breakthroughs in quantum computing in 2025?";

    session.navigate("https://chatgpt.com/").await.unwrap();
    let located = session.locate(&input, None).await.unwrap();
    assert_eq!(located.resolved(), 1);

    session.fill(&input, text).await.unwrap();
    assert_eq!(session.content(&input).await.unwrap().as_deref(), Some(text));
    assert_eq!(session.stage(), ProbeStage::InputFilled);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_fill_without_match_is_element_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _driver) = open(ScriptedPage::new(), dir.path());

    let err = session.fill(&locator(INPUT), "hello").await.unwrap_err();
    assert!(matches!(err, ProbeError::ElementNotFound(_)));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_submit_absent_control_is_soft() {
    let dir = tempfile::tempdir().unwrap();
    let page = ScriptedPage::new().with_element(FakeElement::new(INPUT).editable());
    let (mut session, driver) = open(page, dir.path());

    session.navigate("https://chatgpt.com/").await.unwrap();
    session.fill(&locator(INPUT), "hello").await.unwrap();
    let outcome = session.submit(&locator(SEND)).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Absent);
    assert_eq!(session.stage(), ProbeStage::Skipped);
    assert_eq!(driver.page().lock().clicks_on(SEND), 0);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_submit_disabled_control_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let page = ScriptedPage::new()
        .with_element(FakeElement::new(INPUT).editable())
        .with_element(FakeElement::new(SEND).disabled());
    let (mut session, driver) = open(page, dir.path());

    let outcome = session.submit(&locator(SEND)).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Skipped);
    assert_eq!(driver.page().lock().clicks_on(SEND), 0);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_submit_clicks_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, driver) = open(chat_page(), dir.path());

    let outcome = session.submit(&locator(SEND)).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Acted);
    assert_eq!(session.stage(), ProbeStage::Submitted);
    assert_eq!(driver.page().lock().clicks_on(SEND), 1);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_poll_empty_indicator_set() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _driver) = open(chat_page(), dir.path());

    let report = session.poll_indicators(&[], Duration::ZERO).await.unwrap();

    assert!(report.indicators.is_empty());
    assert_eq!(report.total(), 0);
    assert_eq!(report.count("research"), 0);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_poll_counts_each_locale() {
    let dir = tempfile::tempdir().unwrap();
    let page = chat_page().with_element(FakeElement::text_only("Поиск источников"));
    let (mut session, _driver) = open(page, dir.path());
    let research = Indicator::new("research")
        .variant("en", "searching|sources|researching")
        .variant("ru", "поиск|источник");
    let thinking = Indicator::new("thinking").variant("en", "thinking|reasoning|analyzing");

    session.submit(&locator(SEND)).await.unwrap();
    let report = session
        .poll_indicators(&[research, thinking], Duration::from_millis(5))
        .await
        .unwrap();

    let counted = report.get("research").unwrap();
    assert_eq!(counted.breakdown(), "EN: 1, RU: 1");
    assert_eq!(report.count("research"), 2);
    assert_eq!(report.count("thinking"), 0);
    assert_eq!(report.waited_ms, 5);
    assert_eq!(session.stage(), ProbeStage::IndicatorsPolled);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_poll_counts_failing_variant_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    let page = chat_page()
        .with_element(FakeElement::text_only("Thinking about it"))
        .failing_count("text=/думаю|рассуждаю/i");
    let (mut session, _driver) = open(page, dir.path());
    let thinking = Indicator::new("thinking")
        .variant("en", "thinking|reasoning")
        .variant("ru", "думаю|рассуждаю");

    let report = session
        .poll_indicators(&[thinking], Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(report.get("thinking").unwrap().breakdown(), "EN: 1, RU: 0");
    assert_eq!(report.count("thinking"), 1);
    assert_eq!(session.stage(), ProbeStage::IndicatorsPolled);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_locate_reports_zero_when_counting_fails() {
    let dir = tempfile::tempdir().unwrap();
    let page = chat_page().failing_count(INPUT);
    let (mut session, _driver) = open(page, dir.path());

    let located = session.locate(&locator(INPUT), None).await.unwrap();

    assert_eq!(located.count, 0);
    assert!(!located.is_present());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_locate_gives_up_on_a_stalled_page() {
    let dir = tempfile::tempdir().unwrap();
    let page = chat_page().slow(Duration::from_secs(5));
    let (mut session, _driver) = open(page, dir.path());

    let started = Instant::now();
    let located = session
        .locate(&locator(INPUT), Some(Duration::from_millis(20)))
        .await
        .unwrap();

    assert_eq!(located.count, 0);
    assert!(started.elapsed() < Duration::from_secs(2));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_stalled_metrics_respect_navigation_limit() {
    let dir = tempfile::tempdir().unwrap();
    let page = chat_page().slow(Duration::from_secs(5));
    let (mut session, _driver) = open(page, dir.path());

    let started = Instant::now();
    let err = session.navigate("https://chatgpt.com/").await.unwrap_err();

    assert!(matches!(err, ProbeError::Navigation { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.stage(), ProbeStage::NotNavigated);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_capture_twice_gives_ordered_records() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _driver) = open(chat_page(), dir.path());

    let first = session.capture("thinking_query").await.unwrap();
    let second = session.capture("thinking_active").await.unwrap();

    assert_eq!((first.seq, second.seq), (1, 2));
    assert_ne!(first.path, second.path);
    assert!(first.path.ends_with("01_thinking_query.png"));
    assert!(second.path.ends_with("02_thinking_active.png"));
    assert_eq!(session.evidence().len(), 2);

    session.close().await.unwrap();

    let manifest = read_manifest(&dir.path().join(MANIFEST_FILE)).unwrap();
    let labels: Vec<_> = manifest.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["thinking_query", "thinking_active"]);
}

#[tokio::test]
async fn test_unstable_page_is_navigation_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _driver) = open(chat_page().never_stable(), dir.path());

    let err = session.navigate("https://chatgpt.com/").await.unwrap_err();

    assert!(matches!(err, ProbeError::Navigation { .. }));
    assert_eq!(session.stage(), ProbeStage::NotNavigated);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_load_is_navigation_error() {
    let dir = tempfile::tempdir().unwrap();
    let page = chat_page().failing_navigation("net::ERR_NAME_NOT_RESOLVED");
    let (mut session, _driver) = open(page, dir.path());

    match session.navigate("https://chatgpt.invalid/").await {
        Err(ProbeError::Navigation { url, reason }) => {
            assert_eq!(url, "https://chatgpt.invalid/");
            assert!(reason.contains("ERR_NAME_NOT_RESOLVED"));
        }
        other => panic!("expected navigation error, got {:?}", other),
    }

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_operations_after_close_fail() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, driver) = open(chat_page(), dir.path());

    session.close().await.unwrap();
    assert!(driver.page().lock().is_closed());

    assert!(matches!(
        session.capture("late").await,
        Err(ProbeError::SessionClosed)
    ));
    assert!(matches!(
        session.navigate("https://chatgpt.com/").await,
        Err(ProbeError::SessionClosed)
    ));
    assert!(matches!(
        session.submit(&locator(SEND)).await,
        Err(ProbeError::SessionClosed)
    ));
    assert!(matches!(
        session.poll_indicators(&[], Duration::ZERO).await,
        Err(ProbeError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_probe_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, driver) = open(chat_page(), dir.path());
    let request = ProbeRequest::new(
        "https://chatgpt.com/",
        "Think step by step",
        Selector::css(INPUT),
        Selector::css(SEND),
    )
    .with_query("model", "gpt-5-thinking");

    let outcome = session.probe(&request).await.unwrap();

    assert_eq!(outcome.input_matches, 1);
    assert_eq!(outcome.submit, ActionOutcome::Acted);

    let page = driver.page();
    let page = page.lock();
    assert_eq!(page.url(), Some("https://chatgpt.com/?model=gpt-5-thinking"));
    let calls: Vec<_> = page
        .calls()
        .iter()
        .filter(|c| !matches!(c, DriverCall::Screenshot))
        .cloned()
        .collect();
    assert_eq!(
        calls,
        vec![
            DriverCall::Goto("https://chatgpt.com/?model=gpt-5-thinking".to_string()),
            DriverCall::Fill {
                selector: INPUT.to_string(),
                text: "Think step by step".to_string(),
            },
            DriverCall::Click(SEND.to_string()),
        ]
    );
    drop(page);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_scoped_closes_after_error() {
    let dir = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::new(chat_page);

    let report = Session::scoped(&factory, "scoped", fast(), dir.path(), |session| {
        Box::pin(async move {
            session.navigate("https://chatgpt.com/").await?;
            session.capture("before_failure").await?;
            session.fill(&locator("#missing"), "x").await
        })
    })
    .await
    .unwrap();

    assert!(matches!(report.outcome, Err(ProbeError::ElementNotFound(_))));
    assert_eq!(report.stage, ProbeStage::Navigated);
    assert_eq!(report.evidence.len(), 1);

    let launched = factory.launched();
    assert_eq!(launched.len(), 1);
    assert!(launched[0].lock().is_closed());
    assert!(dir.path().join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn test_scoped_closes_after_panic() {
    let dir = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::new(chat_page);

    let result = AssertUnwindSafe(Session::scoped(
        &factory,
        "panicking",
        fast(),
        dir.path(),
        |session| {
            Box::pin(async move {
                session.navigate("https://chatgpt.com/").await?;
                if session.stage() == ProbeStage::Navigated {
                    panic!("probe body blew up");
                }
                Ok(())
            })
        },
    ))
    .catch_unwind()
    .await;

    assert!(result.is_err());
    assert!(factory.launched()[0].lock().is_closed());
}

#[tokio::test]
async fn test_scoped_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let factory = ScriptedFactory::failing("no browser installed");

    let result = Session::scoped(&factory, "nobrowser", fast(), dir.path(), |session| {
        Box::pin(async move { session.navigate("https://chatgpt.com/").await })
    })
    .await;

    assert!(matches!(result, Err(ProbeError::BrowserLaunch(_))));
}
