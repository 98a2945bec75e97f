//! Integration tests for field checks and their consolidation.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use formcheck_core::{
    CheckErrorPolicy, CheckOptions, Checker, CheckerConfig, FieldKind, FieldSpec, FormError, MessageSink,
    PanelSpec, Severity, StaleCheckPolicy, StatusLevel, Verdict,
};
use serde_json::json;

use common::{delayed, erroring, panel, panicking, reject_if_empty};

fn with_sink(id: &str, panel: PanelSpec) -> (MessageSink, Arc<Checker>) {
    let sink = MessageSink::new();
    let checker = Checker::builder(id, panel)
        .messages(sink.clone())
        .build()
        .expect("checker");
    (sink, checker)
}

fn contacts_panel() -> PanelSpec {
    panel([reject_if_empty("contacts[].email")]).with_row_key("id")
}

// ============================================================================
// Single field
// ============================================================================

#[tokio::test]
async fn username_empty_then_filled() {
    let (sink, c) = with_sink("account", panel([reject_if_empty("username")]));
    let opts = CheckOptions::default();

    assert!(!c.check_field(None, "username", json!(""), &opts).await.unwrap());
    assert_eq!(c.verdict(), Verdict::new(false, StatusLevel::Invalid));
    let top = sink.most_severe().expect("an error is shown");
    assert_eq!(top.message.level, Severity::Error);
    assert_eq!(top.emitter, "account/-/username");

    assert!(c.check_field(None, "username", json!("alice"), &opts).await.unwrap());
    assert_eq!(c.verdict(), Verdict::new(true, StatusLevel::Valid));
    assert!(sink.is_empty(), "an empty result removes the field's entries");
}

#[tokio::test]
async fn warnings_make_a_field_uncomplete_but_valid() {
    let field = FieldSpec::new("nickname", FieldKind::Optional).with_check(formcheck_core::rules::recommended());
    let (sink, c) = with_sink("profile", panel([field]));

    assert!(c.check_field(None, "nickname", json!(""), &CheckOptions::default()).await.unwrap());
    assert_eq!(c.verdict(), Verdict::new(true, StatusLevel::Uncomplete));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn info_field_without_messages_shows_nothing() {
    let (_, c) = with_sink("about", panel([FieldSpec::new("notice", FieldKind::Info)]));
    assert!(c.check_field(None, "notice", json!(null), &CheckOptions::default()).await.unwrap());
    let rt = c.field_runtime(None, "notice").unwrap().unwrap();
    assert_eq!(rt.verdict(), Verdict::new(true, StatusLevel::None));
}

#[tokio::test]
async fn suppressed_messages_still_update_validity() {
    let (sink, c) = with_sink("account", panel([reject_if_empty("username")]));
    let opts = CheckOptions::default().without_messages();

    assert!(!c.check_field(None, "username", json!(""), &opts).await.unwrap());
    assert!(!c.validity());
    assert!(sink.is_empty());
}

// ============================================================================
// Failing checks
// ============================================================================

#[tokio::test]
async fn erroring_check_is_accepted_without_messages() {
    let (sink, c) = with_sink("p", panel([erroring("remote")]));
    assert!(c.check_field(None, "remote", json!("x"), &CheckOptions::default()).await.unwrap());
    assert!(c.validity());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn panicking_check_is_accepted_without_messages() {
    let (sink, c) = with_sink("p", panel([panicking("remote")]));
    assert!(c.check_field(None, "remote", json!("x"), &CheckOptions::default()).await.unwrap());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn fail_closed_turns_failures_into_errors() {
    let sink = MessageSink::new();
    let c = Checker::builder("p", panel([erroring("remote")]))
        .messages(sink.clone())
        .config(CheckerConfig {
            check_errors: CheckErrorPolicy::FailClosed,
            ..CheckerConfig::default()
        })
        .build()
        .unwrap();

    assert!(!c.check_field(None, "remote", json!("x"), &CheckOptions::default()).await.unwrap());
    let entry = sink.most_severe().unwrap();
    assert!(entry.message.text.starts_with("check failed:"), "{}", entry.message.text);
}

// ============================================================================
// Array-ed panels
// ============================================================================

#[tokio::test]
async fn one_invalid_row_invalidates_the_panel() {
    let (sink, c) = with_sink("contacts", contacts_panel());
    let opts = CheckOptions::default();

    assert!(!c.check_field(Some("r1"), "contacts[].email", json!(""), &opts).await.unwrap());
    assert!(c.check_field(Some("r2"), "contacts[].email", json!("a@b.c"), &opts).await.unwrap());
    assert_eq!(c.verdict(), Verdict::new(false, StatusLevel::Invalid));
    assert_eq!(sink.entries_for("contacts/r1/contacts[].email").len(), 1);

    assert!(c.remove_row("r1"));
    assert_eq!(c.verdict(), Verdict::new(true, StatusLevel::Valid));
    assert!(sink.is_empty(), "removing a row drops its messages");
    assert!(!c.remove_row("r1"));
}

#[tokio::test]
async fn plain_panel_row_cannot_be_removed() {
    let (sink, c) = with_sink("account", panel([reject_if_empty("username")]));
    c.check_field(None, "username", json!(""), &CheckOptions::default())
        .await
        .unwrap();

    assert!(!c.remove_row("no-such-row"));
    assert_eq!(c.verdict(), Verdict::new(false, StatusLevel::Invalid));
    assert_eq!(c.row_ids(), vec![None]);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn row_removed_while_checking_leaves_no_trace() {
    let (sink, c) = with_sink("contacts", panel([delayed("contacts[].email")]).with_row_key("id"));

    let opts = CheckOptions::default();
    let check = c.check_field(
        Some("r1"),
        "contacts[].email",
        json!({ "delay_ms": 40, "ok": false }),
        &opts,
    );
    let remove = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        c.remove_row("r1")
    };
    let (result, removed) = tokio::join!(check, remove);

    assert!(!result.unwrap(), "the field's own verdict is still reported");
    assert!(removed);
    assert!(sink.is_empty());
    assert!(c.row_ids().is_empty());
    assert_eq!(c.verdict(), Verdict::new(true, StatusLevel::None));
}

#[tokio::test]
async fn row_ids_must_not_contain_the_separator() {
    let (sink, c) = with_sink("contacts", contacts_panel());
    let opts = CheckOptions::default();

    let err = c
        .check_field(Some("r1/x"), "contacts[].email", json!(""), &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Config(_)));

    c.check_field(Some("r1"), "contacts[].email", json!(""), &opts).await.unwrap();
    assert!(!c.remove_row("r1/x"));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn row_ids_come_from_row_context() {
    let (_, c) = with_sink("contacts", contacts_panel());
    assert_eq!(c.row_id_for(&json!({ "id": 7 })).unwrap(), "7");
    assert!(c.row_id_for(&json!({ "email": "x" })).is_err());
}

// ============================================================================
// check_all
// ============================================================================

#[tokio::test]
async fn check_all_checks_unbound_fields() {
    let (sink, c) = with_sink("account", panel([reject_if_empty("username"), reject_if_empty("email")]));
    c.set_value(None, "email", json!("me@example.org")).unwrap();

    assert!(!c.check_all(&CheckOptions::default()).await);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.entries()[0].emitter, "account/-/username");
}

#[tokio::test]
async fn check_all_can_skip_a_field() {
    let (_, c) = with_sink("account", panel([reject_if_empty("username"), reject_if_empty("email")]));
    c.set_value(None, "email", json!("me@example.org")).unwrap();

    let opts = CheckOptions::default().skipping("username");
    assert!(c.check_all(&opts).await);
}

#[tokio::test]
async fn check_all_settles_every_check_even_when_some_fail() {
    let (_, c) = with_sink("p", panel([erroring("a"), panicking("b"), reject_if_empty("c")]));
    assert!(!c.check_all(&CheckOptions::default()).await);
    let report = c.report();
    assert_eq!(report.rows[0].fields.len(), 3);
}

// ============================================================================
// Concurrent checks of one field
// ============================================================================

#[tokio::test]
async fn last_completed_check_wins_by_default() {
    let (_, c) = with_sink("p", panel([delayed("slow")]));
    let opts = CheckOptions::default();

    let first = c.check_field(None, "slow", json!({ "delay_ms": 60, "ok": false }), &opts);
    let second = c.check_field(None, "slow", json!({ "delay_ms": 5, "ok": true }), &opts);
    let (a, b) = tokio::join!(first, second);

    assert!(!a.unwrap());
    assert!(b.unwrap());
    assert!(!c.validity(), "the slower, older check completed last");
}

#[tokio::test]
async fn latest_started_check_wins_when_configured() {
    let c = Checker::builder("p", panel([delayed("slow")]))
        .config(CheckerConfig {
            stale_checks: StaleCheckPolicy::LatestStarted,
            ..CheckerConfig::default()
        })
        .build()
        .unwrap();
    let opts = CheckOptions::default();

    let first = c.check_field(None, "slow", json!({ "delay_ms": 60, "ok": false }), &opts);
    let second = c.check_field(None, "slow", json!({ "delay_ms": 5, "ok": true }), &opts);
    let (a, b) = tokio::join!(first, second);

    assert!(a.unwrap(), "superseded result is dropped");
    assert!(b.unwrap());
    assert!(c.validity());
}

// ============================================================================
// Observers
// ============================================================================

#[tokio::test]
async fn listeners_never_see_half_a_verdict() {
    let (_, c) = with_sink("account", panel([reject_if_empty("username")]));
    let seen: Arc<Mutex<Vec<(bool, StatusLevel)>>> = Arc::default();

    let observer = Arc::downgrade(&c);
    let log = seen.clone();
    let id = c.on_validity_change(move |valid| {
        if let Some(c) = observer.upgrade() {
            log.lock().unwrap().push((*valid, c.status()));
        }
    });

    let opts = CheckOptions::default();
    c.check_field(None, "username", json!(""), &opts).await.unwrap();
    c.check_field(None, "username", json!("bob"), &opts).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(false, StatusLevel::Invalid), (true, StatusLevel::Valid)]
    );
    assert!(c.unsubscribe(id));
    assert!(!c.unsubscribe(id));
}

#[tokio::test]
async fn status_listener_fires_on_change_only() {
    let (_, c) = with_sink("account", panel([reject_if_empty("username")]));
    let count = Arc::new(Mutex::new(0));
    let counter = count.clone();
    c.on_status_change(move |_| *counter.lock().unwrap() += 1);

    let opts = CheckOptions::default();
    c.check_field(None, "username", json!("a"), &opts).await.unwrap();
    c.check_field(None, "username", json!("b"), &opts).await.unwrap();
    assert_eq!(*count.lock().unwrap(), 1);
}
