//! Launch-time identity resolution: how URL parameters and token
//! findings place a session at its starting phase, and how stored
//! snapshots are resumed or discarded.

mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use chrono::Utc;

use common::*;
use fieldwork_core::snapshot::SNAPSHOT_TTL_MS;
use fieldwork_core::{
    AccessMode, Identity, LaunchParams, SessionPhase, SessionSnapshot, SnapshotScope,
};
use fieldwork_events::bus::names;
use fieldwork_platform::types::{
    EncryptedLinkValidation, GeneratedLinkData, GeneratedLinkValidation, SavedProgress,
};
use fieldwork_session::EngineError;
use fieldwork_store::SnapshotRepo;

// -- launch parameters --

#[tokio::test]
async fn bare_launch_waits_at_registration() {
    let harness = Harness::new(survey());
    let engine = harness.launch(&LaunchParams::from_query("")).await;

    assert_eq!(engine.state().phase, SessionPhase::Registration);
    assert_eq!(engine.state().access_mode, AccessMode::Registration);
    assert_eq!(engine.scope(), SnapshotScope::PerTab);
}

#[tokio::test]
async fn anonymous_mode_synthesizes_a_pseudonymous_identity() {
    let harness = Harness::new(survey());
    let engine = harness.launch(&anonymous_params()).await;

    assert_eq!(engine.state().phase, SessionPhase::AnonymousGate);
    assert_eq!(engine.state().access_mode, AccessMode::Anonymous);
    assert_eq!(engine.scope(), SnapshotScope::Shared);

    let identity = &engine.state().identity;
    assert!(identity.is_anonymous);
    assert!(identity.name.starts_with("Anonymous_"));
    assert!(identity.email.ends_with("@anonymous.local"));
}

#[tokio::test]
async fn preview_flag_enters_the_preview_gate() {
    let harness = Harness::new(survey());
    let engine = harness.launch(&LaunchParams::from_query("preview=true")).await;

    assert_eq!(engine.state().phase, SessionPhase::PreviewGate);
    assert_eq!(engine.state().access_mode, AccessMode::Preview);
    assert_eq!(engine.state().identity.name, "Preview");
}

// -- participant tokens --

#[tokio::test]
async fn resolved_participant_token_auto_advances() {
    let harness = Harness::new(survey());
    *harness.gateway.token_validation.lock().unwrap() = Some(full_participant_token("p-1"));

    let engine = harness.launch(&token_params("tok-abc")).await;

    assert_eq!(engine.state().phase, SessionPhase::InProgress);
    assert_eq!(engine.state().access_mode, AccessMode::Token);
    assert_eq!(engine.state().identity.participant_id.as_deref(), Some("p-1"));
    assert_eq!(engine.state().identity.name, "Ada Lovelace");
    // Token sessions never register; the participant is already known.
    assert!(harness.gateway.register_requests.lock().unwrap().is_empty());

    let stored = SnapshotRepo::load(harness.store.as_ref(), SnapshotScope::Shared, QUESTIONNAIRE_ID)
        .unwrap()
        .expect("snapshot persisted");
    assert_eq!(stored.phase, SessionPhase::InProgress);
}

#[tokio::test]
async fn token_missing_contact_details_waits_at_the_gate() {
    let harness = Harness::new(survey());
    let mut validation = full_participant_token("p-2");
    validation.participant.as_mut().unwrap().email = None;
    *harness.gateway.token_validation.lock().unwrap() = Some(validation);

    let mut engine = harness.launch(&token_params("tok-partial")).await;
    assert_eq!(engine.state().phase, SessionPhase::TokenGate);

    engine.begin().await.unwrap();
    assert_eq!(engine.state().phase, SessionPhase::InProgress);
}

#[tokio::test]
async fn completed_token_short_circuits_to_already_completed() {
    let harness = Harness::new(survey());
    let mut validation = full_participant_token("p-3");
    validation.already_completed = true;
    *harness.gateway.token_validation.lock().unwrap() = Some(validation);

    let engine = harness.launch(&token_params("tok-done")).await;

    assert_eq!(engine.state().phase, SessionPhase::AlreadyCompleted);
    assert!(engine.state().submitted);
}

#[tokio::test]
async fn unrecognized_token_degrades_to_registration() {
    let harness = Harness::new(survey());
    let engine = harness.launch(&token_params("tok-bogus")).await;

    assert_eq!(engine.state().phase, SessionPhase::Registration);
    assert_eq!(engine.state().access_mode, AccessMode::Registration);
}

#[tokio::test]
async fn token_endpoint_failure_degrades_to_registration() {
    let harness = Harness::new(survey());
    harness
        .gateway
        .fail_token_validation
        .store(true, Ordering::SeqCst);

    let engine = harness.launch(&token_params("tok-unreachable")).await;

    assert_eq!(engine.state().phase, SessionPhase::Registration);
}

#[tokio::test]
async fn server_side_progress_is_adopted_on_token_entry() {
    let harness = Harness::new(survey());
    *harness.gateway.token_validation.lock().unwrap() = Some(full_participant_token("p-1"));
    *harness.gateway.saved_progress.lock().unwrap() = Some(SavedProgress {
        has_progress: true,
        response_id: Some("resp-44".to_string()),
        answers: [("q1".to_string(), text("from the server"))].into(),
        last_saved_at: None,
        started_at: None,
    });

    let engine = harness.launch(&token_params("tok-abc")).await;

    assert_eq!(engine.state().phase, SessionPhase::InProgress);
    assert_eq!(engine.state().answers.get("q1"), Some(&text("from the server")));
    assert_eq!(engine.state().response_id.as_deref(), Some("resp-44"));
}

// -- generated and encrypted links --

#[tokio::test]
async fn registration_link_carries_its_tag_into_the_form() {
    let harness = Harness::new(survey());
    *harness.gateway.generated_link.lock().unwrap() = Some(GeneratedLinkValidation {
        valid: true,
        data: Some(GeneratedLinkData {
            activity_id: Some(QUESTIONNAIRE_ID.to_string()),
            tag: "spring-cohort".to_string(),
            link_type: "registration".to_string(),
            status: None,
        }),
        message: None,
    });

    let engine = harness
        .launch(&LaunchParams::from_query("gltoken=gl-reg-1&type=registration"))
        .await;

    assert_eq!(engine.state().phase, SessionPhase::Registration);
    assert_eq!(engine.state().identity.link_tag.as_deref(), Some("spring-cohort"));
}

#[tokio::test]
async fn anonymous_link_skips_registration() {
    let harness = Harness::new(survey());
    *harness.gateway.generated_link.lock().unwrap() = Some(GeneratedLinkValidation {
        valid: true,
        data: Some(GeneratedLinkData {
            activity_id: None,
            tag: "kiosk-3".to_string(),
            link_type: "anonymous".to_string(),
            status: None,
        }),
        message: None,
    });

    let engine = harness
        .launch(&LaunchParams::from_query("gltoken=gl-anon-1"))
        .await;

    assert_eq!(engine.state().phase, SessionPhase::AnonymousGate);
    assert!(engine.state().identity.is_anonymous);
    assert_eq!(engine.state().identity.link_tag.as_deref(), Some("kiosk-3"));
}

#[tokio::test]
async fn encrypted_preview_token_enters_the_preview_gate() {
    let harness = Harness::new(survey());
    *harness.gateway.encrypted_link.lock().unwrap() = Some(EncryptedLinkValidation {
        link_type: Some("preview".to_string()),
    });

    let engine = harness.launch(&token_params(&"x".repeat(128))).await;

    assert_eq!(engine.state().phase, SessionPhase::PreviewGate);
    assert_eq!(engine.state().access_mode, AccessMode::Preview);
}

#[tokio::test]
async fn encrypted_anonymous_token_enters_the_anonymous_gate() {
    let harness = Harness::new(survey());
    *harness.gateway.encrypted_link.lock().unwrap() = Some(EncryptedLinkValidation {
        link_type: Some("anonymous".to_string()),
    });

    let engine = harness.launch(&token_params(&"y".repeat(128))).await;

    assert_eq!(engine.state().phase, SessionPhase::AnonymousGate);
    assert!(engine.state().identity.is_anonymous);
}

// -- languages --

#[tokio::test]
async fn language_choice_suppresses_token_auto_advance() {
    let mut questionnaire = survey();
    questionnaire.settings.languages = vec!["en".to_string(), "fr".to_string()];
    let harness = Harness::new(questionnaire);
    *harness.gateway.token_validation.lock().unwrap() = Some(full_participant_token("p-1"));

    let mut engine = harness.launch(&token_params("tok-abc")).await;
    assert_eq!(engine.state().phase, SessionPhase::TokenGate);

    let err = engine.begin().await.unwrap_err();
    assert_matches!(err, EngineError::Blocked(message) => {
        assert!(message.contains("en, fr"), "got: {message}");
    });

    engine.select_language("fr").unwrap();
    engine.begin().await.unwrap();

    assert_eq!(engine.state().phase, SessionPhase::InProgress);
    assert_eq!(engine.state().selected_language.as_deref(), Some("fr"));
}

#[tokio::test]
async fn token_preset_language_auto_selects() {
    let mut questionnaire = survey();
    questionnaire.settings.languages = vec!["en".to_string(), "fr".to_string()];
    let harness = Harness::new(questionnaire);
    let mut validation = full_participant_token("p-1");
    validation.participant.as_mut().unwrap().language = Some("fr".to_string());
    *harness.gateway.token_validation.lock().unwrap() = Some(validation);

    let engine = harness.launch(&token_params("tok-abc")).await;

    assert_eq!(engine.state().phase, SessionPhase::InProgress);
    assert_eq!(engine.state().selected_language.as_deref(), Some("fr"));
}

// -- events --

#[tokio::test]
async fn resolution_is_announced_on_the_bus() {
    let harness = Harness::new(survey());
    let mut rx = harness.bus.subscribe();

    let _engine = harness.launch(&anonymous_params()).await;

    let events = drain_events(&mut rx);
    let resolved = events
        .iter()
        .find(|e| e.event_type == names::RESOLVED)
        .expect("resolved event");
    assert_eq!(resolved.questionnaire_id.as_deref(), Some(QUESTIONNAIRE_ID));
    assert_eq!(resolved.payload["access_mode"], "anonymous");
    assert_eq!(resolved.payload["phase"], "anonymous_gate");
    assert_eq!(resolved.payload["resumed"], false);
}

// -- snapshot restore --

#[tokio::test]
async fn in_progress_snapshot_resumes_with_answers() {
    let harness = Harness::new(survey());
    {
        let mut engine = harness.launch(&anonymous_params()).await;
        engine.begin().await.unwrap();
        engine.set_answer("q1", text("first draft")).unwrap();
    }

    let mut rx = harness.bus.subscribe();
    let engine = harness.launch(&anonymous_params()).await;

    assert_eq!(engine.state().phase, SessionPhase::InProgress);
    assert_eq!(engine.state().answers.get("q1"), Some(&text("first draft")));
    assert_eq!(engine.state().identity.participant_id.as_deref(), Some("p-stub"));

    let events = drain_events(&mut rx);
    let resolved = events
        .iter()
        .find(|e| e.event_type == names::RESOLVED)
        .expect("resolved event");
    assert_eq!(resolved.payload["resumed"], true);
}

#[tokio::test]
async fn stale_snapshot_is_discarded() {
    let harness = Harness::new(survey());
    let now = Utc::now().timestamp_millis();
    let mut snapshot = SessionSnapshot::new(
        Identity::anonymous(now),
        AccessMode::Anonymous,
        SessionPhase::InProgress,
        now - SNAPSHOT_TTL_MS - 60_000,
    );
    snapshot.answers.insert("q1".to_string(), text("stale"));
    SnapshotRepo::save(
        harness.store.as_ref(),
        SnapshotScope::Shared,
        QUESTIONNAIRE_ID,
        &snapshot,
    )
    .unwrap();

    let engine = harness.launch(&anonymous_params()).await;

    assert_eq!(engine.state().phase, SessionPhase::AnonymousGate);
    assert!(engine.state().answers.is_empty());
}

#[tokio::test]
async fn submitted_snapshot_restores_the_completion_screen() {
    let harness = Harness::new(survey());
    let now = Utc::now().timestamp_millis();
    let mut snapshot = SessionSnapshot::new(
        Identity::anonymous(now),
        AccessMode::Anonymous,
        SessionPhase::Submitted,
        now,
    );
    snapshot.submitted = true;
    SnapshotRepo::save(
        harness.store.as_ref(),
        SnapshotScope::Shared,
        QUESTIONNAIRE_ID,
        &snapshot,
    )
    .unwrap();

    let engine = harness.launch(&anonymous_params()).await;

    assert_eq!(engine.state().phase, SessionPhase::Submitted);
    assert!(engine.state().submitted);
}

#[tokio::test]
async fn snapshot_for_another_participant_is_discarded() {
    let harness = Harness::new(survey());
    let now = Utc::now().timestamp_millis();
    let identity = Identity {
        participant_id: Some("p-old".to_string()),
        ..Identity::default()
    };
    let mut snapshot =
        SessionSnapshot::new(identity, AccessMode::Token, SessionPhase::InProgress, now);
    snapshot.answers.insert("q1".to_string(), text("theirs"));
    SnapshotRepo::save(
        harness.store.as_ref(),
        SnapshotScope::Shared,
        QUESTIONNAIRE_ID,
        &snapshot,
    )
    .unwrap();
    *harness.gateway.token_validation.lock().unwrap() = Some(full_participant_token("p-1"));

    let engine = harness.launch(&token_params("tok-abc")).await;

    assert_eq!(engine.state().identity.participant_id.as_deref(), Some("p-1"));
    assert!(engine.state().answers.is_empty());

    let stored = SnapshotRepo::load(harness.store.as_ref(), SnapshotScope::Shared, QUESTIONNAIRE_ID)
        .unwrap()
        .expect("fresh snapshot persisted");
    assert_eq!(stored.identity.participant_id.as_deref(), Some("p-1"));
}

#[tokio::test]
async fn preview_sessions_persist_nothing() {
    let harness = Harness::new(survey());
    let mut engine = harness.launch(&LaunchParams::from_query("preview=true")).await;

    engine.begin().await.unwrap();
    engine.set_answer("q1", text("scratch")).unwrap();
    settle().await;

    assert_eq!(engine.state().phase, SessionPhase::InProgress);
    let stored =
        SnapshotRepo::load(harness.store.as_ref(), SnapshotScope::Shared, QUESTIONNAIRE_ID)
            .unwrap();
    assert!(stored.is_none());
    assert!(harness.gateway.save_requests.lock().unwrap().is_empty());
}
