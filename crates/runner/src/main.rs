//! Headless session driver for smoke-testing a live backend.
//!
//! Resolves a launch exactly the way an embedded driver would, reports
//! where the session landed, and — when the launch lands at a start
//! gate — walks through it and prints the visible structure.
//!
//! Engine settings come from the environment (see
//! [`EngineConfig::from_env`]); the launch itself from:
//!
//! | Env Var            | Meaning                                     |
//! |--------------------|---------------------------------------------|
//! | `QUESTIONNAIRE_ID` | Activity to run (required)                  |
//! | `LAUNCH_QUERY`     | Raw launch query string (`token=…&mode=…`)  |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldwork_core::{LaunchParams, SessionPhase};
use fieldwork_events::EventBus;
use fieldwork_platform::{PlatformApi, ResponseGateway};
use fieldwork_session::{DeadlineController, EngineConfig, SessionEngine};
use fieldwork_store::{FileStore, ScopedStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldwork_runner=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    let questionnaire_id =
        std::env::var("QUESTIONNAIRE_ID").context("QUESTIONNAIRE_ID must be set")?;
    let query = std::env::var("LAUNCH_QUERY").unwrap_or_default();
    let params = LaunchParams::from_query(&query);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("building the HTTP client")?;
    let gateway: Arc<dyn ResponseGateway> =
        Arc::new(PlatformApi::with_client(client, config.api_base_url.clone()));
    let store: Arc<dyn ScopedStore> = Arc::new(FileStore::new(&config.store_dir));
    let bus = Arc::new(EventBus::default());

    let mut events = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!(
                event = %event.event_type,
                payload = %event.payload,
                "Session event"
            );
        }
    });

    let mut engine = SessionEngine::launch(
        Arc::clone(&gateway),
        Arc::clone(&store),
        Arc::clone(&bus),
        &config,
        &questionnaire_id,
        &params,
    )
    .await
    .context("launching the session")?;

    tracing::info!(
        questionnaire_id,
        phase = engine.state().phase.name(),
        access_mode = engine.state().access_mode.name(),
        scope = engine.scope().name(),
        "Session resolved"
    );

    // Registration sessions need a participant form; there is nothing a
    // headless driver can fill in on their behalf.
    if engine.state().phase == SessionPhase::Registration {
        tracing::info!("Session is waiting on the registration form; stopping here");
        return Ok(());
    }

    if matches!(
        engine.state().phase,
        SessionPhase::AnonymousGate | SessionPhase::TokenGate | SessionPhase::PreviewGate
    ) {
        engine.begin().await.context("passing the start gate")?;
        tracing::info!(phase = engine.state().phase.name(), "Start gate passed");
    }

    print_structure(&engine);

    if engine.state().phase == SessionPhase::InProgress {
        if let Some(limit_secs) = engine.questionnaire().time_limit_secs() {
            let controller = DeadlineController::start(
                limit_secs,
                engine.state().started_at,
                Arc::clone(&bus),
                questionnaire_id.clone(),
            );
            tracing::info!(
                limit_secs,
                remaining_secs = engine.remaining_secs(Utc::now().timestamp_millis()),
                "Deadline clock running"
            );
            controller.stop();
        }
    }

    Ok(())
}

/// Log the visible sections and where the pointer sits.
fn print_structure(engine: &SessionEngine) {
    for (index, view) in engine.visible_sections().iter().enumerate() {
        tracing::info!(
            section = index,
            title = %view.section.title,
            questions = view.questions.len(),
            "Visible section"
        );
    }
    if let Some(question) = engine.current_question() {
        tracing::info!(
            question_id = %question.id,
            kind = question.kind.label(),
            progress_percent = engine.progress_percent(),
            "Current question"
        );
    }
}
