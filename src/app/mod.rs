use crate::api::{ApiServer, MeetingApiState};
use crate::config::Config;
use crate::global;
use crate::meeting::EndMeetingMachine;
use crate::notify::{HttpSummaryMailer, SummaryMailer};
use crate::presence::{HttpRoomPresence, NoPresence, RoomPresence};
use crate::store::{MeetingStore, SqliteMeetingStore};
use crate::summary::{ChatCompletionProvider, CompletionProvider, SummaryPipeline};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting wrapup service");

    let config = Config::load()?;

    let db_path = global::db_file()?;
    // Run migrations once up front so the first request doesn't pay for them.
    tokio::task::spawn_blocking({
        let db_path = db_path.clone();
        move || crate::store::open_db(&db_path).map(|_| ())
    })
    .await??;

    let store: Arc<dyn MeetingStore> = Arc::new(SqliteMeetingStore::new(db_path));

    let provider = build_completion_provider(&config)?;
    if !provider.is_available() {
        warn!("No AI API key configured; summaries will use the heuristic fallback");
    }

    let mailer: Arc<dyn SummaryMailer> = Arc::new(HttpSummaryMailer::new(
        config.mail.endpoint.clone(),
        config.mail.api_key.clone(),
        config.mail.from_address.clone(),
    ));

    let presence: Arc<dyn RoomPresence> = if config.presence.base_url.is_empty() {
        info!("No presence service configured; end signals are always honored");
        Arc::new(NoPresence)
    } else {
        Arc::new(HttpRoomPresence::new(config.presence.base_url.clone()))
    };

    let machine = Arc::new(EndMeetingMachine::new(
        store.clone(),
        SummaryPipeline::new(provider),
        mailer,
        presence,
    ));

    let server = ApiServer::new(config.server.port, MeetingApiState { machine, store });
    server.start().await
}

fn build_completion_provider(config: &Config) -> Result<Box<dyn CompletionProvider>> {
    let provider = ChatCompletionProvider::new(
        config.ai.api_key.clone().unwrap_or_default(),
        config.ai.endpoint.clone(),
        config.ai.model.clone(),
        Duration::from_secs(config.ai.timeout_seconds),
    )?;
    Ok(Box::new(provider))
}
