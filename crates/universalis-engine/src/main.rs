//! The Universalis engine binary.
//!
//! Wires the process from configuration: state store, memory bank,
//! event stream, LLM controller, Archon, tick engine. With `auto_run`
//! set the tick loop starts immediately and drains cleanly on Ctrl-C;
//! otherwise the process performs a single tick and exits, which is
//! useful for smoke-testing a seeded world.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use universalis_core::{Archon, TickEngine, UniversalisConfig};
use universalis_llm::{
    Embedder, EmbeddingClient, LanguageModel, LlmController, OpenAiModel, ScriptedModel,
};
use universalis_memory::{EventStream, MemoryBank};
use universalis_store::StateStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = UniversalisConfig::load().context("loading configuration")?;
    let simulation_id = config.simulation.simulation_id.clone();
    info!(%simulation_id, "Universalis engine starting");

    // --- Storage ---
    let store = Arc::new(
        StateStore::open(&config.store.path, &simulation_id, config.store.read_only)
            .await
            .context("opening state store")?,
    );

    // --- Memory systems ---
    let embedder = match config.llm.embedding_model.as_deref() {
        Some(model) if !config.llm.api_key.is_empty() => Embedder::Remote(EmbeddingClient::new(
            config.llm.base_url.clone(),
            config.llm.api_key.clone(),
            model,
        )),
        _ => Embedder::HashSeeded {
            dim: config.memory.embedding_dim,
        },
    };
    let memory = Arc::new(MemoryBank::new(
        simulation_id.clone(),
        config.memory.table_name.clone(),
        embedder,
    ));
    let stream = Arc::new(EventStream::new(simulation_id.clone()));

    // --- Language model ---
    let model = if config.llm.api_key.is_empty() {
        warn!("No LLM API key configured; using the scripted offline backend");
        LanguageModel::Scripted(Arc::new(ScriptedModel::new()))
    } else {
        LanguageModel::OpenAi(OpenAiModel::new(
            config.llm.base_url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
        ))
    };
    let llm = Arc::new(LlmController::new(model));
    info!(backend = llm.backend_name(), "LLM controller ready");

    // --- Adjudication and the clock ---
    let archon = Arc::new(Archon::new(
        Arc::clone(&llm),
        Arc::clone(&store),
        config.simulation.perception_radius,
    ));
    let engine = Arc::new(TickEngine::new(store, memory, stream).await?);
    engine.attach_archon(archon)?;

    if config.simulation.auto_run {
        let loop_engine = Arc::clone(&engine);
        let interval = config.simulation.tick_interval_ms;
        let loop_handle = tokio::spawn(async move {
            loop_engine.run_loop(interval).await;
        });

        tokio::signal::ctrl_c()
            .await
            .context("listening for shutdown signal")?;
        info!("Shutdown signal received; draining the current tick");
        engine.stop();
        engine.resume();
        loop_handle.await.context("joining tick loop")?;
    } else {
        let report = engine.async_step().await;
        info!(
            cycle = report.cycle,
            status = ?report.status,
            summary = %report.summary,
            "Single tick complete"
        );
    }

    engine.shutdown().await;
    Ok(())
}
