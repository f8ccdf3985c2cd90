use murmur::agent::Agent;
use murmur::maintenance::{LogJanitor, MoodTicker};
use murmur::memory::{EmbeddingClient, MemoryStore};
use murmur::onebot::OneBotClient;
use murmur::persona::Persona;
use murmur::providers::{OpenAiProvider, VisionClient};
use murmur::server::{AdminState, serve};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let cfg = match murmur::config::load(Path::new(&config_path)) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("failed to load config from {}: {:#}", config_path, e);
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let base = if cfg.app.debug {
            "debug"
        } else {
            cfg.app.log_level.as_str()
        };
        format!("murmur={base},info").parse().expect("valid filter")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("murmur v{} starting (config: {})", murmur::VERSION, config_path);

    // Embedding client: optional, retrieval degrades to keyword search
    let embeddings = if cfg.embedding.enabled {
        match EmbeddingClient::new(&cfg.embedding) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("embedding client unavailable, keyword retrieval only: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Memory store: fatal when it cannot come up
    let store = match MemoryStore::new(&cfg.memory, embeddings) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("memory store init failed: {:#}", e);
            std::process::exit(1);
        }
    };
    info!("memory store ready at {}", cfg.memory.sqlite.path);

    let provider: Arc<dyn murmur::providers::LLMProvider> =
        Arc::new(OpenAiProvider::new(&cfg.llm));
    info!("LLM provider ready (model: {})", cfg.llm.model);

    // Vision client: optional, images degrade to placeholders
    let vision = if cfg.vision_llm.enabled {
        match VisionClient::new(&cfg.vision_llm) {
            Ok(client) => {
                info!("vision enabled (model: {})", cfg.vision_llm.model);
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("vision client unavailable, image placeholders only: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Gateway: fatal when the first connect fails
    let (bot, inbound_rx) = OneBotClient::new(cfg.onebot.clone());
    if let Err(e) = bot.connect().await {
        error!("gateway connect failed: {:#}", e);
        std::process::exit(1);
    }

    let persona = Arc::new(Persona::new(cfg.persona.clone()));
    info!("persona loaded: {}", persona.name());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let tools = Arc::new(murmur::tools::default_registry());
    let agent = Agent::new(
        cfg.clone(),
        persona,
        store.clone(),
        provider,
        vision,
        bot.clone(),
        tools,
        shutdown_rx.clone(),
    );

    tokio::spawn(agent.clone().run(inbound_rx));
    tokio::spawn(agent.clone().run_scheduler());

    MoodTicker::new(store.clone(), shutdown_rx.clone()).start();
    LogJanitor::new(
        store.clone(),
        cfg.memory.message_log_cleanup.clone(),
        shutdown_rx.clone(),
    )
    .start();

    let admin = AdminState {
        cfg: cfg.clone(),
        store: store.clone(),
    };
    tokio::spawn(async move {
        if let Err(e) = serve(admin).await {
            error!("admin server exited: {:#}", e);
        }
    });

    info!("murmur is online, ctrl-c to exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("signal handling failed: {}", e);
    }

    info!("shutting down...");
    let _ = shutdown_tx.send(true);
    bot.close().await;
    // Give in-flight tasks a moment to observe the signal
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    info!("bye");
}
