use anyhow::Context;
use hakari::config::ConfigLoader;
use hakari::llm::create_model_client;
use hakari::observability::init_tracing;
use hakari::services::{InMemorySessionDirectory, create_conversation_engine};
use hakari::storage::InMemoryStore;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const HELP: &str = "commands: /register <email> <name> | /login <email> | /status | /metrics | /logout | /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    ConfigLoader::validate(&config).context("invalid configuration")?;

    let _guard = init_tracing(&config.app_name, &config.logging)?;
    info!("Starting {} ({})...", config.app_name, config.environment);

    let store = match &config.store_path {
        Some(path) => Arc::new(InMemoryStore::open(path)?),
        None => Arc::new(InMemoryStore::new()),
    };
    info!("Store initialized with {} users", store.user_count());

    let model = create_model_client(&config.model)?;
    let store_path = config.store_path.clone();
    let engine = create_conversation_engine(
        config,
        store.clone(),
        Arc::from(model),
        Arc::new(InMemorySessionDirectory::new()),
    )?;
    info!("Engine ready");

    println!("{}", HELP);
    let mut token: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut parts = line.splitn(3, ' ');

        match parts.next() {
            Some("/quit") => break,
            Some("/register") => {
                let email = parts.next().unwrap_or_default();
                let name = parts.next().unwrap_or_default();
                match engine.register_user(email, name).await {
                    Ok(session) => {
                        println!("✨ Hi, {}... I don't know why I'm here, but I guess we can talk.", name);
                        token = Some(session.token);
                    }
                    Err(e) => println!("❌ {}", e),
                }
            }
            Some("/login") => match engine.login(parts.next().unwrap_or_default()).await {
                Ok(session) => {
                    println!("...oh. It's you again.");
                    token = Some(session.token);
                }
                Err(e) => println!("❌ {}", e),
            },
            Some("/logout") => {
                if let Some(t) = token.take() {
                    engine.logout(&t).await;
                }
            }
            Some("/status") => match token.as_deref() {
                Some(t) => {
                    if let (Some(status), Some(user)) = (engine.status(t).await, engine.profile(t).await) {
                        println!(
                            "{} {} · {} · level {} ({} xp) · {} messages · confidence {}%",
                            status.emoji,
                            status.persona_name,
                            status.state,
                            status.level,
                            status.experience,
                            status.interactions,
                            user.confidence,
                        );
                        if let Some(emotion) = &status.dominant_emotion {
                            println!("mostly {} with you", emotion);
                        }
                        if !status.unlocked_abilities.is_empty() {
                            println!("abilities: {}", status.unlocked_abilities.join(", "));
                        }
                    }
                }
                None => println!("{}", HELP),
            },
            Some("/metrics") => print!("{}", engine.metrics().gather()),
            _ => {
                let Some(t) = token.as_deref() else {
                    println!("{}", HELP);
                    continue;
                };
                if let Some(reply) = engine.handle_message(t, line).await {
                    println!("{}", reply.text);
                    if let Some(path) = &store_path {
                        if let Err(e) = store.save_to(path) {
                            tracing::error!(error = %e, "failed to write store snapshot");
                        }
                    }
                }
            }
        }
    }

    if let Some(path) = &store_path {
        store.save_to(path)?;
    }
    info!("Bye");
    Ok(())
}
