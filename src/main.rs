use anyhow::{Context, Result};
use std::env;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use echo_dialog::bot;
use echo_dialog::dialog_config::DialogConfig;
use echo_dialog::dialogue::Session;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    info!("Starting Echo Dialog Telegram Bot");

    let bot_token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
    let config = DialogConfig::from_env()?;

    info!(
        resource_dir = %config.attachments.resource_dir.display(),
        confirm_max_retries = ?config.prompts.confirm_max_retries,
        choice_max_retries = config.prompts.choice_max_retries,
        "Configuration loaded"
    );

    let bot = Bot::new(bot_token);
    let dispatcher = bot::build_turn_dispatcher(&bot, &config)?;

    info!("Bot initialized, starting dispatcher");

    // One Session per chat, resumed on every message
    let handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<Session>, Session>()
        .endpoint(bot::message_handler);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<Session>::new(), dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
