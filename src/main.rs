use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use animeboy::chatbot::{
    ChatMessage, ChatbotConfig, ChatbotEngine, InferenceClient, Persona, SearchClient,
    TelegramClient, UserId as ChatUserId,
};
use animeboy::config::Config;
use animeboy::liveness;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Commands:")]
enum Command {
    #[command(description = "Start chatting with the bot")]
    Start,
    #[command(description = "Wipe your conversation history")]
    Reset,
}

struct BotState {
    engine: ChatbotEngine,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config_path = Config::resolve_path(std::env::args().nth(1));
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&log_dir, "animeboy.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting animeboy...");
    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file, using environment only"),
    }
    info!("Model: {}", config.hf_model);

    if let Err(e) = liveness::spawn(config.liveness_addr) {
        error!("Failed to start liveness thread: {e}");
    }

    let bot = Bot::new(&config.telegram_bot_token);
    match bot.get_me().await {
        Ok(me) => info!("✅ Logged in as @{} (ID: {})", me.username(), me.id),
        Err(e) => warn!("Failed to get bot info: {e}"),
    }

    let telegram = Arc::new(TelegramClient::new(bot.clone()));
    match telegram.register_commands(Command::bot_commands()).await {
        Ok(count) => info!("✅ Registered {count} command(s)"),
        Err(e) => error!("❌ {e}"),
    }

    let persona = Persona::new(
        config.bot_name.clone(),
        config.creator_name.clone(),
        chrono::Local::now().date_naive(),
    );
    let search = Arc::new(SearchClient::new(config.search_url.clone(), config.search_timeout));
    let generator = Arc::new(InferenceClient::new(
        config.inference_url.clone(),
        config.hf_api_token.clone(),
        persona.clone(),
        config.inference_timeout,
    ));
    let chatbot_config = ChatbotConfig {
        persona,
        history_policy: config.history_policy,
    };
    info!("History policy: {:?}", chatbot_config.history_policy);

    let state = Arc::new(BotState {
        engine: ChatbotEngine::new(chatbot_config, search, generator, telegram),
    });

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command))
        .branch(dptree::endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = ChatUserId::from(user.id.0);

    match cmd {
        Command::Start => state.engine.handle_start(msg.chat.id.0, &user_id).await,
        Command::Reset => state.engine.handle_reset(msg.chat.id.0, &user_id).await,
    }
    Ok(())
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(chat_msg) = telegram_to_chat_message(&msg) else {
        return Ok(());
    };
    state.engine.handle_message(chat_msg).await;
    Ok(())
}

fn telegram_to_chat_message(msg: &Message) -> Option<ChatMessage> {
    let user = msg.from.as_ref()?;
    let text = msg.text()?;

    let username = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    Some(ChatMessage {
        chat_id: msg.chat.id.0,
        user_id: ChatUserId::from(user.id.0),
        username,
        text: text.to_string(),
        from_bot: user.is_bot,
    })
}
