use super::config::{resolve_config_path, AnkerConfig};
use super::key::{determine_key_source, load_codec, read_bot_token, read_translate_api_key};
use super::logging;
use anker::anki::AnkiWebClient;
use anker::bot::AnkerBot;
use anker::telegram::TelegramTransport;
use anker::translation::{CachedTranslator, LibreTranslateClient};
use std::sync::Arc;
use tracing::info;

/// Run the bot service
///
/// ## Configuration Loading
///
/// Configuration comes from `--config` if provided, otherwise from the
/// default path (`~/.config/anker/config.toml` on Linux). A missing file is
/// created with commented defaults.
///
/// ## Secrets
///
/// - Pepper key: `--key-file`, else `ANKER_PEPPER_KEY`
/// - Bot token: `ANKER_BOT_TOKEN`
/// - Translator api key: `ANKER_TRANSLATE_API_KEY` (optional)
///
/// The service polls Telegram until Ctrl-C.
pub async fn execute(
    config_path: Option<String>,
    key_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = resolve_config_path(config_path);
    let (config, created) = AnkerConfig::load_or_create(&config_path)?;
    if created {
        println!("📝 No config file found. Created default configuration:");
        println!("   {}", config_path.display());
    }
    config.validate()?;
    logging::init(&config.logging)?;

    let codec = load_codec(&determine_key_source(key_file))?;
    let token = read_bot_token()?;
    let settings = config.bot_settings();

    let transport = TelegramTransport::new(
        &config.telegram.api_url,
        &token,
        config.telegram.poll_timeout,
    )?;
    let account = AnkiWebClient::new(
        &config.anki.web_url,
        &config.anki.user_url,
        settings.call_timeout(),
    )?;
    let translator = CachedTranslator::new(
        LibreTranslateClient::new(
            &config.translation.endpoint,
            read_translate_api_key(),
            config.translation.alternatives,
            settings.call_timeout(),
        )?,
        config.translation.cache_size,
    );

    info!(
        config = %config_path.display(),
        languages = ?settings.languages,
        allowed_users = settings.allowed_users.len(),
        "starting Anker bot"
    );

    let bot = AnkerBot::new(
        Arc::new(transport),
        Arc::new(codec),
        Arc::new(account),
        Arc::new(translator),
        settings,
    );
    bot.run().await?;

    info!("Anker bot stopped");
    Ok(())
}
