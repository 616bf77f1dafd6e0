use anker::crypto::FieldCodec;
use anker::telegram::check_token;
use std::fs;
use std::path::Path;

/// Environment variable holding the hex pepper key
pub const PEPPER_KEY_ENV: &str = "ANKER_PEPPER_KEY";

/// Environment variable holding the Telegram bot token
pub const BOT_TOKEN_ENV: &str = "ANKER_BOT_TOKEN";

/// Environment variable holding the LibreTranslate api key
pub const TRANSLATE_API_KEY_ENV: &str = "ANKER_TRANSLATE_API_KEY";

/// Modes for pepper key delivery, checked in order
#[derive(Debug, PartialEq, Eq)]
pub enum KeySource {
    /// From --key-file /path/to/key (container-native)
    File(String),
    /// From the ANKER_PEPPER_KEY env var
    EnvVar,
}

/// Determine key source from CLI arguments
///
/// 1. If key_file is Some, use File
/// 2. Otherwise, use EnvVar
pub fn determine_key_source(key_file: Option<String>) -> KeySource {
    match key_file {
        Some(file) => KeySource::File(file),
        None => KeySource::EnvVar,
    }
}

/// Read the hex pepper key from its source
pub fn read_pepper_key(source: &KeySource) -> Result<String, Box<dyn std::error::Error>> {
    let key = match source {
        KeySource::File(path) => {
            if !Path::new(path).exists() {
                return Err(format!("Key file not found: {}", path).into());
            }
            fs::read_to_string(path)
                .map_err(|e| format!("Failed to read key file: {}", e))?
                .trim()
                .to_string()
        }
        KeySource::EnvVar => std::env::var(PEPPER_KEY_ENV)
            .map_err(|_| format!("{} env var not set (or pass --key-file)", PEPPER_KEY_ENV))?
            .trim()
            .to_string(),
    };

    if key.is_empty() {
        return Err("Pepper key is empty".into());
    }
    Ok(key)
}

/// Build the field codec from the configured key source
pub fn load_codec(source: &KeySource) -> Result<FieldCodec, Box<dyn std::error::Error>> {
    let key = read_pepper_key(source)?;
    Ok(FieldCodec::from_hex(&key)?)
}

/// Read and validate the bot token
pub fn read_bot_token() -> Result<String, Box<dyn std::error::Error>> {
    let token = std::env::var(BOT_TOKEN_ENV)
        .map_err(|_| format!("{} env var not set", BOT_TOKEN_ENV))?
        .trim()
        .to_string();
    check_token(&token)?;
    Ok(token)
}

/// Optional translator api key
pub fn read_translate_api_key() -> Option<String> {
    std::env::var(TRANSLATE_API_KEY_ENV)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}
