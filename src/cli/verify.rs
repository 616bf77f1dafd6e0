use super::config::{resolve_config_path, AnkerConfig};
use super::key::{determine_key_source, load_codec, read_bot_token};

/// Verify the installation without contacting any service
///
/// Checks the configuration file, the pepper key and the bot token shape.
pub async fn execute(
    config_path: Option<String>,
    key_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Verifying Anker installation...");
    println!();

    let mut all_ok = true;

    print!("  Version: ");
    println!("✅ {}", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path(config_path);
    print!("  Config: ");
    if !config_path.exists() {
        println!(
            "⚠️  {} not found, defaults will be created on first run",
            config_path.display()
        );
    } else {
        match AnkerConfig::load(&config_path).and_then(|config| {
            config.validate()?;
            Ok(config)
        }) {
            Ok(config) => println!(
                "✅ {} ({} languages)",
                config_path.display(),
                config.bot.languages.len()
            ),
            Err(e) => {
                println!("❌ {}", e);
                all_ok = false;
            }
        }
    }

    print!("  Pepper key: ");
    match load_codec(&determine_key_source(key_file)) {
        Ok(_) => println!("✅ Loaded"),
        Err(e) => {
            println!("❌ {}", e);
            all_ok = false;
        }
    }

    print!("  Bot token: ");
    match read_bot_token() {
        Ok(_) => println!("✅ Present"),
        Err(e) => {
            println!("❌ {}", e);
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("✅ All checks passed");
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}
