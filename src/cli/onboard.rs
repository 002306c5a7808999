use crate::config::{Config, default_report_dir, expand_home};
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to MoodJournal onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();

    println!("\n[1/4] Your journal");
    let nickname: String = Input::with_theme(&theme)
        .with_prompt("  Nickname")
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            if input.trim().is_empty() {
                Err("A nickname is required")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Failed to read nickname")?;

    println!("\n[2/4] API port");
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Port for the local API server")
        .default(Config::default().api_port)
        .interact_text()
        .context("Failed to read API port")?;

    println!("\n[3/4] Report output directory");
    let report_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder where monthly reports will be saved")
        .default(default_report_dir().display().to_string())
        .interact_text()
        .context("Failed to read report directory")?;
    let report_dir = expand_home(&report_dir_input);
    println!("  ✓ {}", report_dir.display());

    println!("\n[4/4] Emotion analysis");
    println!("  Without a key every entry is saved with a neutral fallback analysis.");
    let ai_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Enable AI emotion analysis?")
        .default(true)
        .interact()
        .context("Failed to read AI choice")?;

    let ai_api_key = if ai_enabled {
        let key = Password::with_theme(&theme)
            .with_prompt("  API key (leave empty to use MOODJOURNAL_AI_API_KEY)")
            .allow_empty_password(true)
            .interact()
            .context("Failed to read API key")?;
        (!key.trim().is_empty()).then_some(key)
    } else {
        None
    };

    let config = Config {
        api_port,
        report_dir,
        ai_enabled,
        ai_api_key,
        ..Config::default()
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let user = Database::open(&config.db_path)?.find_or_create_user(&nickname)?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Your user ID is {} ({}).", user.id, user.nickname);
    println!("  Run MoodJournal serve to start the API.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
