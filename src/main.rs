mod ai;
mod analyzer;
mod api;
mod cli;
mod config;
mod db;
mod diary;
mod models;
mod validation;

use crate::analyzer::report::render_markdown;
use crate::cli::onboard::run_onboarding;
use crate::cli::{AiCommands, Cli, Commands, ConfigCommands, DiaryCommands, ReportCommands};
use crate::config::Config;
use crate::db::Database;
use crate::validation::parse_user_id;
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Serve { port } => handle_serve(port).await,
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Calendar { user, year, month } => handle_calendar(&user, &year, &month),
        Commands::Report { command } => handle_report(command),
        Commands::Diary { command } => handle_diary(command).await,
        Commands::Ai { command } => handle_ai_command(command),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

async fn handle_serve(port: Option<u16>) -> Result<()> {
    let mut config = load_or_default_config()?;
    if let Some(port) = port {
        config.api_port = port;
    }
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let analyzer = ai::build_analyzer(&config);
    let shared_config = Arc::new(config);

    info!(
        port = shared_config.api_port,
        ai_enabled = shared_config.ai_enabled,
        "MoodJournal service started"
    );

    tokio::select! {
        api_result = api::run_server(shared_config, analyzer) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;

    println!("MoodJournal status");
    println!("- database: {}", config.db_path.display());
    println!("- users: {}", database.count_users()?);
    println!("- records: {}", database.count_records()?);
    println!(
        "- latest_record: {}",
        database
            .latest_record_date()?
            .map(|date| date.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- api_port: {}", config.api_port);
    println!(
        "- ai: {}",
        if config.ai_enabled && ai::has_api_key(&config) {
            "enabled"
        } else {
            "fallback only"
        }
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing");
    }

    let config = match load_or_default_config() {
        Ok(config) => config,
        Err(error) => {
            println!("[WARN] config could not be loaded: {error:#}");
            issues.push("config invalid");
            Config::default()
        }
    };

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error:#}");
            issues.push("db unreachable");
        }
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!("[WARN] report dir missing: {}", config.report_dir.display());
        issues.push("report dir missing");
    }

    if config.min_year <= config.max_year {
        println!("[OK] calendar year range: {}-{}", config.min_year, config.max_year);
    } else {
        println!("[WARN] min_year is after max_year");
        issues.push("invalid year range");
    }

    if config.ai_enabled {
        if ai::has_api_key(&config) {
            println!("[OK] AI API key is configured");
        } else {
            println!("[WARN] AI is enabled but API key is missing");
            issues.push("ai api key missing");
        }
    } else {
        println!("[OK] AI feature disabled (fallback analyses only)");
    }

    if config.expose_error_details {
        println!("[WARN] expose_error_details is on; internal errors reach API clients");
        issues.push("diagnostic mode on");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_calendar(user: &str, year: &str, month: &str) -> Result<()> {
    let config = load_or_default_config()?;
    let user_id = parse_user_id(user)?;
    let database = Database::open(&config.db_path)?;
    let (window, days) = analyzer::calendar_month(&database, &config, user_id, year, month)?;

    println!("Calendar {} (user {user_id})", window.label());
    if days.is_empty() {
        println!("- no entries");
    }
    for day in days {
        println!(
            "- {} {} {} ({}) {}",
            day.date,
            day.emotion_emoji.as_deref().unwrap_or_default(),
            day.final_emotion.map(|emotion| emotion.label()).unwrap_or_default(),
            day.emotion_score.map(|score| score.to_string()).unwrap_or_default(),
            day.summary.as_deref().unwrap_or_default(),
        );
    }

    Ok(())
}

fn handle_report(command: ReportCommands) -> Result<()> {
    let config = load_or_default_config()?;

    match command {
        ReportCommands::Weekly { user, start, end } => {
            let user_id = parse_user_id(&user)?;
            let database = Database::open(&config.db_path)?;
            let report = analyzer::weekly_report(&database, user_id, Some(&start), Some(&end))?;

            println!(
                "Weekly report {} ~ {} (user {user_id})",
                report.period.start_date, report.period.end_date
            );
            println!("- records: {}", report.total_records);
            println!("- average score: {}", report.average_score);
            for (emotion, count) in &report.emotion_distribution {
                println!("- {emotion}: {count}");
            }
            for keyword in &report.top_keywords {
                println!("- keyword {} x{}", keyword.keyword, keyword.count);
            }
            Ok(())
        }
        ReportCommands::Monthly {
            user,
            year,
            month,
            save,
        } => {
            let user_id = parse_user_id(&user)?;

            if save {
                let (report, saved) =
                    analyzer::generate_and_save_monthly_report(&config, user_id, &year, &month)?;
                println!("{}", render_markdown(&report));
                println!("Report saved");
                println!("- Markdown: {}", saved.markdown_path.display());
                println!("- JSON: {}", saved.json_path.display());
            } else {
                let database = Database::open(&config.db_path)?;
                let report =
                    analyzer::monthly_report(&database, &config, user_id, Some(&year), Some(&month))?;
                println!("{}", render_markdown(&report));
            }
            Ok(())
        }
    }
}

async fn handle_diary(command: DiaryCommands) -> Result<()> {
    let config = load_or_default_config()?;

    match command {
        DiaryCommands::Write {
            user,
            content,
            date,
        } => {
            let user_id = parse_user_id(&user)?;
            let date = diary::parse_optional_date(date.as_deref())?;
            let analyzer = ai::build_analyzer(&config);

            let record = diary::save_text_diary(&config, analyzer, user_id, &content, date).await?;

            println!("Diary saved: #{}", record.id.unwrap_or_default());
            println!(
                "- {} {} ({})",
                record.emotion_emoji.as_deref().unwrap_or_default(),
                record.emotion.map(|emotion| emotion.label()).unwrap_or_default(),
                record.emotion_score.unwrap_or_default()
            );
            println!("- summary: {}", record.summary.as_deref().unwrap_or_default());
            Ok(())
        }
    }
}

fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = load_or_default_config()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.ai_api_base_url = value;
            }
            if let Some(value) = model {
                config.ai_model = value;
            }

            let response = ai::test_connection(&config)?;
            println!("AI API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

fn load_or_default_config() -> Result<Config> {
    let config = Config::load_or_init()?;
    config.ensure_bootstrap_files()?;
    Ok(config)
}
