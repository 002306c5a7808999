pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "MoodJournal",
    about = "Emotion diary backend with calendar and report aggregation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run the HTTP API until Ctrl+C.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    Status,
    Doctor,
    /// Print one emotion per day for a month.
    Calendar {
        #[arg(long)]
        user: String,
        #[arg(long)]
        year: String,
        #[arg(long)]
        month: String,
    },
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    Weekly {
        #[arg(long)]
        user: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    Monthly {
        #[arg(long)]
        user: String,
        #[arg(long)]
        year: String,
        #[arg(long)]
        month: String,
        /// Also write Markdown and JSON files into report_dir.
        #[arg(long, default_value_t = false)]
        save: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum DiaryCommands {
    Write {
        #[arg(long)]
        user: String,
        #[arg(long)]
        content: String,
        /// YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, ReportCommands};
    use clap::Parser;

    #[test]
    fn monthly_report_flags_parse() {
        let cli = Cli::parse_from([
            "MoodJournal", "report", "monthly", "--user", "1", "--year", "2024", "--month", "11", "--save",
        ]);

        match cli.command {
            Commands::Report {
                command: ReportCommands::Monthly { user, year, month, save },
            } => {
                assert_eq!(user, "1");
                assert_eq!(year, "2024");
                assert_eq!(month, "11");
                assert!(save);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn calendar_requires_all_flags() {
        assert!(Cli::try_parse_from(["MoodJournal", "calendar", "--user", "1", "--year", "2024"]).is_err());
    }
}
