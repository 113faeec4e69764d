use anime_watch_list::{DEFAULT_WORKERS, Settings, parse_timezone};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "anime-watch-list", version)]
#[command(about = "Keep track of where you are in every anime you follow", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding config.txt and cache.json
    #[arg(long, global = true, env = "ANIME_WATCH_LIST_DIR")]
    pub dir: Option<PathBuf>,

    /// Number of shows resolved in parallel
    #[arg(long, global = true, env = "ANIME_WATCH_LIST_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Network timeout per request, in seconds
    #[arg(long, global = true, env = "ANIME_WATCH_LIST_TIMEOUT_SECS", default_value_t = 15)]
    pub timeout: u64,

    /// Timezone broadcast slots are shown in
    #[arg(long, global = true, env = "ANIME_WATCH_LIST_TIMEZONE", default_value = "Europe/Stockholm")]
    pub timezone: String,

    /// Log more (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Refresh all shows and list them
    List {
        /// Print the shows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start tracking a show by the URL of its current episode
    Add { url: String },

    /// Move a show to its next episode and print the link to it
    Watch { index: usize },

    /// Point a show at another episode
    SetEpisode { index: usize, episode: String },

    /// Stop tracking a show
    Remove { index: usize },

    /// Look up a show on MyAnimeList
    Info { index: usize },

    /// Show counts of the last refresh
    Stats,

    /// Delete the show cache
    RemoveCache {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Builds the engine settings from the flags
    pub fn settings(&self) -> Result<Settings, anime_watch_list::ConfigError> {
        let settings = match &self.dir {
            Some(dir) => Settings::in_dir(dir),
            None => Settings::default_paths()?,
        };

        Ok(settings
            .with_workers(self.workers)
            .with_request_timeout(Duration::from_secs(self.timeout))
            .with_display_timezone(parse_timezone(&self.timezone)?))
    }

    /// Filter used when RUST_LOG is not set
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "anime-watch-list",
            "set-episode",
            "3",
            "12",
            "--dir",
            "/tmp/watch",
            "-vv",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::SetEpisode { index: 3, ref episode } if episode == "12"));
        assert_eq!(cli.log_level(), "debug");
        let settings = cli.settings().unwrap();
        assert_eq!(settings.tracked_file, PathBuf::from("/tmp/watch/config.txt"));
        assert_eq!(settings.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_invalid_timezone_is_rejected() {
        let cli = Cli::try_parse_from([
            "anime-watch-list",
            "stats",
            "--dir",
            "/tmp/watch",
            "--timezone",
            "Mars/Olympus",
        ])
        .unwrap();

        assert!(cli.settings().is_err());
    }
}
