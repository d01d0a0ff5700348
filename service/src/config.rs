use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

/// Route group assigned to tokens and updates that don't name one.
pub const DEFAULT_ROUTE_ID: &str = "route-1";

/// Default lifetime of an issued driver token: 12 hours.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 12 * 60 * 60;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to receive server responses.
    /// A single `*` allows any origin.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "*"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 3000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Path of the JSON file the token registry is loaded from and rewritten to
    #[arg(long, env, default_value = "tokens.json")]
    token_store_path: PathBuf,

    /// Lifetime in seconds of a newly issued driver token
    #[arg(long, env, default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub token_ttl_secs: u64,

    /// Directory of static assets (driver and commuter pages) served as the fallback route
    #[arg(long, env, default_value = "public")]
    static_dir: PathBuf,

    /// Issue a token for `bus-1` on startup and print it for quick manual testing
    #[arg(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub sample_token: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn token_store_path(&self) -> &PathBuf {
        &self.token_store_path
    }

    pub fn set_token_store_path(mut self, path: PathBuf) -> Self {
        self.token_store_path = path;
        self
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn static_dir(&self) -> &PathBuf {
        &self.static_dir
    }

    /// True when CORS should accept any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["transit_hub"];
        argv.extend_from_slice(args);
        Config::parse_from(argv)
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = parse(&[]);

        assert_eq!(config.interface(), "127.0.0.1");
        assert_eq!(config.token_store_path(), &PathBuf::from("tokens.json"));
        assert_eq!(config.token_ttl(), Duration::from_secs(43_200));
        assert_eq!(config.static_dir(), &PathBuf::from("public"));
        assert!(config.allows_any_origin());
        assert!(config.sample_token);
    }

    #[test]
    fn allowed_origins_are_comma_delimited() {
        let config = parse(&[
            "--allowed-origins",
            "http://localhost:3000,https://buses.example.org",
        ]);

        assert_eq!(
            config.allowed_origins,
            vec![
                "http://localhost:3000".to_string(),
                "https://buses.example.org".to_string()
            ]
        );
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn sample_token_can_be_disabled() {
        let config = parse(&["--sample-token", "false"]);
        assert!(!config.sample_token);
    }

    #[test]
    fn set_token_store_path_overrides_the_parsed_value() {
        let config = parse(&[]).set_token_store_path(PathBuf::from("/tmp/other.json"));
        assert_eq!(config.token_store_path(), &PathBuf::from("/tmp/other.json"));
    }
}
