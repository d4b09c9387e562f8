use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const DEFAULT_PORT: &str = "8081";

#[must_use]
pub fn command() -> Command {
    let command = Command::new("auth")
        .about("Run the account service (signup, verification, signin)")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value(DEFAULT_PORT)
                .env("AUTHGATE_AUTH_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .long_help(
                    "PostgreSQL connection string. When absent, accounts are kept in memory and lost on restart.",
                )
                .env("AUTHGATE_DSN"),
        )
        .arg(
            Arg::new("public-base-url")
                .long("public-base-url")
                .help("Public base URL used for verification links")
                .env("AUTHGATE_PUBLIC_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new("verification-ttl-hours")
                .long("verification-ttl-hours")
                .help("Email verification token TTL in hours")
                .env("AUTHGATE_VERIFICATION_TTL_HOURS")
                .default_value("24")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Bearer token TTL in seconds")
                .env("AUTHGATE_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("purge-interval-seconds")
                .long("purge-interval-seconds")
                .help("Interval between expired verification token purges, 0 disables")
                .env("AUTHGATE_PURGE_INTERVAL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        );

    super::signing::with_args(command)
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub dsn: Option<String>,
    pub public_base_url: String,
    pub verification_ttl_hours: i64,
    pub token_ttl_seconds: i64,
    pub purge_interval_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            port: matches.get_one::<u16>("port").copied().unwrap_or(8081),
            dsn: matches.get_one::<String>("dsn").cloned(),
            public_base_url: matches
                .get_one::<String>("public-base-url")
                .cloned()
                .context("missing required argument: --public-base-url")?,
            verification_ttl_hours: matches
                .get_one::<i64>("verification-ttl-hours")
                .copied()
                .context("missing required argument: --verification-ttl-hours")?,
            token_ttl_seconds: matches
                .get_one::<i64>("token-ttl-seconds")
                .copied()
                .context("missing required argument: --token-ttl-seconds")?,
            purge_interval_seconds: matches
                .get_one::<u64>("purge-interval-seconds")
                .copied()
                .context("missing required argument: --purge-interval-seconds")?,
        })
    }
}
