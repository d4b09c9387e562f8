use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SIGNING_KEY: &str = "signing-key";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_SIGNING_KEY)
            .long(ARG_SIGNING_KEY)
            .help("Base64 HMAC-SHA256 key for bearer tokens (at least 32 bytes decoded)")
            .env("AUTHGATE_SIGNING_KEY")
            .hide_env_values(true)
            .required(true),
    )
}

/// # Errors
/// Returns an error if the signing key is missing.
pub fn parse(matches: &ArgMatches) -> Result<SecretString> {
    matches
        .get_one::<String>(ARG_SIGNING_KEY)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --signing-key")
}
