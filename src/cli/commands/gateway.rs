use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const DEFAULT_PORT: &str = "8080";

#[must_use]
pub fn command() -> Command {
    let command = Command::new("gateway")
        .about("Run the authenticating gateway in front of the upstream services")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value(DEFAULT_PORT)
                .env("AUTHGATE_GATEWAY_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("upstream")
                .short('u')
                .long("upstream")
                .help("Upstream route as prefix=url, example: /auth=http://auth:8081")
                .env("AUTHGATE_UPSTREAMS")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .required(true),
        )
        .arg(
            Arg::new("open-route")
                .long("open-route")
                .help("Route reachable without a token, example: \"GET /health\" or /public/*")
                .long_help(
                    "Route reachable without a bearer token. Replaces the default list (/auth/signup, /auth/signin, /auth/verify, GET /health) when given.",
                )
                .env("AUTHGATE_OPEN_ROUTES")
                .action(ArgAction::Append)
                .value_delimiter(','),
        );

    super::signing::with_args(command)
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub upstreams: Vec<String>,
    pub open_routes: Option<Vec<String>>,
}

impl Options {
    /// # Errors
    /// Returns an error if no upstream is configured.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let upstreams: Vec<String> = matches
            .get_many::<String>("upstream")
            .context("missing required argument: --upstream")?
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();

        let open_routes = matches.get_many::<String>("open-route").map(|values| {
            values
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect()
        });

        Ok(Self {
            port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
            upstreams,
            open_routes,
        })
    }
}
