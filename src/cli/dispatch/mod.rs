use crate::cli::{
    actions::{auth, gateway, Action},
    commands,
    globals::GlobalArgs,
};
use anyhow::{bail, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("auth", sub)) => {
            let globals = GlobalArgs::new(commands::signing::parse(sub)?);
            let options = commands::auth::Options::parse(sub)?;

            Ok(Action::Auth(auth::Args {
                globals,
                port: options.port,
                dsn: options.dsn,
                public_base_url: options.public_base_url,
                verification_ttl_hours: options.verification_ttl_hours,
                token_ttl_seconds: options.token_ttl_seconds,
                purge_interval_seconds: options.purge_interval_seconds,
            }))
        }
        Some(("gateway", sub)) => {
            let globals = GlobalArgs::new(commands::signing::parse(sub)?);
            let options = commands::gateway::Options::parse(sub)?;

            Ok(Action::Gateway(gateway::Args {
                globals,
                port: options.port,
                upstreams: options.upstreams,
                open_routes: options.open_routes,
            }))
        }
        Some((other, _)) => bail!("unknown subcommand: {other}"),
        None => bail!("a subcommand is required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const KEY: &str = "a2tra2tra2tra2tra2tra2tra2tra2tra2tra2tra2s=";

    fn matches_from(args: &[&str]) -> clap::ArgMatches {
        temp_env::with_vars(
            [
                ("AUTHGATE_SIGNING_KEY", None::<&str>),
                ("AUTHGATE_DSN", None),
                ("AUTHGATE_UPSTREAMS", None),
                ("AUTHGATE_OPEN_ROUTES", None),
                ("AUTHGATE_AUTH_PORT", None),
                ("AUTHGATE_GATEWAY_PORT", None),
            ],
            || commands::new().get_matches_from(args),
        )
    }

    #[test]
    fn dispatch_auth() {
        let matches = matches_from(&[
            "authgate",
            "auth",
            "--signing-key",
            KEY,
            "--dsn",
            "postgres://authgate@localhost/authgate",
            "--port",
            "9000",
        ]);

        let action = handler(&matches).expect("action");
        let Action::Auth(args) = action else {
            panic!("expected auth action");
        };
        assert_eq!(args.port, 9000);
        assert_eq!(args.dsn.as_deref(), Some("postgres://authgate@localhost/authgate"));
        assert_eq!(args.globals.signing_key.expose_secret(), KEY);
        assert_eq!(args.token_ttl_seconds, 3600);
    }

    #[test]
    fn dispatch_gateway() {
        let matches = matches_from(&[
            "authgate",
            "gateway",
            "--signing-key",
            KEY,
            "--upstream",
            "/auth=http://auth:8081",
        ]);

        let action = handler(&matches).expect("action");
        let Action::Gateway(args) = action else {
            panic!("expected gateway action");
        };
        assert_eq!(args.port, 8080);
        assert_eq!(args.upstreams, vec!["/auth=http://auth:8081"]);
        assert!(args.open_routes.is_none());
    }

    #[test]
    fn dispatch_without_subcommand_fails() {
        let matches = clap::Command::new("authgate").get_matches_from(["authgate"]);
        assert!(handler(&matches).is_err());
    }
}
