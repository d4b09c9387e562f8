use crate::{
    cli::globals::GlobalArgs,
    gateway::{self, RouteClassifier, Upstreams},
    token::{SigningKey, TokenCodec},
};
use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub port: u16,
    pub upstreams: Vec<String>,
    pub open_routes: Option<Vec<String>>,
}

/// Execute the gateway action.
/// # Errors
/// Returns an error if the signing key, an upstream or an open route is invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (classifier, codec, upstreams) = prepare(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = crate::GIT_COMMIT_HASH,
        port = args.port,
        "starting gateway"
    );

    gateway::new(args.port, classifier, codec, upstreams).await
}

fn prepare(args: &Args) -> Result<(RouteClassifier, TokenCodec, Upstreams)> {
    let key = SigningKey::from_base64(&args.globals.signing_key)
        .context("Invalid AUTHGATE_SIGNING_KEY")?;
    let codec = TokenCodec::new(key);

    let upstreams = Upstreams::parse(&args.upstreams).context("Invalid --upstream")?;
    if upstreams.is_empty() {
        bail!("at least one --upstream is required");
    }

    let classifier = match &args.open_routes {
        Some(patterns) => RouteClassifier::from_patterns(patterns)
            .map_err(|e| anyhow!(e))
            .context("Invalid --open-route")?,
        None => RouteClassifier::default(),
    };

    Ok((classifier, codec, upstreams))
}
