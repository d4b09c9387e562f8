//! # Authgate (account service and authenticating gateway)
//!
//! `authgate` authenticates users, issues HS256 bearer tokens, and hands the
//! resulting identity from a perimeter gateway to internal services.
//!
//! ## Account lifecycle
//!
//! Accounts move through `Unregistered -> PendingVerification -> Active`.
//! Signup stores an Argon2id password hash and a single-use verification token
//! (24h). Verification consumes the token atomically in the credential store, so
//! concurrent attempts on the same link produce exactly one success.
//!
//! ## Gateway trust boundary
//!
//! The gateway is the only place bearer tokens are verified. For secured routes it
//! checks the signature and expiry, then forwards the request with plain identity
//! headers (`userEmail`, `userPhone`, `userName`, `userLastName`, `userAddress`).
//! Downstream services trust those headers verbatim, which is only sound when they
//! are reachable exclusively through the gateway. The gateway strips any
//! client-supplied copies of those headers before authenticating.

pub mod accounts;
pub mod api;
pub mod cli;
pub mod gateway;
pub(crate) mod http;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
