//! Bearer token issuance and verification (compact JWS, HS256).
//!
//! The signing key is loaded once at startup and shared read-only by every
//! request. [`TokenCodec::parse_and_verify`] covers the signature and the payload
//! shape only; [`TokenCodec::verify_fresh`] also rejects expired tokens.

mod claims;
mod error;

pub use claims::{Claims, TokenHeader};
pub use error::TokenError;

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::SystemTime;

use crate::accounts::Account;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Symmetric HMAC key. Never printed, never logged.
pub struct SigningKey {
    bytes: SecretSlice<u8>,
}

impl SigningKey {
    /// Decode a base64 (standard alphabet, padded) key from configuration.
    ///
    /// # Errors
    /// Returns [`TokenError::SigningKeyMisconfigured`] if the value is empty, not
    /// base64, or shorter than [`MIN_SIGNING_KEY_BYTES`] once decoded.
    pub fn from_base64(encoded: &SecretString) -> Result<Self, TokenError> {
        let trimmed = encoded.expose_secret().trim();
        if trimmed.is_empty() {
            return Err(TokenError::SigningKeyMisconfigured(
                "signing key is empty".to_string(),
            ));
        }

        let bytes = Base64::decode_vec(trimmed).map_err(|_| {
            TokenError::SigningKeyMisconfigured("signing key is not valid base64".to_string())
        })?;

        Self::from_bytes(bytes)
    }

    /// # Errors
    /// Returns [`TokenError::SigningKeyMisconfigured`] if the key is too short.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TokenError> {
        if bytes.len() < MIN_SIGNING_KEY_BYTES {
            return Err(TokenError::SigningKeyMisconfigured(format!(
                "signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self {
            bytes: SecretSlice::from(bytes),
        })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.bytes.expose_secret())
            .map_err(|_| TokenError::SigningKeyMisconfigured("invalid key length".to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("bytes", &"***").finish()
    }
}

/// Issues and parses bearer tokens. Cheap to clone.
#[derive(Clone, Debug)]
pub struct TokenCodec {
    key: Arc<SigningKey>,
    ttl_seconds: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self {
            key: Arc::new(key),
            ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    /// Issue a token for `account`, valid from now for the configured TTL.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, account: &Account) -> Result<String, TokenError> {
        self.issue_at(account, now_unix_seconds())
    }

    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_at(&self, account: &Account, now_unix_seconds: i64) -> Result<String, TokenError> {
        let claims = Claims::for_account(account, now_unix_seconds, self.ttl_seconds);
        self.sign(&claims)
    }

    /// Sign an arbitrary claim set.
    ///
    /// # Errors
    /// Returns an error if the header or claims cannot be encoded.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.key.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify the signature and decode the claims. Expiry is NOT checked.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidSignature`] when the MAC does not match and a
    /// malformed-token variant when the structure, encoding or algorithm is wrong.
    pub fn parse_and_verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let claims_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let sig_b64 = parts.next().ok_or(TokenError::Malformed)?;
        if parts.next().is_some() || header_b64.is_empty() || claims_b64.is_empty() {
            return Err(TokenError::Malformed);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        let mut mac = self.key.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        b64d_json(claims_b64)
    }

    /// Verify the signature, then reject the token if it is expired at `now`
    /// (Unix seconds).
    ///
    /// # Errors
    /// Returns [`TokenError::Expired`] for an authentic but stale token, otherwise
    /// fails like [`Self::parse_and_verify`].
    pub fn verify_fresh(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let claims = self.parse_and_verify(token)?;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Compare the token subject with `expected_subject`.
    ///
    /// # Errors
    /// Fails exactly like [`Self::parse_and_verify`] on a bad token.
    pub fn subject_matches(&self, token: &str, expected_subject: &str) -> Result<bool, TokenError> {
        let claims = self.parse_and_verify(token)?;
        Ok(claims.sub == expected_subject)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[must_use]
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
