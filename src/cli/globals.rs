use secrecy::SecretString;

/// Arguments shared by every subcommand.
#[derive(Clone)]
pub struct GlobalArgs {
    /// Base64 HMAC key used to sign and verify bearer tokens.
    pub signing_key: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(signing_key: SecretString) -> Self {
        Self { signing_key }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("signing_key", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(SecretString::from("c2VjcmV0".to_string()));
        assert_eq!(args.signing_key.expose_secret(), "c2VjcmV0");
    }

    #[test]
    fn debug_redacts_signing_key() {
        let args = GlobalArgs::new(SecretString::from("c2VjcmV0".to_string()));
        let debug = format!("{args:?}");
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("***"));
    }
}
