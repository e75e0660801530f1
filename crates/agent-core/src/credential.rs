//! Caller-supplied API credential

/// Opaque secret used to authorize requests to the model endpoint.
///
/// Not `Display`, not `Serialize`, and `Debug` is redacted, so it cannot end
/// up in logs or in the transcript by accident. Validity is decided by the
/// endpoint, so an empty credential is accepted here.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the raw secret for an outbound auth header
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self(secret.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("gsk_live_secret");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("gsk_live_secret"));
        assert_eq!(credential.expose(), "gsk_live_secret");
    }

    #[test]
    fn test_empty_credential() {
        assert!(Credential::default().is_empty());
        assert!(Credential::from("   ").is_empty());
        assert!(!Credential::from("k").is_empty());
    }
}
