use std::fmt;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Static bearer token attached to every request against the lap API.
///
/// The secret is only exposed when the `Authorization` header is built;
/// `Debug` output is redacted.
#[derive(Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }

    /// Build the default header map carrying `Authorization: Bearer <token>`.
    ///
    /// The header value is marked sensitive so reqwest never logs it.
    pub fn header_map(&self) -> Result<HeaderMap, Error> {
        let raw = format!("Bearer {}", self.0.expose_secret());
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|_| Error::ClientBuild("bearer token contains invalid characters".into()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// `true` if no token material is configured.
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl From<SecretString> for BearerToken {
    fn from(token: SecretString) -> Self {
        Self::new(token)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn header_map_carries_bearer_scheme() {
        let token = BearerToken::new(SecretString::from("abc.def.ghi".to_string()));
        let headers = token.header_map().unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer abc.def.ghi");
        assert!(value.is_sensitive());
    }

    #[test]
    fn newline_in_token_is_rejected() {
        let token = BearerToken::new(SecretString::from("abc\ndef".to_string()));
        assert!(matches!(token.header_map(), Err(Error::ClientBuild(_))));
    }

    #[test]
    fn debug_is_redacted() {
        let token = BearerToken::new(SecretString::from("super-secret".to_string()));
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
