//! Credentials held in configuration
//!
//! The broker password and the PostgreSQL connection string are wrapped in
//! [`SecretString`] so they are zeroed on drop and never appear in `Debug`
//! output or logs. Code that needs the raw value calls `expose_secret()`.
//!
//! ```rust
//! use lantern::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let password = secret_string("capabilityquerier".to_string());
//! assert_eq!(password.expose_secret(), "capabilityquerier");
//! assert!(!format!("{password:?}").contains("capabilityquerier"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String payload of a [`SecretString`]
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl std::fmt::Display for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// The value with any `user:password@` userinfo replaced by `***@`
    ///
    /// Used when printing a connection string. Values without userinfo are
    /// returned unchanged.
    pub fn masked(&self) -> String {
        let Some(scheme_end) = self.0.find("://") else {
            return self.0.clone();
        };
        let rest = &self.0[scheme_end + 3..];
        let authority_end = rest.find('/').unwrap_or(rest.len());
        match rest[..authority_end].rfind('@') {
            Some(at) => format!("{}***@{}", &self.0[..scheme_end + 3], &rest[at + 1..]),
            None => self.0.clone(),
        }
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A zeroize-on-drop string whose `Debug` output is redacted
pub type SecretString = Secret<SecretValue>;

#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use test_case::test_case;

    #[test]
    fn test_broker_password_redacted_in_debug() {
        let secret = secret_string("capabilityquerier".to_string());
        assert_eq!(secret.expose_secret(), "capabilityquerier");
        assert!(!format!("{secret:?}").contains("capabilityquerier"));
    }

    #[test]
    fn test_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Broker {
            password: SecretString,
        }

        let broker: Broker = toml::from_str("password = \"guest\"").unwrap();
        assert_eq!(broker.password.expose_secret(), "guest");
    }

    #[test_case(
        "postgresql://lantern:postgrespassword@db:5432/lantern",
        "postgresql://***@db:5432/lantern";
        "user and password"
    )]
    #[test_case("postgres://lantern@localhost/lantern", "postgres://***@localhost/lantern"; "user only")]
    #[test_case("postgresql://localhost:5432/lantern", "postgresql://localhost:5432/lantern"; "no userinfo")]
    #[test_case("host=localhost user=lantern", "host=localhost user=lantern"; "key value form")]
    #[test_case("postgresql://db/lantern?opt=a@b", "postgresql://db/lantern?opt=a@b"; "at sign after path")]
    fn test_masked(raw: &str, expected: &str) {
        assert_eq!(secret_string(raw.to_string()).expose_secret().masked(), expected);
    }
}
