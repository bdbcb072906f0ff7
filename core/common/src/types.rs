//! Common types used throughout Stevedore.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An object key within a bucket, container or URL, independent of backend.
///
/// Keys are slash-separated. The root key (no components) addresses the
/// whole bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey {
    components: Vec<String>,
}

impl ArtifactKey {
    /// Create the root key.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a key from components.
    ///
    /// # Errors
    /// - Returns error if any component is empty, `.`/`..`, or contains a separator
    pub fn from_components(components: Vec<String>) -> crate::Result<Self> {
        for comp in &components {
            Self::check_component(comp)?;
        }
        Ok(Self { components })
    }

    /// Parse a key string. Leading and trailing slashes are ignored.
    pub fn parse(key: &str) -> crate::Result<Self> {
        let key = key.trim_matches('/');
        if key.is_empty() {
            return Ok(Self::root());
        }

        let components: Vec<String> = key.split('/').map(String::from).collect();
        Self::from_components(components)
    }

    fn check_component(comp: &str) -> crate::Result<()> {
        if comp.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Key component cannot be empty".to_string(),
            ));
        }
        if comp == "." || comp == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "Key component cannot be '{}'",
                comp
            )));
        }
        if comp.contains('/') || comp.contains('\\') {
            return Err(crate::Error::InvalidInput(
                "Key component cannot contain separators".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if this is the root key.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the last component, if any.
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this key with a child component.
    pub fn join(&self, child: &str) -> crate::Result<Self> {
        Self::check_component(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Append every component of `relative` to this key.
    pub fn concat(&self, relative: &ArtifactKey) -> Self {
        let mut components = self.components.clone();
        components.extend(relative.components.iter().cloned());
        Self { components }
    }

    /// Strip `prefix` from this key, returning the remainder.
    ///
    /// Returns `None` if `prefix` is not a component-wise prefix.
    pub fn strip_prefix(&self, prefix: &ArtifactKey) -> Option<Self> {
        if !self.components.starts_with(&prefix.components) {
            return None;
        }
        Some(Self {
            components: self.components[prefix.components.len()..].to_vec(),
        })
    }

    /// Get the key components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The key as an object-store path (no leading slash).
    pub fn as_object_key(&self) -> String {
        self.components.join("/")
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_object_key())
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.as_object_key()
    }
}

/// Logical role a resolved credential plays for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialRole {
    AccessKey,
    SecretKey,
    SessionToken,
    ServiceAccountKey,
    AccountKey,
    Username,
    Password,
}

impl CredentialRole {
    /// Human-readable role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialRole::AccessKey => "access key",
            CredentialRole::SecretKey => "secret key",
            CredentialRole::SessionToken => "session token",
            CredentialRole::ServiceAccountKey => "service account key",
            CredentialRole::AccountKey => "account key",
            CredentialRole::Username => "username",
            CredentialRole::Password => "password",
        }
    }
}

impl fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret string wrapper that zeroizes on drop and never prints its value.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveString(String);

impl SensitiveString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveString([REDACTED; {} bytes])", self.0.len())
    }
}
