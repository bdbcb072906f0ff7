//! Resolution of secret references into credential values.

use futures::future::try_join_all;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use stevedore_common::{CredentialRole, Error, Result, SensitiveString};

use crate::location::SecretKeySelector;
use crate::secrets::SecretResolver;

/// Credential values resolved for one driver, keyed by role.
///
/// Only roles whose reference was present in the location appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    values: BTreeMap<CredentialRole, SensitiveString>,
}

impl ResolvedCredentials {
    /// Get the value for a role, if it was referenced.
    pub fn get(&self, role: CredentialRole) -> Option<&str> {
        self.values.get(&role).map(SensitiveString::expose)
    }

    /// Whether a value is present for a role.
    pub fn contains(&self, role: CredentialRole) -> bool {
        self.values.contains_key(&role)
    }

    /// Roles that were resolved.
    pub fn roles(&self) -> impl Iterator<Item = CredentialRole> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolve every present reference through `secrets`.
///
/// Lookups run concurrently, one per present reference; absent references are
/// skipped. The first failure aborts the rest and is returned as
/// `SecretResolution`. If `cancel` fires first, `Cancelled` is returned.
pub async fn resolve_credentials(
    cancel: &CancellationToken,
    secrets: &dyn SecretResolver,
    refs: &[(CredentialRole, Option<&SecretKeySelector>)],
) -> Result<ResolvedCredentials> {
    let lookups = refs
        .iter()
        .filter_map(|(role, selector)| selector.map(|selector| (*role, selector)))
        .map(|(role, selector)| async move {
            debug!(%role, secret = %selector.name, key = %selector.key, "resolving credential");
            let value = secrets
                .get_secret(cancel, &selector.name, &selector.key)
                .await
                .map_err(|source| match source {
                    Error::Cancelled => Error::Cancelled,
                    source => Error::SecretResolution {
                        role,
                        name: selector.name.clone(),
                        key: selector.key.clone(),
                        source: Box::new(source),
                    },
                })?;
            Ok::<_, Error>((role, SensitiveString::new(value)))
        });

    let resolved = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        resolved = try_join_all(lookups) => resolved?,
    };

    Ok(ResolvedCredentials {
        values: resolved.into_iter().collect(),
    })
}
