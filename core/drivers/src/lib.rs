//! Artifact driver resolution for Stevedore.
//!
//! This crate turns an artifact location from a workflow definition into a
//! ready-to-use storage driver: it picks the backend, resolves the secret
//! references the location carries, and derives the transfer tuning.
//!
//! # Design Principles
//! - Closed dispatch: locations and drivers are enums matched exhaustively
//! - Injected secrets: the secret store is a parameter, never a global
//! - No partial drivers: any resolution failure aborts construction
//! - Secret values are never logged or cached

pub mod backends;
pub mod credentials;
pub mod driver;
pub mod factory;
pub mod location;
pub mod secrets;
pub mod transfer;
pub mod tuning;

pub use credentials::{resolve_credentials, ResolvedCredentials};
pub use driver::ArtifactDriver;
pub use factory::{resolve_driver, Driver};
pub use location::{
    ArtifactLocation, AzureArtifact, BackendKind, BackendLocation, BasicAuth, GcsArtifact, Header,
    HttpArtifact, RawArtifact, S3Artifact, SecretKeySelector,
};
pub use secrets::{SecretResolver, StaticSecretResolver};
pub use transfer::ObjectTransfer;
pub use tuning::{resolve_tuning, TransferTuning, TuningOverrides};
