pub mod auth;
mod client;
pub mod config;
mod errors;
#[cfg(feature = "cli")]
pub mod logging;
mod resolver;

pub use client::{AuthenticatedClient, ObjectsService, StorageContext, StorageService};
pub use config::{Config, ResolutionOrder};
pub use errors::Error;
pub use resolver::{CredentialSource, Resolver};

/// Resolves credentials and returns the storage handles.
///
/// Call once at startup and share the returned context; its clients are safe to use
/// concurrently. Build `config` with `Config::from_env()` rather than `Config::default()` when
/// ambient discovery should consider `GOOGLE_APPLICATION_CREDENTIALS` and the gcloud file.
pub async fn initialize(config: &Config) -> Result<StorageContext, Error> {
    Resolver::new(config.clone())?.initialize().await
}
