pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, CredentialVerifier, LoginAllowList, normalize_login};
pub use auth_service_impl::DirectoryCredentialVerifier;

pub mod directory_sync;
pub use directory_sync::{Reconciler, SyncReport};

pub mod scheduler;
pub use scheduler::{SchedulerHandle, SyncScheduler};

pub mod session;
pub use session::SessionCodec;
