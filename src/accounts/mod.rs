//! Accounts, verification tokens and the signup/verify/signin workflow.

pub mod email;
pub mod lifecycle;
pub mod model;
pub mod password;
pub mod postgres;
pub mod purge;
pub mod store;

pub use email::{EmailSender, LogEmailSender, VerificationEmail};
pub use lifecycle::{AccountError, AccountLifecycle, LifecycleConfig};
pub use model::{Account, ConsumeOutcome, Profile, Role, VerificationToken};
pub use postgres::PgCredentialStore;
pub use purge::spawn_purge_worker;
pub use store::{CredentialStore, MemoryCredentialStore, StoreError};
