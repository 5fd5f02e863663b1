//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod app_repo;
pub mod audience_repo;
pub mod cohort_repo;
pub mod credential_repo;
pub mod event_repo;
pub mod geo_repo;
pub mod message_repo;
pub mod queue_repo;
pub mod user_repo;

pub use app_repo::AppRepo;
pub use audience_repo::AudienceRepo;
pub use cohort_repo::CohortRepo;
pub use credential_repo::CredentialRepo;
pub use event_repo::AppEventRepo;
pub use geo_repo::GeoRepo;
pub use message_repo::MessageRepo;
pub use queue_repo::QueueRepo;
pub use user_repo::UserRepo;
