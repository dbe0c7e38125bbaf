//! Deal lifecycle engine: creation, review, revision and cancellation of
//! advertising deals between advertisers and channel publishers.

pub mod actor;
pub mod authz;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod transition;

pub use actor::Actor;
pub use engine::DealEngine;
pub use error::{DealError, ErrorKind};
pub use model::{Deal, DealStatus};
