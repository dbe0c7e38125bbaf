//! Channel, user and post records the deal engine reads but never writes.

pub mod directory;
pub mod directory_sqlx;
pub mod model;
pub mod schema;
pub mod sql;
