//! Process-wide tracing setup and the span helpers shared by every crate.

mod init;
mod slow;
mod spans;

pub use init::init_logger;
pub use slow::warn_if_slow;
pub use spans::{record_actor, record_deal};
