//! Token records, lifecycle states, and redacted secrets.

pub mod record;
pub mod secret;
