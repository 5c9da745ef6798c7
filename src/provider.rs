//! Provider descriptors: the endpoints and quirks a client talks to.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the
//! authorization and token endpoints (HTTPS only, loopback excepted) and provider
//! quirks such as refresh-token retention and the scope delimiter. `builtin` ships
//! descriptors for the two accounts a photo migration moves between.

pub mod builtin;
pub mod descriptor;

pub use descriptor::*;
