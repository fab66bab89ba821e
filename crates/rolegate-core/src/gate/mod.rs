//! Section gatekeepers.
//!
//! `policy` holds the pure `Session -> Decision` rules for each section;
//! `keeper` turns those decisions into redirects through a host-supplied
//! `Navigator`.

pub mod keeper;
pub mod policy;

pub use keeper::{Gatekeeper, Navigator};
pub use policy::{evaluate, Decision, Section};
