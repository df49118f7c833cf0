//! The `node` module defines the traits through which the full node talks to the three
//! chains it bridges. These are never part of any proof, so implementations may block on
//! networking, keep local state, and so on.
pub mod services;
