#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

#[cfg(feature = "native")]
mod service;
pub mod square;

#[cfg(feature = "native")]
pub use service::*;
