#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod l1;
mod l2;

pub use l1::{shares_key, MockL1Client, MockL1Config};
pub use l2::MockL2Client;
