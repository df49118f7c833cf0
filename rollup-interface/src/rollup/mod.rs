//! Rollup-side data: L2 blocks, bundles, and the headers and challenges tracked on L1.
pub mod block;
pub mod bundle;
pub mod challenge;
pub mod header;

pub use block::{L2Block, L2Header};
pub use bundle::{Bundle, BundleError, SizeCheck};
pub use challenge::{challenge_key, ChallengeEvent, ChallengeStatus, DaChallenge};
pub use header::RollupHeader;
