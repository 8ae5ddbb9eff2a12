//! Distance kernels.
//!
//! Every index in the crate ranks candidates with [`l2_squared`]. Routing all
//! comparisons through one kernel keeps the ranking of any given pair
//! identical no matter which structure computed it, which matters when
//! per-shard winners are re-ranked against each other.
//!
//! On unit vectors `‖a - b‖² = 2 - 2·cos(a, b)`, so the smallest squared L2
//! distance is also the largest cosine similarity.

pub mod ip;
pub mod l2;

pub use ip::{cosine_similarity, dot_product};
pub use l2::{l2_norm, l2_squared};
