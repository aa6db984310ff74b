//! Heap verification run at collection phase boundaries.

pub mod verifier;

pub use verifier::{verify_belt, verify_cards, VerifyReport};
