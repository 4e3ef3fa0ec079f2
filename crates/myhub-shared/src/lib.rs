//! # myhub-shared
//!
//! Types shared between the MyHub server and store crates: the external
//! identity model, Discord badge decoding, and application-wide constants.

pub mod badges;
pub mod constants;
pub mod types;

pub use badges::{decode_badges, Badge, ProfileFeatures};
pub use types::{Identity, UserId};
