//! Request handlers.

pub mod clips;
pub mod health;
pub mod profile;
pub mod uploads;

pub use clips::*;
pub use health::*;
pub use profile::{get_profile, update_profile};
pub use uploads::*;
