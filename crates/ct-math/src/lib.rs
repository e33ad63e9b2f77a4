//! Connection Triage math utilities.

pub mod math;

pub use math::beta::*;
pub use math::descriptive::*;
pub use math::gamma::*;
pub use math::noncentral_t::*;
pub use math::normal::*;
pub use math::stable::*;
pub use math::student_t::*;
