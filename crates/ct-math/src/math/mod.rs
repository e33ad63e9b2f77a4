//! Core math modules.

pub mod beta;
pub mod descriptive;
pub mod gamma;
pub mod noncentral_t;
pub mod normal;
pub mod stable;
pub mod student_t;
