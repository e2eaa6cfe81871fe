//! Input/output helpers.
//!
//! - reconstruction config JSON (`config`)
//! - run input JSON read/write (`run`)
//! - record exports, JSON lines and CSV (`export`)

pub mod config;
pub mod export;
pub mod run;

pub use config::*;
pub use export::*;
pub use run::*;
