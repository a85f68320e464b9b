//! Integration scenarios.

pub mod e2e_messaging;
pub mod flows;
