//! # Realm Link Test Suite
//!
//! Cross-crate scenarios that need more than one realm.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── e2e_messaging.rs   # Router request/response across realms
//!     └── flows.rs           # Bus + router + directory together
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p realm-tests
//!
//! # By file
//! cargo test -p realm-tests integration::e2e_messaging::
//! cargo test -p realm-tests integration::flows::
//! ```

#![allow(dead_code)]

pub mod integration;
