//! # Notesync Testkit
//!
//! Testing utilities for notesync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: helper structs for setting up replicas and items
//! - **Generators**: proptest strategies for frames, markers, and ids
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use notesync_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let item = fixture.make_item("my-note", &[("title", "hello")]);
//! assert!(item.check_invariant().is_ok());
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use notesync_core::missing_parts;
//! use notesync_testkit::generators::frame_pair;
//!
//! proptest! {
//!     #[test]
//!     fn diff_is_subset_of_remote((local, remote) in frame_pair()) {
//!         for id in &missing_parts(&local, &remote) {
//!             prop_assert!(remote.contains(id));
//!         }
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_peer_fixtures, TestFixture};
pub use generators::{frame, frame_pair, item_id, part_id, pooled_part_id, version_mark};
