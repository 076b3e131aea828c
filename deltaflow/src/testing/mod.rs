//! Test doubles and fixtures.
//!
//! This module provides:
//! - A scripted process gateway and canned tool handlers
//! - An in-memory version control fake
//! - On-disk project fixtures

mod fixture;
mod gateway;
mod vcs;

pub use fixture::{ModuleFixture, ProjectFixture};
pub use gateway::{adb_device, emit_classes, emit_dex, flag_value, source_args, ScriptedGateway};
pub use vcs::FakeVcs;
