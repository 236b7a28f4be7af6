//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `batteryguard_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use batteryguard_core::db::migrations::latest_version;

fn main() {
    println!("batteryguard_core version={}", batteryguard_core::core_version());
    println!("batteryguard_core schema_version={}", latest_version());
}
