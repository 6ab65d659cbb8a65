pub mod error;
pub mod config;
pub mod tree;
pub mod acl;
pub mod service;

pub use acl::{AccessRoles, RoleMap};
pub use config::AclConfig;
pub use error::{AclError, AclResult};
pub use service::AccessRolesService;
pub use tree::{MemoryRepository, MemorySession, NodeId, NodePath, TreeSession};

/// Build a `RoleMap` literal: `role_map! { "alice" => ["writer", "reader"], "bob" => [] }`.
#[macro_export]
macro_rules! role_map {
    ($($principal:expr => [$($role:expr),* $(,)?]),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut m = $crate::acl::RoleMap::new();
        $(
            m.entry(($principal).to_string())
                .or_default()
                .extend(::std::vec::Vec::<::std::string::String>::from([$(($role).to_string()),*]));
        )*
        m
    }};
}

// Test-only printing helper: expands to eprintln! during tests and debug builds and is absent otherwise.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
