//! Shared harness for the scene engine tests
//!
//! Builds an in-memory home: host platform, simulated devices, a
//! recording dispatcher in front of the service registry and an in-memory
//! scene store.

#![allow(dead_code)]

mod mock_dispatcher;
mod mock_storage;
mod test_home;

pub use mock_dispatcher::*;
pub use mock_storage::*;
pub use test_home::*;
