//! Custom Resource Definitions (CRDs) for dragonfly-operator.
//!
//! - `DragonflyDb`: a single Dragonfly cache instance and its creation status

mod dragonfly_db;

pub use dragonfly_db::*;
