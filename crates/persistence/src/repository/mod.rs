//! Repository implementations for database operations

pub mod goals;
pub mod interactions;
pub mod metrics;
pub mod products;
pub mod users;
pub mod votes;

pub use goals::*;
pub use interactions::*;
pub use metrics::*;
pub use products::*;
pub use users::*;
pub use votes::*;
