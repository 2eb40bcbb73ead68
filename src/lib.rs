pub mod error;
pub mod fetch;
pub mod model;
pub mod persist;
pub mod pool;
