pub mod provider;
pub mod sync;
pub mod types;
