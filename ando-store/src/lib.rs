pub mod memory;

#[cfg(feature = "database")]
pub mod database;

pub use memory::MemoryStore;

#[cfg(feature = "database")]
pub use database::DatabaseStore;
