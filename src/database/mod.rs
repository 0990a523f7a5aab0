pub mod connection;
pub mod memory;
pub mod operations;
pub mod schema;
pub mod store;

pub use connection::{connect, create_ssl_connector};
pub use memory::MemoryStore;
pub use operations::PgWeatherStore;
pub use store::{WeatherStore, MAX_BATCH_DELETE};
