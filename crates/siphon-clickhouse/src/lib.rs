mod client;
mod config;
mod models;
mod reading_store;

pub use client::ClickHouseClient;
pub use config::ClickHouseConfig;
pub use models::ReadingRow;
pub use reading_store::ClickHouseReadingStore;
