mod client;
mod config;
mod coordinate_repository;
mod models;
mod topic_setting_repository;

pub use client::PostgresClient;
pub use config::PostgresConfig;
pub use coordinate_repository::PostgresCoordinateRepository;
pub use models::{CoordinateMappingRow, TopicSettingRow};
pub use topic_setting_repository::PostgresTopicSettingRepository;
