pub mod buffered_writer;
pub mod enrichment;
pub mod error;
pub mod geocoder;
pub mod ingestion_service;
pub mod repository;
pub mod retry_drainer;
pub mod types;
pub mod write_buffer;

pub use buffered_writer::BufferedReadingWriter;
pub use enrichment::{EnrichmentService, EnrichmentWorker};
pub use error::{DomainError, DomainResult};
pub use geocoder::{GeocodeError, GeocodedPlace, Geocoder};
pub use ingestion_service::{IngestionService, ReadingIngestor};
pub use repository::{CoordinateMappingRepository, ReadingStore, TopicSettingRepository};
pub use retry_drainer::RetryDrainer;
pub use types::{
    CoordinateMapping, DataPoint, FieldValue, NewCoordinateMapping, TopicSetting,
};
pub use write_buffer::{WriteBuffer, DEFAULT_TTL};

#[cfg(any(test, feature = "testing"))]
pub use geocoder::MockGeocoder;
#[cfg(any(test, feature = "testing"))]
pub use ingestion_service::MockReadingIngestor;
#[cfg(any(test, feature = "testing"))]
pub use repository::{
    MockCoordinateMappingRepository, MockReadingStore, MockTopicSettingRepository,
};
