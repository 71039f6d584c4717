pub mod batch_service;
pub mod conversion_service;
pub mod translator; // Hive to Snowflake translation engine

pub use batch_service::*;
pub use conversion_service::*;
