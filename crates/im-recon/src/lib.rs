pub mod extract;
pub mod model;
pub mod pipeline;
pub mod preprocessing;
pub mod registry;
pub mod service;
pub mod volume;


pub use model::TriplaneConfig;
pub use pipeline::TriplaneReconstructor;
pub use preprocessing::{Preprocessor, load_image};
pub use registry::{ModelCheckpoint, ModelRegistry};
pub use service::{SegmentationClient, ServiceConfig, Zero123Client, check_service_health};
