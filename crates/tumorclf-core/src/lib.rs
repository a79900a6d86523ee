pub mod config_manager;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod prep;
pub mod scaler;
pub mod split;

pub use config_manager::*;
pub use dataset::*;
pub use error::*;
pub use logging::init_tracing;
pub use metrics::*;
pub use model::*;
pub use prep::*;
pub use scaler::*;
pub use split::*;

/// Artifact path of the fitted scaler inside a run.
pub const SCALER_ARTIFACT_PATH: &str = "preprocessing/scaler.json";

/// Artifact directory holding the serialized forest.
pub const MODEL_ARTIFACT_DIR: &str = "model";

/// File name of the serialized forest inside [`MODEL_ARTIFACT_DIR`].
pub const MODEL_FILE_NAME: &str = "model.json";

/// File name of the sample input stored next to the model.
pub const INPUT_EXAMPLE_FILE_NAME: &str = "input_example.json";
