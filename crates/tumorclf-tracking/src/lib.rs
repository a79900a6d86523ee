pub mod error;
pub mod file_store;
pub mod mlflow;
pub mod run;
pub mod store;

pub use error::*;
pub use file_store::FileStore;
pub use mlflow::MlflowStore;
pub use run::ActiveRun;
pub use store::*;

use std::sync::Arc;

/// Open the store selected by the URI scheme: `file:` for a local directory,
/// `http(s)://` for an MLflow tracking server.
pub fn open_store(tracking_uri: &str) -> Result<Arc<dyn TrackingStore>> {
    if tracking_uri.starts_with("file:") {
        Ok(Arc::new(FileStore::from_uri(tracking_uri)?))
    } else if tracking_uri.starts_with("http://") || tracking_uri.starts_with("https://") {
        Ok(Arc::new(MlflowStore::new(tracking_uri)?))
    } else {
        Err(TrackingError::InvalidUri(format!(
            "{} (expected file: or http(s)://)",
            tracking_uri
        )))
    }
}
