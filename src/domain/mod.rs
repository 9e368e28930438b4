pub mod classify;
pub mod error;
pub mod model;
pub mod validate;

pub use classify::{check_policy, classify};
pub use error::AppError;
pub use model::{
    Classification, ClassificationPolicy, DownloadAction, DownloadOutcome, DownloadPhase, Platform,
};
pub use validate::validate;
