mod application;
pub mod data;
mod logging;
mod runtime_config;

pub use application::{Application, ApplicationError};
pub use logging::LogFile;
pub use runtime_config::{RootValidationError, RuntimeConfig};
