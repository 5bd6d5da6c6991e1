pub mod config;
pub mod engine;
pub mod error_page;
pub mod logging;
pub mod problem;
pub mod registry;
pub mod resource;
pub mod script;

pub use config::{DiagnosticSettings, RuntimeConfig};
pub use engine::{Engine, EngineBuilder, ScriptExports, ScriptFailure};
pub use error_page::{DiagnosticReport, ErrorPageBuilder, LineInfo};
pub use problem::ProblemError;
pub use registry::{Registry, RegistryBuilder};
pub use resource::{Resource, ResourceLoader, ResourcePath};
pub use script::{BridgeError, ScriptValue};
