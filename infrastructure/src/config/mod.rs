//! Configuration file loading for decisional-middleware
//!
//! Sources are merged with figment. The priority order (highest to lowest):
//!
//! 1. `MIDDLEWARE_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./middleware.toml`
//! 4. Global: `$XDG_CONFIG_HOME/decisional-middleware/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileAnalyzerConfig, FileConfig, FileGatewayConfig, FileOrchestrationConfig, FileOutputConfig,
    FileStrategiesConfig, FileStrategyConfig, FileTraceConfig, default_personas,
};
pub use loader::ConfigLoader;
