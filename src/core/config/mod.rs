pub mod error;
pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use error::ConfigError;
pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{EmbeddingProviderKind, SentinelMatch, Settings};

/// Loads `.env`, discovers the base directory, reads settings and applies the
/// configured directory overrides.
pub fn load() -> Result<(AppPaths, Settings), ConfigError> {
    dotenvy::dotenv().ok();

    let mut paths = AppPaths::discover();
    let settings = ConfigService::new(paths.clone()).load()?;
    paths.apply_overrides(&settings.paths);
    Ok((paths, settings))
}
