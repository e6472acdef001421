use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::ConfigError;
use super::paths::AppPaths;
use super::settings::{EmbeddingProviderKind, SentinelMatch, Settings};
use super::validation::validate_settings;

#[derive(Clone)]
pub struct ConfigService {
    paths: AppPaths,
}

impl ConfigService {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("RESEARCH_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        self.paths.base_dir.join("config.yml")
    }

    /// Loads `config.yml` (if present), applies process environment overrides
    /// and validates the result.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    pub fn load_with<F>(&self, lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = load_yaml_file(&self.config_path())?;
        apply_env_overrides(&mut settings, lookup)?;
        validate_settings(&settings)?;
        Ok(settings)
    }
}

fn load_yaml_file(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }

    serde_yaml::from_str::<Settings>(&contents).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Environment variables win over the config file. Unset or blank variables
/// leave the current value in place.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(token) = get("API_TOKEN").or_else(|| get("GITHUB_TOKEN")) {
        settings.llm.api_token = Some(token.trim().to_string());
    }
    if let Some(url) = get("API_BASE_URL") {
        settings.llm.api_base_url = url.trim().to_string();
    }
    if let Some(model) = get("LLM_MODEL") {
        settings.llm.model = model.trim().to_string();
    }
    if let Some(value) = get("EMBEDDING_PROVIDER") {
        settings.llm.embedding_provider =
            EmbeddingProviderKind::parse(&value).ok_or_else(|| invalid_env("EMBEDDING_PROVIDER", &value))?;
    }
    if let Some(model) = get("EMBEDDING_MODEL") {
        settings.llm.embedding_model = model.trim().to_string();
    }
    if let Some(value) = get("TEMPERATURE") {
        settings.llm.temperature = parse_env("TEMPERATURE", &value)?;
    }
    if let Some(value) = get("TIMEOUT") {
        let secs: u64 = parse_env("TIMEOUT", &value)?;
        settings.llm.timeout_secs = secs;
        settings.agent.tool_timeout_secs = secs;
    }

    if let Some(value) = get("MAX_TURNS") {
        settings.agent.max_turns = parse_env("MAX_TURNS", &value)?;
    }
    if let Some(value) = get("TOP_K") {
        settings.agent.top_k = parse_env("TOP_K", &value)?;
    }
    if let Some(value) = get("SENTINEL_MATCH") {
        settings.agent.sentinel_match = match value.trim().to_lowercase().as_str() {
            "contains" => SentinelMatch::Contains,
            "suffix" => SentinelMatch::Suffix,
            _ => return Err(invalid_env("SENTINEL_MATCH", &value)),
        };
    }

    if let Some(dir) = get("DATA_DIR") {
        settings.paths.data_dir = Some(PathBuf::from(dir.trim()));
    }
    if let Some(dir) = get("DB_DIR") {
        settings.paths.db_dir = Some(PathBuf::from(dir.trim()));
    }

    if let Some(url) = get("API_URL") {
        settings.client.api_url = url.trim().to_string();
    }
    if let Some(value) = get("USE_DOCKER") {
        settings.sandbox.use_docker = parse_bool("USE_DOCKER", &value)?;
    }
    if let Some(value) = get("DEBUG") {
        settings.app.debug = parse_bool("DEBUG", &value)?;
    }

    if let Some(host) = get("HOST") {
        settings.server.host = host.trim().to_string();
    }
    if let Some(value) = get("PORT") {
        settings.server.port = parse_env("PORT", &value)?;
    }

    Ok(())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| invalid_env(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_env(key, value)),
    }
}

fn invalid_env(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn service_in(dir: &Path) -> ConfigService {
        ConfigService::new(AppPaths::with_base_dir(dir))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = service_in(tmp.path()).load_with(|_| None).unwrap();
        assert_eq!(settings.agent.max_turns, 3);
        assert_eq!(settings.agent.sentinel, "TERMINATE");
        assert_eq!(settings.agent.top_k, 2);
        assert!(settings.sandbox.use_docker);
        assert!(settings.api_token().is_none());
    }

    #[test]
    fn env_overrides_file_values() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("config.yml"),
            "agent:\n  max_turns: 4\nllm:\n  model: gpt-4o-mini\n",
        )
        .unwrap();

        let settings = service_in(tmp.path())
            .load_with(lookup_from(&[
                ("GITHUB_TOKEN", "ghp_secret"),
                ("MAX_TURNS", "5"),
                ("USE_DOCKER", "false"),
                ("TIMEOUT", "180"),
                ("DATA_DIR", "/tmp/pdfs"),
            ]))
            .unwrap();

        assert_eq!(settings.agent.max_turns, 5);
        assert_eq!(settings.llm.model, "gpt-4o-mini");
        assert_eq!(settings.api_token(), Some("ghp_secret"));
        assert!(!settings.sandbox.use_docker);
        assert_eq!(settings.llm.timeout_secs, 180);
        assert_eq!(settings.agent.tool_timeout_secs, 180);
        assert_eq!(settings.paths.data_dir, Some(PathBuf::from("/tmp/pdfs")));
    }

    #[test]
    fn api_token_takes_precedence_over_github_token() {
        let mut settings = Settings::default();
        apply_env_overrides(
            &mut settings,
            lookup_from(&[("API_TOKEN", "primary"), ("GITHUB_TOKEN", "fallback")]),
        )
        .unwrap();
        assert_eq!(settings.api_token(), Some("primary"));
    }

    #[test]
    fn malformed_env_value_names_the_variable() {
        let mut settings = Settings::default();
        let err = apply_env_overrides(&mut settings, lookup_from(&[("MAX_TURNS", "three")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidEnv { key, value } => {
                assert_eq!(key, "MAX_TURNS");
                assert_eq!(value, "three");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_value_fails_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let err = service_in(tmp.path())
            .load_with(lookup_from(&[("MAX_TURNS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn broken_yaml_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("config.yml"), "agent: [unclosed").unwrap();
        let err = service_in(tmp.path()).load_with(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }
}
