use crate::config::types::{AccountConfig, Config, SystemConfig};
use crate::session::Endpoints;
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_account(&config.pixiv)?;
    validate_system(&config.system)?;
    validate_endpoints(&config.endpoints)?;
    Ok(())
}

fn validate_account(config: &AccountConfig) -> ConfigResult<()> {
    if config.username.trim().is_empty() {
        return Err(ConfigError::Validation(
            "username cannot be empty".to_string(),
        ));
    }

    if config.password.is_empty() {
        return Err(ConfigError::Validation(
            "password cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_system(config: &SystemConfig) -> ConfigResult<()> {
    if config.download_dir_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "download_dir_path cannot be empty".to_string(),
        ));
    }

    if config.cookies_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "cookies_path cannot be empty".to_string(),
        ));
    }

    validate_levels(&config.separate_level)?;

    if config.frontier_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "frontier_capacity must be >= 1, got {}",
            config.frontier_capacity
        )));
    }

    if config.enqueue_batch_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "enqueue_batch_limit must be >= 1, got {}",
            config.enqueue_batch_limit
        )));
    }

    let has_start = config
        .start_illust_id
        .as_ref()
        .is_some_and(|id| !id.as_str().trim().is_empty());
    if config.auto_start && !has_start {
        return Err(ConfigError::Validation(
            "start_illust_id is required when auto_start is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Bucketing thresholds must be strictly increasing
fn validate_levels(levels: &[u64]) -> ConfigResult<()> {
    if let Some(pair) = levels.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(ConfigError::Validation(format!(
            "separate_level must be strictly increasing, got {} before {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

fn validate_endpoints(endpoints: &Endpoints) -> ConfigResult<()> {
    for (name, value) in [
        ("main_url", &endpoints.main_url),
        ("login_url", &endpoints.login_url),
        ("login_api_url", &endpoints.login_api_url),
        ("illust_url", &endpoints.illust_url),
        ("recommend_url", &endpoints.recommend_url),
    ] {
        Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;
    }

    if !endpoints.recommend_url.contains("{id}") {
        return Err(ConfigError::Validation(format!(
            "recommend_url must contain an {{id}} placeholder, got '{}'",
            endpoints.recommend_url
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_levels() {
        assert!(validate_levels(&[]).is_ok());
        assert!(validate_levels(&[100]).is_ok());
        assert!(validate_levels(&[100, 500, 1000]).is_ok());

        assert!(validate_levels(&[100, 100]).is_err());
        assert!(validate_levels(&[500, 100]).is_err());
    }

    #[test]
    fn test_default_endpoints_are_valid() {
        assert!(validate_endpoints(&Endpoints::default()).is_ok());
    }

    #[test]
    fn test_recommend_url_needs_placeholder() {
        let endpoints = Endpoints {
            recommend_url: "https://www.pixiv.net/ajax/illust/recommend".to_string(),
            ..Endpoints::default()
        };
        assert!(matches!(
            validate_endpoints(&endpoints),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_endpoint() {
        let endpoints = Endpoints {
            main_url: "not a url".to_string(),
            ..Endpoints::default()
        };
        assert!(matches!(
            validate_endpoints(&endpoints),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_blank_credentials() {
        let account = AccountConfig {
            username: "  ".to_string(),
            password: "secret".to_string(),
        };
        assert!(validate_account(&account).is_err());
    }
}
