use tracing::info;

use crate::models::{ProxyConfig, ProxyError, ProxyResult};

pub fn validate_url(url: &str) -> ProxyResult<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ProxyError::InvalidConfiguration(format!(
            "{} is not an http(s) URL",
            url
        )));
    }

    Ok(())
}

/// Startup checks on a freshly built configuration.
pub fn validate_config(config: &ProxyConfig) -> ProxyResult<()> {
    validate_url(&config.primary)?;
    validate_url(&config.candidate)?;

    match config.secondary.as_deref() {
        Some(secondary) => validate_url(secondary)?,
        None if config.noise_detection => {
            return Err(ProxyError::InvalidConfiguration(
                "If Noise Detection is enabled, you need to provide a secondary URL as well"
                    .to_string(),
            ));
        }
        None => {}
    }

    let tls_params = [&config.ca_cert, &config.client_cert, &config.client_key];
    let provided = tls_params.iter().filter(|param| param.is_some()).count();
    if provided != 0 && provided != tls_params.len() {
        return Err(ProxyError::InvalidConfiguration(
            "Https client options should either not be provided or all of caCert, clientCert and clientKey provided"
                .to_string(),
        ));
    }

    if config.levenshtein_percentage > 100 {
        return Err(ProxyError::InvalidConfiguration(format!(
            "levenshteinPercentage must be between 0 and 100, got {}",
            config.levenshtein_percentage
        )));
    }

    if !config.noise_detection
        && (!config.ignore_values.is_empty() || config.ignore_values_file.is_some())
    {
        info!("ignoreValues or ignoreValuesFile are set but noise detection is disabled, so they are going to be ignored");
    }

    Ok(())
}
