use crate::config::ConfigError;

pub(crate) type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn require_env(lookup: EnvLookup<'_>, key: &str) -> Result<String, ConfigError> {
    optional_trimmed_env(lookup, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

pub(crate) fn parse_u64_env(lookup: EnvLookup<'_>, key: &str) -> Result<Option<u64>, ConfigError> {
    match optional_trimmed_env(lookup, key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::ParseNumber(key.to_string())),
        None => Ok(None),
    }
}

pub(crate) fn parse_f64_env(
    lookup: EnvLookup<'_>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    match optional_trimmed_env(lookup, key) {
        Some(raw) => {
            let value = raw
                .parse::<f64>()
                .map_err(|_| ConfigError::ParseNumber(key.to_string()))?;
            if !value.is_finite() {
                return Err(ConfigError::ParseNumber(key.to_string()));
            }
            Ok(value)
        }
        None => Ok(default),
    }
}

pub(crate) fn optional_trimmed_env(lookup: EnvLookup<'_>, key: &str) -> Option<String> {
    lookup(key).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
