use crate::utils::error::{Result, SicilError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(SicilError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(SicilError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(SicilError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(SicilError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(SicilError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SicilError::MissingConfig {
            field: field_name.to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(SicilError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("portal.base_url", "https://example.com").is_ok());
        assert!(validate_url("portal.base_url", "http://example.com").is_ok());
        assert!(validate_url("portal.base_url", "").is_err());
        assert!(validate_url("portal.base_url", "invalid-url").is_err());
        assert!(validate_url("portal.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("session.file", "session.json").is_ok());
        assert!(validate_path("session.file", "").is_err());
        assert!(validate_path("session.file", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("credentials.email", "a@b.c").is_ok());
        assert!(matches!(
            validate_non_empty_string("credentials.email", "   "),
            Err(SicilError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("ocr.render_scale", 2.0, 1.0, 6.0).is_ok());
        assert!(validate_range("ocr.render_scale", 0.5, 1.0, 6.0).is_err());
        assert!(validate_range("portal.timeout_seconds", 0u64, 1, 3600).is_err());
    }
}
