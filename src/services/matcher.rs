use crate::domain::models::ConfigurationError;
use regex::Regex;

/// Compiled dependency pattern tested against resource identifiers.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
        let pattern = Regex::new(pattern).map_err(ConfigurationError::InvalidPattern)?;
        Ok(Self { pattern })
    }

    /// Modules without a concrete resource never match.
    pub fn matches(&self, resource: Option<&str>) -> bool {
        resource.is_some_and(|r| self.pattern.is_match(r))
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}
