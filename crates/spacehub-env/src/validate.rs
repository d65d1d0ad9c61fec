//! Input validation for environment entries.

use regex::Regex;

use crate::config::EnvConfig;
use crate::error::{EnvError, EnvResult};

const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Checks names, values and descriptions against the configured bounds.
#[derive(Debug, Clone)]
pub struct Validator {
    name_re: Regex,
    max_name_len: usize,
    max_value_len: usize,
    max_desc_len: usize,
}

impl Validator {
    pub fn new(config: &EnvConfig) -> EnvResult<Self> {
        let name_re = Regex::new(NAME_PATTERN).map_err(|e| EnvError::Config(e.to_string()))?;
        Ok(Self {
            name_re,
            max_name_len: config.max_name_len,
            max_value_len: config.max_value_len,
            max_desc_len: config.max_desc_len,
        })
    }

    /// An environment variable name: letters, digits and underscores, not
    /// starting with a digit.
    pub fn name(&self, name: &str) -> EnvResult<()> {
        if name.is_empty() || name.len() > self.max_name_len {
            return Err(EnvError::InvalidInput(format!(
                "name must be 1 to {} characters",
                self.max_name_len
            )));
        }
        if !self.name_re.is_match(name) {
            return Err(EnvError::InvalidInput(format!("invalid name {name:?}")));
        }
        Ok(())
    }

    pub fn value(&self, value: &str) -> EnvResult<()> {
        if value.is_empty() || value.len() > self.max_value_len {
            return Err(EnvError::InvalidInput(format!(
                "value must be 1 to {} bytes",
                self.max_value_len
            )));
        }
        Ok(())
    }

    pub fn desc(&self, desc: Option<&str>) -> EnvResult<()> {
        match desc {
            Some(d) if d.chars().count() > self.max_desc_len => Err(EnvError::InvalidInput(
                format!("description longer than {} characters", self.max_desc_len),
            )),
            _ => Ok(()),
        }
    }
}
