//! Environment entry limits.

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_COUNT: usize = 100;
const DEFAULT_MAX_NAME_LEN: usize = 100;
const DEFAULT_MAX_VALUE_LEN: usize = 1000;
const DEFAULT_MAX_DESC_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub max_count_space_secret: usize,
    pub max_count_space_variable: usize,
    pub max_name_len: usize,
    /// In bytes.
    pub max_value_len: usize,
    /// In characters.
    pub max_desc_len: usize,
    /// HMAC key for the secret digests kept in the relational store. Empty
    /// means a random key per process, so unchanged-value detection does not
    /// survive a restart.
    pub secret_digest_key: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_count_space_secret: DEFAULT_MAX_COUNT,
            max_count_space_variable: DEFAULT_MAX_COUNT,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            max_desc_len: DEFAULT_MAX_DESC_LEN,
            secret_digest_key: String::new(),
        }
    }
}

impl EnvConfig {
    /// Replace zero limits with the defaults.
    pub fn set_default(&mut self) {
        let defaults = Self::default();
        for (value, default) in [
            (&mut self.max_count_space_secret, defaults.max_count_space_secret),
            (&mut self.max_count_space_variable, defaults.max_count_space_variable),
            (&mut self.max_name_len, defaults.max_name_len),
            (&mut self.max_value_len, defaults.max_value_len),
            (&mut self.max_desc_len, defaults.max_desc_len),
        ] {
            if *value == 0 {
                *value = default;
            }
        }
    }
}
