//! Chat server configuration.
//!
//! Everything comes from the environment: `WAVESOCK_HOST`,
//! `WAVESOCK_PORT`, `WAVESOCK_BUFFER_SIZE` and `WAVESOCK_HISTORY_LIMIT`,
//! each falling back to a default when unset or unparseable.

use wavesock_server::DEFAULT_BUFFER_SIZE;

/// Runtime settings for the chat binary.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub host: String,
    pub port: u16,
    pub buffer_size: usize,
    /// How many messages the shared history keeps.
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 2593,
            buffer_size: DEFAULT_BUFFER_SIZE,
            history_limit: 25,
        }
    }
}

impl ChatConfig {
    /// Reads settings from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("WAVESOCK_HOST").unwrap_or(defaults.host),
            port: parsed("WAVESOCK_PORT").unwrap_or(defaults.port),
            buffer_size: parsed("WAVESOCK_BUFFER_SIZE").unwrap_or(defaults.buffer_size),
            history_limit: parsed("WAVESOCK_HISTORY_LIMIT").unwrap_or(defaults.history_limit),
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_chat_setup() {
        let config = ChatConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 2593);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.history_limit, 25);
    }

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        // SAFETY: the only test touching this variable.
        unsafe { std::env::set_var("WAVESOCK_TEST_PORT", "not-a-port") };
        assert_eq!(parsed::<u16>("WAVESOCK_TEST_PORT"), None);

        unsafe { std::env::set_var("WAVESOCK_TEST_PORT", "2593") };
        assert_eq!(parsed::<u16>("WAVESOCK_TEST_PORT"), Some(2593));
    }
}
