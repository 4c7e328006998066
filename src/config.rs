//! Configuration loading for flaky-reporter.
//!
//! The whole configuration comes from `FLAKY_*` environment variables and is
//! read exactly once, at startup, into a [`RunConfiguration`]. Loading goes
//! through a lookup function so it can be exercised without touching the
//! real process environment.
//!
//! The variables are described in the README.

pub mod schema;

pub use schema::*;

use std::path::PathBuf;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("Error: {0} must be set.")]
    MissingVariable(&'static str),
}

/// Loads configuration from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError::MissingVariable`] if `FLAKY_RABBITMQ_URI`,
/// `FLAKY_RABBITMQ_USERNAME` or `FLAKY_RABBITMQ_PASSWORD` is unset or
/// contains only whitespace.
pub fn load_config() -> Result<RunConfiguration, ConfigError> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Loads configuration through an arbitrary variable lookup.
///
/// Optional variables default to an empty string (or `false` for
/// `FLAKY_IS_LAST_CONFIG`) when absent or unparseable. The broker
/// variables are checked first so nothing else is evaluated for an
/// unusable configuration.
///
/// # Arguments
///
/// * `lookup` - Returns the value of a variable, or `None` when unset
///
/// # Example
///
/// ```
/// use flaky_reporter::config::{load_config_from, ConfigError};
///
/// let err = load_config_from(|_| None).unwrap_err();
/// assert!(matches!(err, ConfigError::MissingVariable("FLAKY_RABBITMQ_URI")));
/// ```
pub fn load_config_from<F>(lookup: F) -> Result<RunConfiguration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &'static str| {
        let value = lookup(key).unwrap_or_default().trim().to_string();
        if value.is_empty() {
            Err(ConfigError::MissingVariable(key))
        } else {
            Ok(value)
        }
    };

    let broker = BrokerConfig {
        uri_template: required(ENV_RABBITMQ_URI)?,
        username: required(ENV_RABBITMQ_USERNAME)?,
        password: required(ENV_RABBITMQ_PASSWORD)?,
    };

    let optional = |key: &str| lookup(key).unwrap_or_default();

    let is_last_config = parse_bool(&optional(ENV_IS_LAST_CONFIG)).unwrap_or(false);

    let blocks = lookup(ENV_DISK_INPUT_LOAD)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_PRIME_BLOCKS);

    let app_path = optional(ENV_APP_PATH);
    let app_path = if app_path.is_empty() {
        PathBuf::new()
    } else {
        PathBuf::from(shellexpand::tilde(&app_path).into_owned())
    };

    Ok(RunConfiguration {
        app_path,
        test_run_cmd: optional(ENV_TEST_RUN_CMD),
        output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        metadata: RunMetadata {
            is_last_config,
            project_id: optional(ENV_PROJECT_ID),
            test_run_id: optional(ENV_TEST_RUN_ID),
            config_file: optional(ENV_CONFIG_FILE),
            scenario_configuration: optional(ENV_CONFIGURATION),
            test_method_name: optional(ENV_TEST_ID),
            number_of_scenarios: optional(ENV_SCENARIOS_NUMBER),
        },
        prime: PrimeConfig {
            blocks,
            ..PrimeConfig::default()
        },
        broker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(vars: &HashMap<String, String>) -> Result<RunConfiguration, ConfigError> {
        load_config_from(|key| vars.get(key).cloned())
    }

    fn broker_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_RABBITMQ_URI, "amqp://<username>:<password>@localhost:5672/"),
            (ENV_RABBITMQ_USERNAME, "guest"),
            (ENV_RABBITMQ_PASSWORD, "secret"),
        ]
    }

    #[test]
    fn test_load_full_environment() {
        let mut pairs = broker_vars();
        pairs.extend([
            (ENV_APP_PATH, "/srv/app"),
            (ENV_TEST_RUN_CMD, "./run-tests.sh"),
            (ENV_IS_LAST_CONFIG, "true"),
            (ENV_PROJECT_ID, "proj-1"),
            (ENV_TEST_RUN_ID, "run-7"),
            (ENV_CONFIG_FILE, "config.yml"),
            (ENV_CONFIGURATION, "cpu=2"),
            (ENV_TEST_ID, "FooTest#bar"),
            (ENV_SCENARIOS_NUMBER, "12"),
            (ENV_DISK_INPUT_LOAD, "16"),
        ]);
        let config = load(&env(&pairs)).unwrap();

        assert_eq!(config.app_path, PathBuf::from("/srv/app"));
        assert_eq!(config.test_run_cmd, "./run-tests.sh");
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(
            config.metadata,
            RunMetadata {
                is_last_config: true,
                project_id: "proj-1".into(),
                test_run_id: "run-7".into(),
                config_file: "config.yml".into(),
                scenario_configuration: "cpu=2".into(),
                test_method_name: "FooTest#bar".into(),
                number_of_scenarios: "12".into(),
            }
        );
        assert_eq!(config.prime.blocks, 16);
        assert_eq!(config.prime.block_size, DEFAULT_PRIME_BLOCK_SIZE);
        assert_eq!(config.broker.username, "guest");
        assert_eq!(config.broker.password, "secret");
    }

    #[test]
    fn test_optional_values_default_to_empty() {
        let config = load(&env(&broker_vars())).unwrap();

        assert_eq!(config.app_path, PathBuf::new());
        assert_eq!(config.test_run_cmd, "");
        assert_eq!(config.metadata, RunMetadata::default());
        assert_eq!(config.prime, PrimeConfig::default());
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let mut pairs = broker_vars();
        pairs.push((ENV_IS_LAST_CONFIG, "maybe"));
        pairs.push((ENV_DISK_INPUT_LOAD, "lots"));
        let config = load(&env(&pairs)).unwrap();

        assert!(!config.metadata.is_last_config);
        assert_eq!(config.prime.blocks, DEFAULT_PRIME_BLOCKS);
    }

    #[test]
    fn test_broker_values_are_trimmed() {
        let vars = env(&[
            (ENV_RABBITMQ_URI, "  amqp://<username>:<password>@h/ \n"),
            (ENV_RABBITMQ_USERNAME, " guest "),
            (ENV_RABBITMQ_PASSWORD, "\tsecret"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.broker.connection_uri(), "amqp://guest:secret@h/");
    }

    #[test]
    fn test_missing_broker_variable_is_named() {
        for missing in [ENV_RABBITMQ_URI, ENV_RABBITMQ_USERNAME, ENV_RABBITMQ_PASSWORD] {
            let vars: HashMap<_, _> = env(&broker_vars())
                .into_iter()
                .filter(|(k, _)| k != missing)
                .collect();
            let err = load(&vars).unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingVariable(name) if name == missing),
                "expected {missing} to be reported, got {err}"
            );
        }
    }

    #[test]
    fn test_whitespace_broker_variable_is_missing() {
        let mut vars = env(&broker_vars());
        vars.insert(ENV_RABBITMQ_PASSWORD.to_string(), "   ".to_string());
        let err = load(&vars).unwrap_err();

        assert_eq!(err.to_string(), "Error: FLAKY_RABBITMQ_PASSWORD must be set.");
    }
}
