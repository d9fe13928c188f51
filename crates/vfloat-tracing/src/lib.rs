//! Logging setup shared by every binary that hosts the vfloat runtime.
//!
//! The dispatcher, the built-in backends and the loadable plugins all emit
//! `tracing` events. Whichever of them runs first installs the subscriber
//! through [`init_from_env`], so the runtime toggles behave the same way no
//! matter which shared object the host program loaded first:
//!
//! | Variable                       | Effect                                          |
//! |--------------------------------|-------------------------------------------------|
//! | `VFC_BACKENDS_LOGGER`          | logging stays on unless set to anything but `True` |
//! | `VFC_BACKENDS_COLORED_LOGGER`  | ANSI colours only when `True`                   |
//! | `VFLOAT_TRACING_DIRECTIVES`    | filter directives, before `RUST_LOG`            |
//! | `VFLOAT_TRACING_FORMAT`        | `compact`, `pretty` or `json`                   |
//! | `VFLOAT_TRACING_PROFILE`       | `local` (default) or `ci` preset                |
//!
//! The two `VFC_*` toggles compare against `True` case-insensitively.
//! Events always go to standard error; the instrumented program owns
//! standard output.

use std::env;
use std::error::Error;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Once;

use tracing::Subscriber;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

pub const LOGGER_ENV: &str = "VFC_BACKENDS_LOGGER";
pub const COLORED_LOGGER_ENV: &str = "VFC_BACKENDS_COLORED_LOGGER";
pub const DIRECTIVES_ENV: &str = "VFLOAT_TRACING_DIRECTIVES";
pub const FORMAT_ENV: &str = "VFLOAT_TRACING_FORMAT";
pub const PROFILE_ENV: &str = "VFLOAT_TRACING_PROFILE";

/// Directive used when neither explicit directives nor `RUST_LOG` apply.
const FALLBACK_DIRECTIVE: &str = "info";

/// How the runtime's subscriber is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracingConfig {
    /// A disabled logger installs the `off` filter, so events cost a single
    /// level check.
    pub enabled: bool,
    /// Filter directives; `None` defers to `RUST_LOG`, then to `info`.
    pub directives: Option<String>,
    /// Print event targets (`vfloat_dispatch::loader`, ...).
    pub include_targets: bool,
    pub ansi: bool,
    pub output: TracingOutput,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Compact plain text for interactive runs.
    pub fn for_local() -> Self {
        Self {
            enabled: true,
            directives: None,
            include_targets: false,
            ansi: false,
            output: TracingOutput::Compact,
        }
    }

    /// JSON lines with targets, for collected logs.
    pub fn for_ci() -> Self {
        Self {
            include_targets: true,
            output: TracingOutput::Json,
            ..Self::for_local()
        }
    }

    /// Start from the `VFLOAT_TRACING_PROFILE` preset and apply the other
    /// variables on top. Unparsable values leave the preset untouched.
    pub fn from_env() -> Self {
        let mut config = match env::var(PROFILE_ENV).as_deref().map(str::trim) {
            Ok(profile) if profile.eq_ignore_ascii_case("ci") => Self::for_ci(),
            _ => Self::for_local(),
        };

        if let Some(enabled) = runtime_toggle(LOGGER_ENV) {
            config.enabled = enabled;
        }
        if let Some(colored) = runtime_toggle(COLORED_LOGGER_ENV) {
            config.ansi = colored;
        }
        config.directives = env::var(DIRECTIVES_ENV)
            .ok()
            .filter(|directives| !directives.trim().is_empty())
            .or(config.directives);
        if let Some(output) = env::var(FORMAT_ENV).ok().and_then(|raw| raw.parse().ok()) {
            config.output = output;
        }

        config
    }

    fn filter(&self) -> Result<EnvFilter, TracingSetupError> {
        if !self.enabled {
            return Ok(EnvFilter::new("off"));
        }
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE))),
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = tracing_fmt::layer()
            .with_writer(io::stderr)
            .with_target(self.include_targets);
        match self.output {
            TracingOutput::Compact => Box::new(layer.compact().with_ansi(self.ansi)),
            TracingOutput::Pretty => Box::new(layer.pretty().with_ansi(self.ansi)),
            // Escape codes would corrupt the JSON.
            TracingOutput::Json => Box::new(layer.json().with_ansi(false)),
        }
    }
}

/// The runtime toggles are on only for `True`, in any case.
fn runtime_toggle(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| value.eq_ignore_ascii_case("true"))
}

/// Formatter layer flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl FromStr for TracingOutput {
    type Err = TracingSetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(TracingSetupError::UnknownFormat(s.to_string())),
        }
    }
}

/// Why the subscriber could not be installed.
#[derive(Debug)]
pub enum TracingSetupError {
    InvalidFilter(String),
    UnknownFormat(String),
    /// Another subscriber is already the global default, usually the host
    /// program's own.
    SubscriberInit(TryInitError),
}

impl fmt::Display for TracingSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TracingSetupError::InvalidFilter(msg) => write!(f, "invalid tracing directive: {msg}"),
            TracingSetupError::UnknownFormat(raw) => {
                write!(f, "unknown tracing format `{raw}` (expected compact, pretty or json)")
            }
            TracingSetupError::SubscriberInit(err) => write!(f, "cannot install the tracing subscriber: {err}"),
        }
    }
}

impl Error for TracingSetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TracingSetupError::SubscriberInit(err) => Some(err),
            _ => None,
        }
    }
}

/// Subscriber for `config`, not yet installed.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = config.filter()?;
    Ok(Registry::default().with(config.fmt_layer()).with(filter))
}

/// Install the subscriber for `config` as the global default.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    build_subscriber(config)?
        .try_init()
        .map_err(TracingSetupError::SubscriberInit)
}

static ENV_INIT: Once = Once::new();

/// Install the environment-configured subscriber once per process.
///
/// Losing the race against an existing subscriber is silent. Other failures
/// are printed to standard error, since logging is what failed.
pub fn init_from_env() {
    ENV_INIT.call_once(|| match init_global_tracing(&TracingConfig::from_env()) {
        Ok(()) | Err(TracingSetupError::SubscriberInit(_)) => {}
        Err(err) => eprintln!("vfloat: {err}"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_KEYS: &[&str] = &[PROFILE_ENV, LOGGER_ENV, COLORED_LOGGER_ENV, DIRECTIVES_ENV, FORMAT_ENV, "RUST_LOG"];

    fn clear_env() {
        for key in ALL_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn bad_directives_fail_only_when_enabled() {
        let mut config = TracingConfig {
            directives: Some("=::invalid".to_string()),
            ..TracingConfig::default()
        };
        assert!(matches!(build_subscriber(&config), Err(TracingSetupError::InvalidFilter(_))));

        config.enabled = false;
        assert!(build_subscriber(&config).is_ok());
    }

    #[test]
    fn unset_environment_gives_the_local_preset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let config = TracingConfig::from_env();
        assert_eq!(config, TracingConfig::for_local());
        assert!(build_subscriber(&config).is_ok());
    }

    #[test]
    fn runtime_toggles_need_true_in_any_case() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var(LOGGER_ENV, "False");
        env::set_var(COLORED_LOGGER_ENV, "True");
        let config = TracingConfig::from_env();
        assert!(!config.enabled);
        assert!(config.ansi);

        env::set_var(LOGGER_ENV, "TRUE");
        env::set_var(COLORED_LOGGER_ENV, "1");
        let config = TracingConfig::from_env();
        assert!(config.enabled);
        assert!(!config.ansi);

        clear_env();
    }

    #[test]
    fn ci_profile_can_be_overridden() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var(PROFILE_ENV, " CI ");
        assert_eq!(TracingConfig::from_env(), TracingConfig::for_ci());

        env::set_var(FORMAT_ENV, "compact");
        env::set_var(DIRECTIVES_ENV, "vfloat_dispatch=debug");
        env::set_var(COLORED_LOGGER_ENV, "True");
        let config = TracingConfig::from_env();
        assert_eq!(config.directives.as_deref(), Some("vfloat_dispatch=debug"));
        assert_eq!(config.output, TracingOutput::Compact);
        assert!(config.include_targets);
        assert!(config.ansi);

        clear_env();
    }

    #[test]
    fn output_formats_parse_loosely() {
        assert_eq!(" Pretty ".parse::<TracingOutput>().unwrap(), TracingOutput::Pretty);
        assert_eq!("JSON".parse::<TracingOutput>().unwrap(), TracingOutput::Json);
        assert!(matches!("yaml".parse::<TracingOutput>(), Err(TracingSetupError::UnknownFormat(_))));
    }
}
