//! Configuration layers and the resolved configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mirror_fs::io::{Ownership, RobustnessConfig, WriteOptions};
use mirror_fs::NormalizedPath;
use serde::{Deserialize, Serialize};

use crate::queue::DEFAULT_CAPACITY;
use crate::{Error, Result};

/// Default ledger file name, relative to the working directory.
pub const DEFAULT_LEDGER: &str = "treemirror-ledger.toml";

/// A setting that may be written as a number or as a string.
///
/// Modes written as strings are octal (`"0755"`); integers are raw mode bits,
/// so TOML's `0o755` literal works too. Durations written as integers are
/// seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(u64),
    Text(String),
}

impl fmt::Display for NumberOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberOrString::Number(n) => write!(f, "{n}"),
            NumberOrString::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for NumberOrString {
    fn from(value: &str) -> Self {
        NumberOrString::Text(value.to_string())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config {
                message: format!("unknown log format '{other}', expected 'text' or 'json'"),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// One configuration layer; unset keys fall through to earlier layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precheck: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<NumberOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_mode: Option<NumberOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_mode: Option<NumberOrString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_user_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir_group_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_user_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_group_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walk_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsync: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
}

macro_rules! overlay {
    ($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
        $(
            if $other.$field.is_some() {
                $self.$field = $other.$field;
            }
        )+
    };
}

impl PartialConfig {
    /// Built-in defaults, the bottom layer.
    pub fn defaults() -> Self {
        Self {
            root_dir: Some("/".to_string()),
            ledger: Some(PathBuf::from(DEFAULT_LEDGER)),
            dir_mode: Some("0777".into()),
            file_mode: Some("0666".into()),
            walk_capacity: Some(DEFAULT_CAPACITY),
            lock_timeout_ms: Some(5000),
            fsync: Some(true),
            log_level: Some("warn".to_string()),
            log_format: Some("text".to_string()),
            ..Self::default()
        }
    }

    /// Overlay `other` on top of `self`; keys set in `other` win.
    pub fn merge(&mut self, other: PartialConfig) {
        overlay!(
            self,
            other,
            source,
            destination,
            root_dir,
            ledger,
            precheck,
            repeat,
            dir_mode,
            file_mode,
            dir_user_id,
            dir_group_id,
            file_user_id,
            file_group_id,
            walk_capacity,
            lock_timeout_ms,
            fsync,
            log_level,
            log_format,
        );
    }
}

/// The fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub source: String,
    pub destination: PathBuf,
    pub root_dir: NormalizedPath,
    pub ledger: PathBuf,
    pub precheck: Option<PathBuf>,
    pub repeat: Option<Duration>,
    pub dir_mode: u32,
    pub file_mode: u32,
    pub dir_owner: Ownership,
    pub file_owner: Ownership,
    pub walk_capacity: usize,
    pub lock_timeout: Duration,
    pub fsync: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl SyncConfig {
    /// Modes, owners and durability for files written into the mirror.
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            fsync: self.fsync,
            file_mode: Some(self.file_mode),
            dir_mode: Some(self.dir_mode),
            file_owner: self.file_owner,
            dir_owner: self.dir_owner,
        }
    }

    /// Lock and fsync behavior for the ledger file.
    pub fn robustness(&self) -> RobustnessConfig {
        RobustnessConfig {
            lock_timeout: self.lock_timeout,
            enable_fsync: self.fsync,
        }
    }

    /// Render back into a single layer, in canonical notation.
    pub fn to_partial(&self) -> PartialConfig {
        PartialConfig {
            source: Some(self.source.clone()),
            destination: Some(self.destination.clone()),
            root_dir: Some(self.root_dir.to_string()),
            ledger: Some(self.ledger.clone()),
            precheck: self.precheck.clone(),
            repeat: self
                .repeat
                .map(|d| NumberOrString::Text(format!("{}s", d.as_secs()))),
            dir_mode: Some(NumberOrString::Text(format!("{:04o}", self.dir_mode))),
            file_mode: Some(NumberOrString::Text(format!("{:04o}", self.file_mode))),
            dir_user_id: self.dir_owner.uid,
            dir_group_id: self.dir_owner.gid,
            file_user_id: self.file_owner.uid,
            file_group_id: self.file_owner.gid,
            walk_capacity: Some(self.walk_capacity),
            lock_timeout_ms: Some(self.lock_timeout.as_millis() as u64),
            fsync: Some(self.fsync),
            log_level: Some(self.log_level.clone()),
            log_format: Some(self.log_format.to_string()),
        }
    }
}

impl TryFrom<PartialConfig> for SyncConfig {
    type Error = Error;

    fn try_from(layer: PartialConfig) -> Result<Self> {
        let source = required(layer.source, "source")?;
        let destination = required(layer.destination, "destination")?;

        let walk_capacity = layer.walk_capacity.unwrap_or(DEFAULT_CAPACITY);
        if walk_capacity == 0 {
            return Err(Error::Config {
                message: "walk_capacity must be at least 1".to_string(),
            });
        }

        Ok(Self {
            source,
            destination,
            root_dir: NormalizedPath::new(layer.root_dir.as_deref().unwrap_or("/")),
            ledger: layer.ledger.unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER)),
            precheck: layer.precheck,
            repeat: layer.repeat.as_ref().map(parse_duration_value).transpose()?,
            dir_mode: parse_mode(layer.dir_mode.as_ref().unwrap_or(&NumberOrString::Number(0o777)))?,
            file_mode: parse_mode(layer.file_mode.as_ref().unwrap_or(&NumberOrString::Number(0o666)))?,
            dir_owner: Ownership {
                uid: layer.dir_user_id,
                gid: layer.dir_group_id,
            },
            file_owner: Ownership {
                uid: layer.file_user_id,
                gid: layer.file_group_id,
            },
            walk_capacity,
            lock_timeout: Duration::from_millis(layer.lock_timeout_ms.unwrap_or(5000)),
            fsync: layer.fsync.unwrap_or(true),
            log_level: parse_level(layer.log_level.as_deref().unwrap_or("warn"))?,
            log_format: layer.log_format.as_deref().unwrap_or("text").parse()?,
        })
    }
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| Error::Config {
        message: format!("missing required setting '{key}'"),
    })
}

/// Parse an interval such as `90`, `30s`, `5m`, `2h` or `1d`.
///
/// Zero is rejected; a repeating schedule needs a positive interval.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = || Error::InvalidDuration {
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let (digits, unit) = match trimmed.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, "s"),
    };
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    let seconds = amount.checked_mul(multiplier).ok_or_else(invalid)?;
    if seconds == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(seconds))
}

fn parse_duration_value(value: &NumberOrString) -> Result<Duration> {
    match value {
        NumberOrString::Number(n) => parse_duration(&n.to_string()),
        NumberOrString::Text(s) => parse_duration(s),
    }
}

/// Parse a permission mode: octal text, or raw bits as an integer.
pub fn parse_mode(value: &NumberOrString) -> Result<u32> {
    let invalid = || Error::Config {
        message: format!("invalid mode '{value}', expected octal such as 0755"),
    };
    let mode = match value {
        NumberOrString::Number(n) => u32::try_from(*n).map_err(|_| invalid())?,
        NumberOrString::Text(s) => {
            let digits = s.trim().trim_start_matches("0o");
            u32::from_str_radix(digits, 8).map_err(|_| invalid())?
        }
    };
    if mode > 0o7777 {
        return Err(invalid());
    }
    Ok(mode)
}

/// Canonicalize a log level name; `warning` is accepted for `warn`.
pub fn parse_level(level: &str) -> Result<String> {
    match level.to_ascii_lowercase().as_str() {
        "warning" => Ok("warn".to_string()),
        lvl @ ("trace" | "debug" | "info" | "warn" | "error" | "off") => Ok(lvl.to_string()),
        other => Err(Error::Config {
            message: format!("unknown log level '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("90", 90)]
    #[case("30s", 30)]
    #[case("5m", 300)]
    #[case("2h", 7200)]
    #[case("1d", 86_400)]
    #[case(" 10s ", 10)]
    fn test_durations(#[case] input: &str, #[case] seconds: u64) {
        assert_eq!(parse_duration(input).unwrap(), Duration::from_secs(seconds));
    }

    #[rstest]
    #[case("")]
    #[case("0")]
    #[case("5x")]
    #[case("m")]
    #[case("1.5h")]
    fn test_bad_durations(#[case] input: &str) {
        assert!(matches!(parse_duration(input), Err(Error::InvalidDuration { .. })));
    }

    #[rstest]
    #[case(NumberOrString::from("0755"), 0o755)]
    #[case(NumberOrString::from("644"), 0o644)]
    #[case(NumberOrString::from("0o700"), 0o700)]
    #[case(NumberOrString::Number(0o600), 0o600)]
    fn test_modes(#[case] input: NumberOrString, #[case] expected: u32) {
        assert_eq!(parse_mode(&input).unwrap(), expected);
    }

    #[test]
    fn test_rejects_non_octal_mode() {
        assert!(parse_mode(&NumberOrString::from("0789")).is_err());
        assert!(parse_mode(&NumberOrString::Number(0o17777)).is_err());
    }

    #[test]
    fn test_later_layer_wins() {
        let mut base = PartialConfig::defaults();
        base.merge(PartialConfig {
            root_dir: Some("/media".into()),
            fsync: Some(false),
            ..PartialConfig::default()
        });

        assert_eq!(base.root_dir.as_deref(), Some("/media"));
        assert_eq!(base.fsync, Some(false));
        assert_eq!(base.walk_capacity, Some(DEFAULT_CAPACITY));
    }

    #[test]
    fn test_missing_source_is_config_error() {
        let err = SyncConfig::try_from(PartialConfig::defaults()).unwrap_err();
        assert!(err.to_string().contains("'source'"));
    }

    #[test]
    fn test_resolves_with_defaults() {
        let mut layer = PartialConfig::defaults();
        layer.merge(PartialConfig {
            source: Some("/srv/remote".into()),
            destination: Some("/srv/mirror".into()),
            log_level: Some("WARNING".into()),
            ..PartialConfig::default()
        });

        let config = SyncConfig::try_from(layer).unwrap();
        assert_eq!(config.root_dir, NormalizedPath::root());
        assert_eq!(config.dir_mode, 0o777);
        assert_eq!(config.file_mode, 0o666);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.repeat, None);
        assert_eq!(config.write_options().file_mode, Some(0o666));
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let layer = PartialConfig {
            source: Some("a".into()),
            destination: Some("b".into()),
            log_format: Some("xml".into()),
            ..PartialConfig::defaults()
        };
        assert!(SyncConfig::try_from(layer).is_err());
    }

    #[test]
    fn test_canonical_layer_round_trips() {
        let layer = PartialConfig {
            source: Some("/r".into()),
            destination: Some("/l".into()),
            repeat: Some("5m".into()),
            dir_mode: Some("0750".into()),
            ..PartialConfig::defaults()
        };
        let config = SyncConfig::try_from(layer).unwrap();

        let again = SyncConfig::try_from(config.to_partial()).unwrap();
        assert_eq!(again, config);
        assert_eq!(config.to_partial().repeat, Some(NumberOrString::from("300s")));
    }
}
