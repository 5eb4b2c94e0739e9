//! Flat `key=value` configuration shared by every algorithm.
//!
//! Options are kept as strings until an algorithm asks for them, so each
//! algorithm only validates what it uses. Errors are reported before any
//! search begins.
//!
//! ```
//! use hsearch::options::Options;
//!
//! let opts = Options::parse(["wt=1.5", "expd=1000"]).unwrap();
//! assert_eq!(opts.weight("wt").unwrap(), Some(1.5));
//! assert_eq!(opts.get::<u64>("expd").unwrap(), Some(1000));
//! assert!(opts.weight("gend").unwrap().is_none());
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Options understood by every algorithm.
pub const LIMIT_KEYS: &[&str] = &["expd", "gend", "time", "nodes"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed option {0:?}, expected key=value")]
    Malformed(String),
    #[error("missing required option {0:?}")]
    Missing(String),
    #[error("invalid value {value:?} for option {key:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("option {key:?}={value} is out of range, expected {expected}")]
    OutOfRange {
        key: String,
        value: String,
        expected: &'static str,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` strings. Later keys override earlier ones.
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut opts = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    opts.set(k.trim(), v.trim());
                }
                _ => return Err(ConfigError::Malformed(arg.to_string())),
            }
        }
        Ok(opts)
    }

    pub fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses an option, if present.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_str(key)
            .map(|v| {
                v.parse::<T>().map_err(|e| ConfigError::Invalid {
                    key: key.to_string(),
                    value: v.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    pub fn require<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)?
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// A finite weight of at least 1.
    pub fn weight(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.bounded(key, |w| w >= 1.0, "a finite number >= 1")
    }

    /// A finite non-negative number.
    pub fn non_negative(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.bounded(key, |x| x >= 0.0, "a finite number >= 0")
    }

    /// A finite positive number.
    pub fn positive(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.bounded(key, |x| x > 0.0, "a finite number > 0")
    }

    /// A positive integer count.
    pub fn count(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        let n = self.get::<u64>(key)?;
        if n == Some(0) {
            return Err(self.out_of_range(key, "an integer >= 1"));
        }
        Ok(n)
    }

    /// A non-negative number of seconds.
    pub fn seconds(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        let s = self.non_negative(key)?;
        s.map(|s| {
            Duration::try_from_secs_f64(s).map_err(|_| self.out_of_range(key, "a representable duration"))
        })
        .transpose()
    }

    /// `true`/`false`, also accepting `yes`/`no` and `1`/`0`.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get_str(key) {
            None => Ok(None),
            Some("true" | "yes" | "1") => Ok(Some(true)),
            Some("false" | "no" | "0") => Ok(Some(false)),
            Some(v) => Err(ConfigError::Invalid {
                key: key.to_string(),
                value: v.to_string(),
                reason: "expected true or false".to_string(),
            }),
        }
    }

    /// Logs options that neither `keys` nor the limits understand.
    pub fn warn_unknown(&self, algorithm: &str, keys: &[&str]) {
        for key in self.values.keys() {
            if !keys.contains(&key.as_str()) && !LIMIT_KEYS.contains(&key.as_str()) {
                log::warn!("{algorithm} ignores unknown option {key:?}");
            }
        }
    }

    fn bounded(
        &self,
        key: &str,
        ok: impl Fn(f64) -> bool,
        expected: &'static str,
    ) -> Result<Option<f64>, ConfigError> {
        match self.get::<f64>(key)? {
            Some(x) if !x.is_finite() || !ok(x) => Err(self.out_of_range(key, expected)),
            x => Ok(x),
        }
    }

    fn out_of_range(&self, key: &str, expected: &'static str) -> ConfigError {
        ConfigError::OutOfRange {
            key: key.to_string(),
            value: self.get_str(key).unwrap_or_default().to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing() {
        let opts = Options::parse(["wt=2", " depth = 10 ", "wt=3"]).unwrap();
        assert_eq!(opts.get_str("wt"), Some("3"));
        assert_eq!(opts.count("depth").unwrap(), Some(10));
        assert_eq!(opts.iter().count(), 2);

        assert_eq!(
            Options::parse(["wt"]),
            Err(ConfigError::Malformed("wt".to_string()))
        );
        assert_eq!(
            Options::parse(["=3"]),
            Err(ConfigError::Malformed("=3".to_string()))
        );
    }

    #[test]
    fn validation() {
        let opts = Options::new()
            .with("wt", 0.5)
            .with("dwt", "fast")
            .with("depth", 0)
            .with("steptime", "0.25")
            .with("reopen", "maybe")
            .with("exclroot", "yes");

        assert!(matches!(
            opts.weight("wt"),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            opts.positive("dwt"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            opts.count("depth"),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert_eq!(
            opts.seconds("steptime").unwrap(),
            Some(Duration::from_millis(250))
        );
        assert!(opts.flag("reopen").is_err());
        assert_eq!(opts.flag("exclroot").unwrap(), Some(true));
        assert_eq!(
            opts.require::<u32>("expd"),
            Err(ConfigError::Missing("expd".to_string()))
        );
        assert!(matches!(
            Options::new().with("wt", "inf").weight("wt"),
            Err(ConfigError::OutOfRange { .. })
        ));
    }
}
