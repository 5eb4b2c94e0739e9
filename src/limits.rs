//! Resource limits, checked cooperatively at the top of every iteration.

use std::time::Duration;

use derive_more::Display;

use crate::options::ConfigError;
use crate::options::Options;
use crate::search::SearchStats;
use crate::timer::Timer;

/// The reason a search gave up before finishing.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum Limit {
    #[display("expansions")]
    Expansions,
    #[display("generations")]
    Generations,
    #[display("time")]
    Time,
    #[display("memory")]
    Memory,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Limits {
    pub expansions: Option<u64>,
    pub generations: Option<u64>,
    pub time: Option<Duration>,
    /// Maximum live search nodes.
    pub nodes: Option<usize>,
}

impl Limits {
    /// Reads the `expd`, `gend`, `time` and `nodes` options.
    pub fn from_options(opts: &Options) -> Result<Self, ConfigError> {
        Ok(Self {
            expansions: opts.get("expd")?,
            generations: opts.get("gend")?,
            time: opts.seconds("time")?,
            nodes: opts.count("nodes")?.map(|n| n as usize),
        })
    }

    pub fn timer(&self) -> Timer {
        Timer::with_time_limit(self.time)
    }

    /// The first limit reached, if any.
    #[inline]
    pub fn check(&self, stats: &SearchStats, timer: &Timer) -> Option<Limit> {
        if self.expansions.is_some_and(|n| stats.expanded >= n) {
            return Some(Limit::Expansions);
        }
        if self.generations.is_some_and(|n| stats.generated >= n) {
            return Some(Limit::Generations);
        }
        if timer.check_time_limit() {
            return Some(Limit::Time);
        }
        None
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let show = |x: Option<String>| x.unwrap_or_else(|| "none".to_string());
        vec![
            ("expansion limit", show(self.expansions.map(|n| n.to_string()))),
            ("generation limit", show(self.generations.map(|n| n.to_string()))),
            ("time limit", show(self.time.map(|t| t.as_secs_f64().to_string()))),
            ("node limit", show(self.nodes.map(|n| n.to_string()))),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checks_counters() {
        let limits = Limits::from_options(&Options::new().with("expd", 10).with("gend", 100)).unwrap();
        let timer = limits.timer();
        let mut stats = SearchStats::default();
        assert_eq!(limits.check(&stats, &timer), None);

        stats.generated = 100;
        assert_eq!(limits.check(&stats, &timer), Some(Limit::Generations));
        stats.expanded = 10;
        assert_eq!(limits.check(&stats, &timer), Some(Limit::Expansions));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Limits::from_options(&Options::new().with("nodes", 0)).is_err());
        assert!(Limits::from_options(&Options::new().with("time", -1)).is_err());
        assert!(Limits::from_options(&Options::new().with("expd", "lots")).is_err());
        assert_eq!(Limit::Memory.to_string(), "memory");
    }
}
