//! Smart-start planning: picks where in a source video a clip should begin.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ShortreelError};

/// Tunables for smart-start selection.
///
/// The fallback constants have no derivation beyond "works for three minute
/// chunks"; they are kept as plain settings so they can be overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Earliest start as a fraction of the source duration.
    pub min_pct: f64,
    /// Latest end as a fraction of the source duration.
    pub max_pct: f64,
    /// Lower bound of the fallback window, in seconds.
    pub fallback_min_start: f64,
    /// The fallback upper bound never drops below this, in seconds.
    pub fallback_floor: f64,
    /// Seconds kept free at the end of the source in the fallback window.
    pub fallback_tail_margin: f64,
    /// Added to the requested clip length to absorb encoder rounding.
    pub padding_secs: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_pct: 0.10,
            max_pct: 0.80,
            fallback_min_start: 1.0,
            fallback_floor: 10.0,
            fallback_tail_margin: 5.0,
            padding_secs: 0.2,
        }
    }
}

impl PlannerConfig {
    /// Reject settings that cannot describe a window: non-finite values,
    /// percentages outside `[0, 1]` or out of order, negative seconds.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("min_pct", self.min_pct),
            ("max_pct", self.max_pct),
            ("fallback_min_start", self.fallback_min_start),
            ("fallback_floor", self.fallback_floor),
            ("fallback_tail_margin", self.fallback_tail_margin),
            ("padding_secs", self.padding_secs),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ShortreelError::Config(format!(
                    "smart_start.{name} must be a finite, non-negative number, got {value}"
                )));
            }
        }

        if self.min_pct > 1.0 || self.max_pct > 1.0 {
            return Err(ShortreelError::Config(
                "Smart start percentages must be between 0 and 1".to_string(),
            ));
        }
        if self.min_pct >= self.max_pct {
            return Err(ShortreelError::Config(format!(
                "Smart start min ({}) must be below max ({})",
                self.min_pct, self.max_pct
            )));
        }

        Ok(())
    }
}

/// Which window the start offset was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Primary,
    Fallback,
}

/// A cut window over a source timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: Duration,
    pub duration: Duration,
    pub window: Window,
}

impl Interval {
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntervalPlanner {
    config: PlannerConfig,
}

impl IntervalPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Compute the `[lo, hi]` window (in seconds) a start offset is drawn from.
    ///
    /// Fails only when the clip is longer than the source outright.
    pub fn window(&self, source: Duration, clip: Duration) -> Result<(f64, f64, Window)> {
        self.config.validate()?;

        let source_secs = source.as_secs_f64();
        let clip_secs = clip.as_secs_f64();

        if clip_secs > source_secs {
            return Err(ShortreelError::InfeasibleDuration {
                clip: clip_secs,
                source_duration: source_secs,
            });
        }

        let lo = source_secs * self.config.min_pct;
        let hi = source_secs * self.config.max_pct - clip_secs;
        if hi > lo {
            return Ok((lo, hi, Window::Primary));
        }

        let lo = self.config.fallback_min_start;
        let hi = self
            .config
            .fallback_floor
            .max(source_secs - clip_secs - self.config.fallback_tail_margin)
            .max(lo);
        Ok((lo, hi, Window::Fallback))
    }

    /// Pick a random cut window for a clip of `clip` length inside `source`.
    pub fn plan<R: Rng>(
        &self,
        source: Duration,
        clip: Duration,
        rng: &mut R,
    ) -> Result<Interval> {
        let (lo, hi, window) = self.window(source, clip)?;
        let start_secs = rng.gen_range(lo..=hi);

        debug!(
            "Smart start window {:?} [{:.2}, {:.2}] -> {:.2}s",
            window, lo, hi, start_secs
        );

        let out_of_range = |what: &str, secs: f64| {
            ShortreelError::Config(format!("Smart start {what} of {secs}s is out of range"))
        };
        let start = Duration::try_from_secs_f64(start_secs)
            .map_err(|_| out_of_range("offset", start_secs))?;
        let padding = Duration::try_from_secs_f64(self.config.padding_secs)
            .map_err(|_| out_of_range("padding", self.config.padding_secs))?;

        Ok(Interval {
            start,
            duration: clip.saturating_add(padding),
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_primary_window_bounds() {
        let planner = IntervalPlanner::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let interval = planner
                .plan(Duration::from_secs(180), Duration::from_secs(20), &mut rng)
                .unwrap();
            let start = interval.start.as_secs_f64();
            assert!(start >= 18.0 - EPS && start <= 126.0 + EPS, "start {start}");
            assert_eq!(interval.duration, Duration::from_millis(20_200));
            assert_eq!(interval.window, Window::Primary);
        }
    }

    #[test]
    fn test_fallback_window_when_primary_inverted() {
        let planner = IntervalPlanner::default();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..1000 {
            let interval = planner
                .plan(Duration::from_secs(180), Duration::from_secs(170), &mut rng)
                .unwrap();
            let start = interval.start.as_secs_f64();
            assert!(start >= 1.0 - EPS && start <= 10.0 + EPS, "start {start}");
            assert_eq!(interval.duration, Duration::from_millis(170_200));
            assert_eq!(interval.window, Window::Fallback);
        }
    }

    #[test]
    fn test_clip_longer_than_source_is_infeasible() {
        let planner = IntervalPlanner::default();
        let mut rng = StdRng::seed_from_u64(1);

        let result = planner.plan(Duration::from_secs(10), Duration::from_secs(20), &mut rng);
        assert!(matches!(
            result,
            Err(ShortreelError::InfeasibleDuration { .. })
        ));
    }

    #[test]
    fn test_clip_equal_to_source_uses_fallback() {
        let planner = IntervalPlanner::default();
        let (lo, hi, window) = planner
            .window(Duration::from_secs(30), Duration::from_secs(30))
            .unwrap();
        assert_eq!(window, Window::Fallback);
        assert_eq!(lo, 1.0);
        assert_eq!(hi, 10.0);
    }

    #[test]
    fn test_fallback_window_clamped_non_empty() {
        let planner = IntervalPlanner::new(PlannerConfig {
            fallback_min_start: 20.0,
            fallback_floor: 5.0,
            ..Default::default()
        });
        let (lo, hi, _) = planner
            .window(Duration::from_secs(60), Duration::from_secs(58))
            .unwrap();
        assert_eq!(lo, 20.0);
        assert_eq!(hi, 20.0);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let planner = IntervalPlanner::default();
        let a = planner
            .plan(
                Duration::from_secs(180),
                Duration::from_secs(30),
                &mut StdRng::seed_from_u64(99),
            )
            .unwrap();
        let b = planner
            .plan(
                Duration::from_secs(180),
                Duration::from_secs(30),
                &mut StdRng::seed_from_u64(99),
            )
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_finite_settings_are_rejected() {
        let mut rng = StdRng::seed_from_u64(5);
        let broken = [
            PlannerConfig { fallback_floor: f64::NAN, ..Default::default() },
            PlannerConfig { fallback_min_start: f64::INFINITY, ..Default::default() },
            PlannerConfig { fallback_tail_margin: f64::NEG_INFINITY, ..Default::default() },
            PlannerConfig { padding_secs: f64::INFINITY, ..Default::default() },
            PlannerConfig { min_pct: f64::NAN, ..Default::default() },
        ];

        for config in broken {
            let planner = IntervalPlanner::new(config);
            // Long clip forces the fallback window, where most of these apply
            let result = planner.plan(Duration::from_secs(180), Duration::from_secs(170), &mut rng);
            assert!(matches!(result, Err(ShortreelError::Config(_))), "{:?}", planner.config());
        }
    }

    #[test]
    fn test_huge_fallback_start_is_an_error_not_a_panic() {
        let planner = IntervalPlanner::new(PlannerConfig {
            fallback_min_start: 1e30,
            ..Default::default()
        });
        let result = planner.plan(
            Duration::from_secs(180),
            Duration::from_secs(170),
            &mut StdRng::seed_from_u64(5),
        );
        assert!(matches!(result, Err(ShortreelError::Config(_))));
    }

    #[test]
    fn test_validate_percentages() {
        let inverted = PlannerConfig { min_pct: 0.9, max_pct: 0.5, ..Default::default() };
        assert!(inverted.validate().is_err());
        let too_big = PlannerConfig { max_pct: 1.5, ..Default::default() };
        assert!(too_big.validate().is_err());
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_custom_padding() {
        let planner = IntervalPlanner::new(PlannerConfig {
            padding_secs: 0.5,
            ..Default::default()
        });
        let interval = planner
            .plan(
                Duration::from_secs(180),
                Duration::from_secs(20),
                &mut StdRng::seed_from_u64(3),
            )
            .unwrap();
        assert_eq!(interval.duration, Duration::from_millis(20_500));
    }
}
