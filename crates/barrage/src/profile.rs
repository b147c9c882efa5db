//! Load profiles: named test types mapped to executor stage plans.
//!
//! Profiles live in a static table. Adding a profile means adding a table
//! entry; the scheduler only ever sees the resulting [`ExecutorSpec`].

use crate::result::{BarrageError, BarrageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Named load profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// One user for a few seconds: is the endpoint alive at all?
    Smoke,
    /// Ramp to the expected peak and hold it
    Load,
    /// Escalate past the expected peak
    Stress,
    /// Short bursts well above peak
    Spike,
    /// Sustained sub-peak load for an hour
    Soak,
}

impl TestType {
    /// All profiles, in menu order
    pub const ALL: [Self; 5] = [Self::Smoke, Self::Load, Self::Stress, Self::Spike, Self::Soak];

    /// Lowercase profile name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Load => "load",
            Self::Stress => "stress",
            Self::Spike => "spike",
            Self::Soak => "soak",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = BarrageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smoke" => Ok(Self::Smoke),
            "load" => Ok(Self::Load),
            "stress" => Ok(Self::Stress),
            "spike" => Ok(Self::Spike),
            "soak" => Ok(Self::Soak),
            other => Err(BarrageError::config(format!(
                "unknown test type '{other}' (expected one of smoke, load, stress, spike, soak)"
            ))),
        }
    }
}

/// How the executor holds its population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Fixed concurrency for a fixed duration
    Constant,
    /// Concurrency interpolated linearly between stage targets
    Ramping,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant => write!(f, "constant-vus"),
            Self::Ramping => write!(f, "ramping-vus"),
        }
    }
}

/// A stage in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Duration in seconds
    pub duration_secs: u64,
    /// Concurrency reached at the end of the stage
    pub target: u32,
}

impl Stage {
    /// Create a stage
    #[must_use]
    pub const fn new(duration_secs: u64, target: u32) -> Self {
        Self {
            duration_secs,
            target,
        }
    }

    /// Stage duration
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Executor kind plus its ordered stage plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSpec {
    /// Executor kind
    pub kind: ExecutorKind,
    /// Ordered stages; a constant executor has exactly one
    pub stages: Vec<Stage>,
}

impl ExecutorSpec {
    /// A constant executor
    #[must_use]
    pub fn constant(vus: u32, duration_secs: u64) -> Self {
        Self {
            kind: ExecutorKind::Constant,
            stages: vec![Stage::new(duration_secs, vus)],
        }
    }

    /// A ramping executor over the given stages
    #[must_use]
    pub fn ramping(stages: Vec<Stage>) -> Self {
        Self {
            kind: ExecutorKind::Ramping,
            stages,
        }
    }

    /// Sum of stage durations: the run deadline.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Duration::from_secs(
            self.stages
                .iter()
                .fold(0u64, |total, s| total.saturating_add(s.duration_secs)),
        )
    }

    /// Highest target anywhere in the plan
    #[must_use]
    pub fn max_target(&self) -> u32 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Target concurrency at `elapsed` into the run.
    ///
    /// Ramping plans start from zero and interpolate linearly towards each
    /// stage's target, rounding to the nearest integer. At a stage boundary
    /// the result is exactly that stage's target.
    #[must_use]
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        match self.kind {
            ExecutorKind::Constant => self.stages.first().map_or(0, |s| s.target),
            ExecutorKind::Ramping => {
                let elapsed = elapsed.as_secs_f64();
                let mut stage_start = 0u64;
                let mut previous = 0u32;

                for stage in &self.stages {
                    let stage_end = stage_start.saturating_add(stage.duration_secs);
                    if elapsed <= stage_end as f64 {
                        if stage.duration_secs == 0 {
                            return stage.target;
                        }
                        let progress =
                            ((elapsed - stage_start as f64) / stage.duration_secs as f64).max(0.0);
                        let range = f64::from(stage.target) - f64::from(previous);
                        return (f64::from(previous) + range * progress).round() as u32;
                    }
                    stage_start = stage_end;
                    previous = stage.target;
                }

                previous
            }
        }
    }
}

impl fmt::Display for ExecutorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "executor: {} ({} total)",
            self.kind,
            format_duration(self.total_duration())
        )?;
        let mut offset = 0u64;
        for (i, stage) in self.stages.iter().enumerate() {
            let end = offset.saturating_add(stage.duration_secs);
            writeln!(
                f,
                "  stage {}: {:>6} -> {:>4} VUs  (t={}..{})",
                i + 1,
                format_duration(stage.duration()),
                stage.target,
                format_duration(Duration::from_secs(offset)),
                format_duration(Duration::from_secs(end)),
            )?;
            offset = end;
        }
        Ok(())
    }
}

/// Format a duration the way k6 does (`1h0m0s`, `2m30s`, `10s`)
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

// =============================================================================
// Profile table
// =============================================================================

/// Concurrency of a stage relative to the configured peak
#[derive(Debug, Clone, Copy)]
enum Concurrency {
    /// Independent of the peak
    Fixed(u32),
    /// `peak * num / den`, rounded half up
    Scaled { num: u64, den: u64 },
}

impl Concurrency {
    const fn of_peak(num: u64, den: u64) -> Self {
        Self::Scaled { num, den }
    }

    fn resolve(self, peak: u32) -> u32 {
        match self {
            Self::Fixed(vus) => vus,
            Self::Scaled { num, den } => {
                let scaled = (u64::from(peak) * num + den / 2) / den;
                u32::try_from(scaled).unwrap_or(u32::MAX)
            }
        }
    }
}

#[derive(Debug)]
struct ProfileEntry {
    test_type: TestType,
    kind: ExecutorKind,
    stages: &'static [(u64, Concurrency)],
}

const MINUTE: u64 = 60;

const PEAK: Concurrency = Concurrency::of_peak(1, 1);
const ZERO: Concurrency = Concurrency::Fixed(0);
const ONE_AND_HALF: Concurrency = Concurrency::of_peak(3, 2);
const DOUBLE: Concurrency = Concurrency::of_peak(2, 1);
const QUARTER: Concurrency = Concurrency::of_peak(1, 4);
const TWO_AND_HALF: Concurrency = Concurrency::of_peak(5, 2);

static PROFILES: [ProfileEntry; 5] = [
    ProfileEntry {
        test_type: TestType::Smoke,
        kind: ExecutorKind::Constant,
        stages: &[(10, Concurrency::Fixed(1))],
    },
    ProfileEntry {
        test_type: TestType::Load,
        kind: ExecutorKind::Ramping,
        stages: &[(2 * MINUTE, PEAK), (5 * MINUTE, PEAK), (MINUTE, ZERO)],
    },
    ProfileEntry {
        test_type: TestType::Stress,
        kind: ExecutorKind::Ramping,
        stages: &[
            (2 * MINUTE, PEAK),
            (3 * MINUTE, PEAK),
            (2 * MINUTE, ONE_AND_HALF),
            (3 * MINUTE, ONE_AND_HALF),
            (2 * MINUTE, DOUBLE),
            (3 * MINUTE, DOUBLE),
            (5 * MINUTE, ZERO),
        ],
    },
    ProfileEntry {
        test_type: TestType::Spike,
        kind: ExecutorKind::Ramping,
        stages: &[
            (MINUTE, QUARTER),
            (2 * MINUTE, QUARTER),
            (10, TWO_AND_HALF),
            (2 * MINUTE, TWO_AND_HALF),
            (10, QUARTER),
            (2 * MINUTE, QUARTER),
            (10, ZERO),
        ],
    },
    ProfileEntry {
        test_type: TestType::Soak,
        kind: ExecutorKind::Constant,
        stages: &[(60 * MINUTE, Concurrency::of_peak(4, 5))],
    },
];

/// Derive the executor plan for a profile at the given peak concurrency.
#[must_use]
pub fn derive_plan(test_type: TestType, peak: u32) -> ExecutorSpec {
    let entry = PROFILES
        .iter()
        .find(|p| p.test_type == test_type)
        .unwrap_or(&PROFILES[0]);

    ExecutorSpec {
        kind: entry.kind,
        stages: entry
            .stages
            .iter()
            .map(|(secs, concurrency)| Stage::new(*secs, concurrency.resolve(peak)))
            .collect(),
    }
}

/// Parse a profile name and derive its plan in one step.
pub fn derive_plan_named(name: &str, peak: u32) -> BarrageResult<ExecutorSpec> {
    Ok(derive_plan(name.parse()?, peak))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_test_type_has_a_profile() {
        for test_type in TestType::ALL {
            assert!(PROFILES.iter().any(|p| p.test_type == test_type));
        }
    }

    #[test]
    fn test_smoke_is_one_vu_for_ten_seconds() {
        let plan = derive_plan(TestType::Smoke, 50);
        assert_eq!(plan.kind, ExecutorKind::Constant);
        assert_eq!(plan.stages, vec![Stage::new(10, 1)]);
    }

    #[test]
    fn test_load_shape() {
        let plan = derive_plan(TestType::Load, 10);
        assert_eq!(plan.kind, ExecutorKind::Ramping);
        assert_eq!(
            plan.stages,
            vec![Stage::new(120, 10), Stage::new(300, 10), Stage::new(60, 0)]
        );
        assert_eq!(plan.total_duration(), Duration::from_secs(480));
    }

    #[test]
    fn test_stress_multipliers() {
        let plan = derive_plan(TestType::Stress, 5);
        let targets: Vec<u32> = plan.stages.iter().map(|s| s.target).collect();
        // 1.5 * 5 = 7.5 rounds half up
        assert_eq!(targets, vec![5, 5, 8, 8, 10, 10, 0]);
        assert_eq!(plan.total_duration(), Duration::from_secs(20 * 60));
    }

    #[test]
    fn test_spike_rounding() {
        let plan = derive_plan(TestType::Spike, 2);
        let targets: Vec<u32> = plan.stages.iter().map(|s| s.target).collect();
        // 0.25 * 2 = 0.5 -> 1, 2.5 * 2 = 5
        assert_eq!(targets, vec![1, 1, 5, 5, 1, 1, 0]);
        assert_eq!(plan.total_duration(), Duration::from_secs(7 * 60 + 30));
    }

    #[test]
    fn test_soak_rounds_eighty_percent() {
        assert_eq!(derive_plan(TestType::Soak, 10).stages[0].target, 8);
        assert_eq!(derive_plan(TestType::Soak, 1).stages[0].target, 1);
        assert_eq!(derive_plan(TestType::Soak, 3).stages[0].target, 2);
        let plan = derive_plan(TestType::Soak, 3);
        assert_eq!(plan.kind, ExecutorKind::Constant);
        assert_eq!(plan.total_duration(), Duration::from_secs(3600));
    }

    #[test]
    fn test_unknown_test_type_is_config_error() {
        let err = derive_plan_named("chaos", 10).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("chaos"));
    }

    #[test]
    fn test_test_type_parse_is_case_insensitive() {
        assert_eq!(" LOAD ".parse::<TestType>().unwrap(), TestType::Load);
        assert_eq!(TestType::Spike.to_string(), "spike");
    }

    #[test]
    fn test_target_at_stage_boundaries() {
        let plan = derive_plan(TestType::Load, 10);
        assert_eq!(plan.target_at(Duration::ZERO), 0);
        assert_eq!(plan.target_at(Duration::from_secs(60)), 5);
        assert_eq!(plan.target_at(Duration::from_secs(120)), 10);
        assert_eq!(plan.target_at(Duration::from_secs(300)), 10);
        assert_eq!(plan.target_at(Duration::from_secs(420)), 10);
        assert_eq!(plan.target_at(Duration::from_secs(450)), 5);
        assert_eq!(plan.target_at(Duration::from_secs(480)), 0);
        assert_eq!(plan.target_at(Duration::from_secs(1000)), 0);
    }

    #[test]
    fn test_target_at_zero_length_stage_jumps() {
        let plan = ExecutorSpec::ramping(vec![
            Stage::new(10, 4),
            Stage::new(0, 20),
            Stage::new(10, 20),
        ]);
        assert_eq!(plan.target_at(Duration::from_secs(10)), 4);
        assert_eq!(plan.target_at(Duration::from_millis(10_001)), 20);
    }

    #[test]
    fn test_constant_target_is_fixed() {
        let plan = ExecutorSpec::constant(7, 30);
        assert_eq!(plan.target_at(Duration::ZERO), 7);
        assert_eq!(plan.target_at(Duration::from_secs(29)), 7);
    }

    #[test]
    fn test_max_target() {
        assert_eq!(derive_plan(TestType::Spike, 4).max_target(), 10);
        assert_eq!(ExecutorSpec::ramping(Vec::new()).max_target(), 0);
    }

    #[test]
    fn test_huge_stage_durations_saturate() {
        let plan = ExecutorSpec::ramping(vec![Stage::new(u64::MAX, 10), Stage::new(u64::MAX, 0)]);
        assert_eq!(plan.total_duration(), Duration::from_secs(u64::MAX));
        assert_eq!(plan.target_at(Duration::from_secs(u64::MAX)), 10);
        assert!(plan.to_string().contains("stage 2"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(10)), "10s");
        assert_eq!(format_duration(Duration::from_secs(150)), "2m30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
    }

    #[test]
    fn test_plan_display() {
        let text = derive_plan(TestType::Load, 10).to_string();
        assert!(text.contains("ramping-vus"));
        assert!(text.contains("8m0s total"));
        assert!(text.contains("stage 3"));
    }

    #[test]
    fn test_plan_serializes() {
        let json = serde_json::to_string(&derive_plan(TestType::Smoke, 1)).unwrap();
        assert!(json.contains("\"kind\":\"constant\""));
        assert!(json.contains("\"duration_secs\":10"));
    }
}
