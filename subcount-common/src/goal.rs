//! Goal tracking policy
//!
//! Maps each freshly observed count to the next `(goal, previous_goal)` pair.
//! The goal only ever moves upward, always sits strictly above the last
//! observed value, and is always a multiple of the configured step.
//!
//! When a single observation crosses several step boundaries at once
//! (805 → 850 with step 10), only the goal that was active before the jump is
//! kept as `previous_goal`; intermediate boundaries are not remembered.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default increment between goal boundaries
pub const DEFAULT_GOAL_STEP: u64 = 10;

/// Default goal at startup
pub const DEFAULT_INITIAL_GOAL: u64 = 810;

/// Default previous goal at startup
pub const DEFAULT_INITIAL_PREVIOUS_GOAL: u64 = 800;

/// Goal state plus the step that defines valid goal boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalTracker {
    step: u64,
    goal: u64,
    previous_goal: u64,
}

/// Record of a goal moving up after an observation reached it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalAdvance {
    /// Goal that was reached (now the previous goal)
    pub reached: u64,
    /// New goal
    pub next: u64,
}

impl GoalTracker {
    /// Create a tracker, rejecting states that break the goal invariants
    pub fn new(step: u64, goal: u64, previous_goal: u64) -> Result<Self> {
        if step == 0 {
            return Err(Error::InvalidInput("goal step must be greater than zero".to_string()));
        }
        if goal % step != 0 {
            return Err(Error::InvalidInput(format!(
                "goal {} is not a multiple of step {}",
                goal, step
            )));
        }
        if previous_goal >= goal {
            return Err(Error::InvalidInput(format!(
                "previous goal {} must be below goal {}",
                previous_goal, goal
            )));
        }

        Ok(Self {
            step,
            goal,
            previous_goal,
        })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn goal(&self) -> u64 {
        self.goal
    }

    pub fn previous_goal(&self) -> u64 {
        self.previous_goal
    }

    /// Smallest multiple of `step` strictly greater than `value`
    ///
    /// Equivalent to `ceil((value + 1) / step) * step`. None when that
    /// boundary does not fit in a `u64`.
    pub fn next_boundary(step: u64, value: u64) -> Option<u64> {
        (value / step).checked_add(1)?.checked_mul(step)
    }

    /// Feed a newly observed value into the tracker
    ///
    /// Returns `Ok(Some(_))` when the value reached the current goal and the
    /// goal moved up; values below the goal leave the state untouched. A value
    /// with no representable goal above it is rejected and changes nothing.
    pub fn observe(&mut self, value: u64) -> Result<Option<GoalAdvance>> {
        if value < self.goal {
            return Ok(None);
        }

        let next = Self::next_boundary(self.step, value).ok_or_else(|| {
            Error::InvalidInput(format!(
                "value {} leaves no goal boundary above it (step {})",
                value, self.step
            ))
        })?;

        let reached = self.goal;
        self.previous_goal = reached;
        self.goal = next;

        Ok(Some(GoalAdvance { reached, next }))
    }
}

impl Default for GoalTracker {
    fn default() -> Self {
        Self {
            step: DEFAULT_GOAL_STEP,
            goal: DEFAULT_INITIAL_GOAL,
            previous_goal: DEFAULT_INITIAL_PREVIOUS_GOAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(goal: u64, previous_goal: u64) -> GoalTracker {
        GoalTracker::new(10, goal, previous_goal).unwrap()
    }

    #[test]
    fn test_value_above_goal_advances() {
        let mut t = tracker(810, 800);

        let advance = t.observe(815).unwrap();

        assert_eq!(advance, Some(GoalAdvance { reached: 810, next: 820 }));
        assert_eq!(t.goal(), 820);
        assert_eq!(t.previous_goal(), 810);
    }

    #[test]
    fn test_value_below_goal_is_ignored() {
        let mut t = tracker(810, 800);

        assert_eq!(t.observe(805).unwrap(), None);
        assert_eq!(t.goal(), 810);
        assert_eq!(t.previous_goal(), 800);
    }

    #[test]
    fn test_value_equal_to_goal_moves_to_next_boundary() {
        let mut t = tracker(810, 800);

        t.observe(810).unwrap();

        assert_eq!(t.goal(), 820);
        assert_eq!(t.previous_goal(), 810);
    }

    #[test]
    fn test_multi_step_jump_keeps_only_prior_goal() {
        let mut t = tracker(810, 800);

        t.observe(850).unwrap();

        assert_eq!(t.goal(), 860);
        assert_eq!(t.previous_goal(), 810);
    }

    #[test]
    fn test_goal_sequence_non_decreasing_and_aligned() {
        let mut t = tracker(810, 800);
        let mut last_goal = t.goal();

        for value in [0, 799, 810, 811, 819, 820, 845, 845, 900, 1234, 5000] {
            t.observe(value).unwrap();
            assert!(t.goal() >= last_goal);
            assert_eq!(t.goal() % t.step(), 0);
            assert!(t.goal() > value);
            assert!(t.previous_goal() < t.goal());
            last_goal = t.goal();
        }
    }

    #[test]
    fn test_next_boundary() {
        assert_eq!(GoalTracker::next_boundary(10, 0), Some(10));
        assert_eq!(GoalTracker::next_boundary(10, 9), Some(10));
        assert_eq!(GoalTracker::next_boundary(10, 10), Some(20));
        assert_eq!(GoalTracker::next_boundary(25, 99), Some(100));
        assert_eq!(GoalTracker::next_boundary(1, 41), Some(42));
        assert_eq!(GoalTracker::next_boundary(10, u64::MAX), None);
        assert_eq!(GoalTracker::next_boundary(1, u64::MAX - 1), Some(u64::MAX));
    }

    #[test]
    fn test_value_without_boundary_is_rejected() {
        let mut t = tracker(810, 800);
        t.observe(u64::MAX - 20).unwrap();
        let before = t;

        assert!(t.observe(u64::MAX - 3).is_err());
        assert!(t.observe(u64::MAX).is_err());

        assert_eq!(t, before);
        assert_eq!(t.goal() % t.step(), 0);
        assert!(t.previous_goal() < t.goal());
    }

    #[test]
    fn test_new_rejects_invalid_states() {
        assert!(GoalTracker::new(0, 810, 800).is_err());
        assert!(GoalTracker::new(10, 815, 800).is_err());
        assert!(GoalTracker::new(10, 810, 810).is_err());
        assert!(GoalTracker::new(10, 810, 900).is_err());
    }

    #[test]
    fn test_default_matches_constants() {
        let t = GoalTracker::default();
        assert_eq!(t.step(), DEFAULT_GOAL_STEP);
        assert_eq!(t.goal(), DEFAULT_INITIAL_GOAL);
        assert_eq!(t.previous_goal(), DEFAULT_INITIAL_PREVIOUS_GOAL);
    }
}
