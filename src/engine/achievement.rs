use crate::engine::period::Quarter;
use serde::{Deserialize, Serialize};

const ON_TRACK_THRESHOLD: f64 = 95.0;
const AT_RISK_THRESHOLD: f64 = 80.0;
const BEHIND_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementStatus {
    OnTrack,
    AtRisk,
    Behind,
    Pending,
}

impl AchievementStatus {
    pub const ALL: [AchievementStatus; 4] = [
        AchievementStatus::OnTrack,
        AchievementStatus::AtRisk,
        AchievementStatus::Behind,
        AchievementStatus::Pending,
    ];

    pub fn classify(achievement: f64) -> AchievementStatus {
        if achievement >= ON_TRACK_THRESHOLD {
            AchievementStatus::OnTrack
        } else if achievement >= AT_RISK_THRESHOLD {
            AchievementStatus::AtRisk
        } else if achievement >= BEHIND_THRESHOLD {
            AchievementStatus::Behind
        } else {
            AchievementStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementStatus::OnTrack => "on_track",
            AchievementStatus::AtRisk => "at_risk",
            AchievementStatus::Behind => "behind",
            AchievementStatus::Pending => "pending",
        }
    }
}

/// `value / target * 100`, or `0` when there is no value or no positive target.
///
/// Not clamped: over-achievement above 100 is a valid result.
pub fn per_period_progress(value: Option<f64>, target: f64) -> f64 {
    match value {
        Some(value) if target > 0.0 && value.is_finite() && target.is_finite() => {
            (value / target) * 100.0
        }
        _ => 0.0,
    }
}

/// Width for a progress bar, in percent.
pub fn progress_bar_width(progress: f64) -> f64 {
    if !progress.is_finite() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

/// The highest quarter that has a realized value.
pub fn latest_realized(values: &[Option<f64>; 4]) -> Option<(Quarter, f64)> {
    Quarter::ALL
        .iter()
        .rev()
        .find_map(|quarter| values[quarter.index()].map(|value| (*quarter, value)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualAchievement {
    pub achievement: f64,
    pub latest_quarter: Option<Quarter>,
}

/// Achievement for the year: the latest realized quarter against the annual target.
///
/// Not an average of quarters; TW1 = 50 and TW3 = 70 against 100 gives 70.
pub fn annual_achievement(values: &[Option<f64>; 4], annual_target: f64) -> AnnualAchievement {
    match latest_realized(values) {
        Some((quarter, value)) => AnnualAchievement {
            achievement: per_period_progress(Some(value), annual_target),
            latest_quarter: Some(quarter),
        },
        None => AnnualAchievement {
            achievement: 0.0,
            latest_quarter: None,
        },
    }
}

/// `obstacle_reported`: any realization in the series has a non-blank obstacle.
pub fn has_issues(obstacle_reported: bool, achievement: f64) -> bool {
    obstacle_reported || achievement < 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_period_progress() {
        assert_eq!(per_period_progress(Some(90.0), 100.0), 90.0);
        assert_eq!(per_period_progress(Some(150.0), 100.0), 150.0);
        assert_eq!(per_period_progress(None, 100.0), 0.0);
    }

    #[test]
    fn test_zero_target_never_divides() {
        for value in [0.0, 12.5, -3.0, 1e9] {
            let progress = per_period_progress(Some(value), 0.0);
            assert_eq!(progress, 0.0);
            assert!(progress.is_finite());
        }
        assert_eq!(per_period_progress(Some(10.0), -5.0), 0.0);
    }

    #[test]
    fn test_progress_bar_width_clamps() {
        assert_eq!(progress_bar_width(150.0), 100.0);
        assert_eq!(progress_bar_width(-20.0), 0.0);
        assert_eq!(progress_bar_width(42.0), 42.0);
        assert_eq!(progress_bar_width(f64::NAN), 0.0);
    }

    #[test]
    fn test_annual_achievement_uses_latest_quarter() {
        let values = [Some(50.0), None, Some(70.0), None];
        let annual = annual_achievement(&values, 100.0);
        assert_eq!(annual.achievement, 70.0);
        assert_eq!(annual.latest_quarter, Some(Quarter::Tw3));
    }

    #[test]
    fn test_annual_achievement_without_values() {
        let annual = annual_achievement(&[None; 4], 100.0);
        assert_eq!(annual.achievement, 0.0);
        assert_eq!(annual.latest_quarter, None);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(AchievementStatus::classify(95.0), AchievementStatus::OnTrack);
        assert_eq!(AchievementStatus::classify(94.9), AchievementStatus::AtRisk);
        assert_eq!(AchievementStatus::classify(80.0), AchievementStatus::AtRisk);
        assert_eq!(AchievementStatus::classify(79.9), AchievementStatus::Behind);
        assert_eq!(AchievementStatus::classify(60.0), AchievementStatus::Behind);
        assert_eq!(AchievementStatus::classify(59.9), AchievementStatus::Pending);
        assert_eq!(AchievementStatus::classify(120.0).as_str(), "on_track");
    }

    #[test]
    fn test_has_issues() {
        assert!(has_issues(false, 80.0));
        assert!(has_issues(true, 105.0));
        assert!(!has_issues(false, 100.0));
    }
}
