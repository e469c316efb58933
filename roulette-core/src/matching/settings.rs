//! Runtime matching settings, read once per round.

use tracing::warn;

/// Key prefix shared by every matching setting in `system_settings`.
pub const SETTING_PREFIX: &str = "matching.";

pub const LOOKBACK_ROUNDS_KEY: &str = "matching.lookback_rounds";
pub const REPEAT_PENALTY_KEY: &str = "matching.repeat_penalty";
pub const CROSS_DEPARTMENT_WEIGHT_KEY: &str = "matching.cross_department_weight";
pub const CROSS_SENIORITY_WEIGHT_KEY: &str = "matching.cross_seniority_weight";
pub const GRACE_PERIOD_HOURS_KEY: &str = "matching.grace_period_hours";
pub const AUTO_SCHEDULE_MEETINGS_KEY: &str = "matching.auto_schedule_meetings";

/// Upper bound for `matching.grace_period_hours` (one hundred years).
pub const MAX_GRACE_PERIOD_HOURS: i64 = 24 * 365 * 100;

/// Immutable snapshot of the matching settings.
///
/// Built once at the start of a round and passed down to every step, so the
/// whole computation sees the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingSettings {
    /// How many recent completed rounds count as "recent history".
    pub lookback_rounds: i64,
    /// Subtracted once per recent co-occurrence of a pair.
    pub repeat_penalty: i64,
    pub cross_department_weight: i64,
    pub cross_seniority_weight: i64,
    /// Waiting period between opting in and the first eligible round.
    pub grace_period_hours: i64,
    pub auto_schedule_meetings: bool,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            lookback_rounds: 3,
            repeat_penalty: 50,
            cross_department_weight: 20,
            cross_seniority_weight: 10,
            grace_period_hours: 24,
            auto_schedule_meetings: false,
        }
    }
}

impl MatchingSettings {
    /// Build a snapshot from raw key/value rows.
    ///
    /// Unknown keys are ignored. Missing keys keep their default; values
    /// that fail to parse (or are negative where that makes no sense) keep
    /// their default and are logged.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();
        for (key, value) in pairs {
            let value = value.trim();
            match key {
                LOOKBACK_ROUNDS_KEY => {
                    apply_non_negative(key, value, &mut settings.lookback_rounds)
                }
                REPEAT_PENALTY_KEY => apply_non_negative(key, value, &mut settings.repeat_penalty),
                CROSS_DEPARTMENT_WEIGHT_KEY => {
                    apply_integer(key, value, &mut settings.cross_department_weight)
                }
                CROSS_SENIORITY_WEIGHT_KEY => {
                    apply_integer(key, value, &mut settings.cross_seniority_weight)
                }
                GRACE_PERIOD_HOURS_KEY => apply_bounded(
                    key,
                    value,
                    MAX_GRACE_PERIOD_HOURS,
                    &mut settings.grace_period_hours,
                ),
                AUTO_SCHEDULE_MEETINGS_KEY => match parse_bool(value) {
                    Some(flag) => settings.auto_schedule_meetings = flag,
                    None => warn!(key, value, "Invalid boolean setting, using default"),
                },
                _ => {}
            }
        }
        settings
    }

    pub fn grace_period(&self) -> time::Duration {
        time::Duration::hours(self.grace_period_hours.clamp(0, MAX_GRACE_PERIOD_HOURS))
    }
}

fn apply_integer(key: &str, value: &str, slot: &mut i64) {
    match value.parse::<i64>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value, "Invalid integer setting, using default"),
    }
}

fn apply_non_negative(key: &str, value: &str, slot: &mut i64) {
    match value.parse::<i64>() {
        Ok(parsed) if parsed >= 0 => *slot = parsed,
        _ => warn!(key, value, "Invalid non-negative setting, using default"),
    }
}

fn apply_bounded(key: &str, value: &str, max: i64, slot: &mut i64) {
    match value.parse::<i64>() {
        Ok(parsed) if (0..=max).contains(&parsed) => *slot = parsed,
        _ => warn!(key, value, max, "Setting out of range, using default"),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_uses_defaults() {
        let settings = MatchingSettings::from_pairs(std::iter::empty());
        assert_eq!(settings, MatchingSettings::default());
        assert_eq!(settings.grace_period(), time::Duration::hours(24));
    }

    #[test]
    fn test_overrides_known_keys() {
        let settings = MatchingSettings::from_pairs([
            ("matching.lookback_rounds", "6"),
            ("matching.repeat_penalty", " 80 "),
            ("matching.cross_department_weight", "-5"),
            ("matching.cross_seniority_weight", "0"),
            ("matching.grace_period_hours", "0"),
            ("matching.auto_schedule_meetings", "TRUE"),
            ("matching.unrelated", "whatever"),
        ]);
        assert_eq!(settings.lookback_rounds, 6);
        assert_eq!(settings.repeat_penalty, 80);
        assert_eq!(settings.cross_department_weight, -5);
        assert_eq!(settings.cross_seniority_weight, 0);
        assert_eq!(settings.grace_period_hours, 0);
        assert!(settings.auto_schedule_meetings);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = MatchingSettings::from_pairs([
            ("matching.lookback_rounds", "-1"),
            ("matching.repeat_penalty", "lots"),
            ("matching.auto_schedule_meetings", "maybe"),
        ]);
        let defaults = MatchingSettings::default();
        assert_eq!(settings.lookback_rounds, defaults.lookback_rounds);
        assert_eq!(settings.repeat_penalty, defaults.repeat_penalty);
        assert!(!settings.auto_schedule_meetings);
    }

    #[test]
    fn test_huge_grace_period_falls_back() {
        let settings =
            MatchingSettings::from_pairs([("matching.grace_period_hours", "9000000000000000")]);
        assert_eq!(settings.grace_period_hours, 24);
        assert_eq!(settings.grace_period(), time::Duration::hours(24));

        let at_limit = MatchingSettings::from_pairs([(
            "matching.grace_period_hours",
            MAX_GRACE_PERIOD_HOURS.to_string().as_str(),
        )]);
        assert_eq!(at_limit.grace_period_hours, MAX_GRACE_PERIOD_HOURS);
    }

    #[test]
    fn test_grace_period_clamps_hand_built_values() {
        let settings = MatchingSettings {
            grace_period_hours: i64::MAX,
            ..MatchingSettings::default()
        };
        assert_eq!(
            settings.grace_period(),
            time::Duration::hours(MAX_GRACE_PERIOD_HOURS)
        );
    }
}
