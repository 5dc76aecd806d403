//! Urgency classification of a domain's remaining registration time.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyClass {
    Past,
    Urgent,
    Soon,
    Recent,
    Ok,
}

impl UrgencyClass {
    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyClass::Past => "past",
            UrgencyClass::Urgent => "urgent",
            UrgencyClass::Soon => "soon",
            UrgencyClass::Recent => "recent",
            UrgencyClass::Ok => "ok",
        }
    }
}

impl fmt::Display for UrgencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day thresholds for the urgency buckets.
///
/// A domain is `urgent` below `urgent_days`, `soon` below `soon_days`, and
/// `recent` when it was updated fewer than `recent_days` ago. Setting
/// `recent_days` to `None` gives the three-bucket scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub urgent_days: i64,
    pub soon_days: i64,
    pub recent_days: Option<i64>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            urgent_days: 10,
            soon_days: 30,
            recent_days: Some(7),
        }
    }
}

impl Thresholds {
    pub fn three_bucket() -> Self {
        Self {
            recent_days: None,
            ..Self::default()
        }
    }

    pub fn classify(&self, days_left: i64, days_since_update: Option<i64>) -> UrgencyClass {
        if days_left < 0 {
            return UrgencyClass::Past;
        }
        if days_left < self.urgent_days {
            return UrgencyClass::Urgent;
        }
        if days_left < self.soon_days {
            return UrgencyClass::Soon;
        }
        match (self.recent_days, days_since_update) {
            (Some(recent), Some(since)) if since < recent => UrgencyClass::Recent,
            _ => UrgencyClass::Ok,
        }
    }
}

/// Classify with the default thresholds.
pub fn classify(days_left: i64, days_since_update: Option<i64>) -> UrgencyClass {
    Thresholds::default().classify(days_left, days_since_update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_days_are_past() {
        for days in [-1, -30, -10_000, i64::MIN] {
            assert_eq!(classify(days, None), UrgencyClass::Past);
            assert_eq!(classify(days, Some(0)), UrgencyClass::Past);
        }
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(classify(0, None), UrgencyClass::Urgent);
        assert_eq!(classify(9, None), UrgencyClass::Urgent);
        assert_eq!(classify(10, None), UrgencyClass::Soon);
        assert_eq!(classify(29, None), UrgencyClass::Soon);
        assert_eq!(classify(30, None), UrgencyClass::Ok);
        assert_eq!(classify(i64::MAX, None), UrgencyClass::Ok);
    }

    #[test]
    fn test_recent_update_only_applies_when_not_expiring() {
        assert_eq!(classify(200, Some(2)), UrgencyClass::Recent);
        assert_eq!(classify(200, Some(7)), UrgencyClass::Ok);
        assert_eq!(classify(5, Some(1)), UrgencyClass::Urgent);
        assert_eq!(
            Thresholds::three_bucket().classify(200, Some(1)),
            UrgencyClass::Ok
        );
    }

    #[test]
    fn test_labels_serialize_lowercase() {
        let json = serde_json::to_string(&UrgencyClass::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        assert_eq!(UrgencyClass::Recent.to_string(), "recent");
    }
}
