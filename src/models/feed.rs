use serde::{Deserialize, Serialize};

use super::PropertyValue;

/// The operational state of a feed.
///
/// A feed with no recorded state is treated as `Enabled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedState {
    #[default]
    Enabled,
    Disabled,
    Deleted,
}

impl FeedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::Deleted => "DELETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ENABLED" => Some(Self::Enabled),
            "DISABLED" => Some(Self::Disabled),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl PropertyValue for FeedState {
    fn to_property(&self) -> String {
        self.as_str().to_string()
    }

    fn from_property(raw: &str) -> Option<Self> {
        Self::from_str(raw)
    }
}

/// How a feed's schedule period is interpreted.
///
/// - `CronDriven`: the period is a cron expression
/// - `TimerDriven`: the period is a timer expression such as `5 min`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStrategy {
    CronDriven,
    TimerDriven,
}

impl ScheduleStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CronDriven => "CRON_DRIVEN",
            Self::TimerDriven => "TIMER_DRIVEN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CRON_DRIVEN" => Some(Self::CronDriven),
            "TIMER_DRIVEN" => Some(Self::TimerDriven),
            _ => None,
        }
    }
}

impl PropertyValue for ScheduleStrategy {
    fn to_property(&self) -> String {
        self.as_str().to_string()
    }

    fn from_property(raw: &str) -> Option<Self> {
        Self::from_str(raw)
    }
}

/// Input for provisioning a new feed under a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFeedInput {
    pub system_name: String,
    /// Display title. Defaults to the system name if not specified.
    pub title: Option<String>,
    pub description: Option<String>,
    /// Initial state. Defaults to `Enabled` if not specified.
    pub state: Option<FeedState>,
    pub schedule_period: Option<String>,
    pub schedule_strategy: Option<ScheduleStrategy>,
}

impl CreateFeedInput {
    pub fn named(system_name: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            title: None,
            description: None,
            state: None,
            schedule_period: None,
            schedule_strategy: None,
        }
    }
}
