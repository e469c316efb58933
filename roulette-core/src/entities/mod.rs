pub mod exclusion;
pub mod icebreaker;
pub mod matching_round;
pub mod notification_task;
pub mod pairing;
pub mod participant;
pub mod system_setting;

use roulette_sdk::objects::{
    NotificationChannel as SdkNotificationChannel, NotificationStatus as SdkNotificationStatus,
    NotificationType as SdkNotificationType, PairingStatus as SdkPairingStatus,
    RoundSource as SdkRoundSource, RoundStatus as SdkRoundStatus,
    SeniorityLevel as SdkSeniorityLevel,
};

/// Seniority tier for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `roulette_sdk::objects::SeniorityLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "seniority_level")]
pub enum SeniorityLevel {
    Junior,
    Mid,
    Senior,
    Lead,
    Executive,
}

/// Which partners a participant is willing to be matched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "matching_preference")]
pub enum MatchingPreference {
    #[default]
    Any,
    CrossDepartmentOnly,
    SameDepartmentOnly,
    CrossSeniorityOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "round_status")]
pub enum RoundStatus {
    Scheduled,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "round_source")]
pub enum RoundSource {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "pairing_status")]
pub enum PairingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "notification_type")]
pub enum NotificationType {
    Welcome,
    Pairing,
    Reminder,
    FeedbackRequest,
    AdminAlert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "notification_channel")]
pub enum NotificationChannel {
    Email,
    Teams,
    Both,
}

/// Lifecycle of a queued notification. `Sending` marks a task claimed by a
/// dispatcher pass and guards it against concurrent delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "notification_status")]
pub enum NotificationStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl From<SeniorityLevel> for SdkSeniorityLevel {
    fn from(value: SeniorityLevel) -> Self {
        match value {
            SeniorityLevel::Junior => SdkSeniorityLevel::Junior,
            SeniorityLevel::Mid => SdkSeniorityLevel::Mid,
            SeniorityLevel::Senior => SdkSeniorityLevel::Senior,
            SeniorityLevel::Lead => SdkSeniorityLevel::Lead,
            SeniorityLevel::Executive => SdkSeniorityLevel::Executive,
        }
    }
}

impl From<SdkSeniorityLevel> for SeniorityLevel {
    fn from(value: SdkSeniorityLevel) -> Self {
        match value {
            SdkSeniorityLevel::Junior => SeniorityLevel::Junior,
            SdkSeniorityLevel::Mid => SeniorityLevel::Mid,
            SdkSeniorityLevel::Senior => SeniorityLevel::Senior,
            SdkSeniorityLevel::Lead => SeniorityLevel::Lead,
            SdkSeniorityLevel::Executive => SeniorityLevel::Executive,
        }
    }
}

impl From<RoundStatus> for SdkRoundStatus {
    fn from(value: RoundStatus) -> Self {
        match value {
            RoundStatus::Scheduled => SdkRoundStatus::Scheduled,
            RoundStatus::InProgress => SdkRoundStatus::InProgress,
            RoundStatus::Completed => SdkRoundStatus::Completed,
            RoundStatus::Failed => SdkRoundStatus::Failed,
        }
    }
}

impl From<RoundSource> for SdkRoundSource {
    fn from(value: RoundSource) -> Self {
        match value {
            RoundSource::Scheduled => SdkRoundSource::Scheduled,
            RoundSource::Manual => SdkRoundSource::Manual,
        }
    }
}

impl From<PairingStatus> for SdkPairingStatus {
    fn from(value: PairingStatus) -> Self {
        match value {
            PairingStatus::Pending => SdkPairingStatus::Pending,
            PairingStatus::Confirmed => SdkPairingStatus::Confirmed,
            PairingStatus::Completed => SdkPairingStatus::Completed,
            PairingStatus::Cancelled => SdkPairingStatus::Cancelled,
        }
    }
}

impl From<NotificationType> for SdkNotificationType {
    fn from(value: NotificationType) -> Self {
        match value {
            NotificationType::Welcome => SdkNotificationType::Welcome,
            NotificationType::Pairing => SdkNotificationType::Pairing,
            NotificationType::Reminder => SdkNotificationType::Reminder,
            NotificationType::FeedbackRequest => SdkNotificationType::FeedbackRequest,
            NotificationType::AdminAlert => SdkNotificationType::AdminAlert,
        }
    }
}

impl From<NotificationChannel> for SdkNotificationChannel {
    fn from(value: NotificationChannel) -> Self {
        match value {
            NotificationChannel::Email => SdkNotificationChannel::Email,
            NotificationChannel::Teams => SdkNotificationChannel::Teams,
            NotificationChannel::Both => SdkNotificationChannel::Both,
        }
    }
}

impl From<SdkNotificationChannel> for NotificationChannel {
    fn from(value: SdkNotificationChannel) -> Self {
        match value {
            SdkNotificationChannel::Email => NotificationChannel::Email,
            SdkNotificationChannel::Teams => NotificationChannel::Teams,
            SdkNotificationChannel::Both => NotificationChannel::Both,
        }
    }
}

impl From<NotificationStatus> for SdkNotificationStatus {
    fn from(value: NotificationStatus) -> Self {
        match value {
            NotificationStatus::Pending => SdkNotificationStatus::Pending,
            NotificationStatus::Sending => SdkNotificationStatus::Sending,
            NotificationStatus::Sent => SdkNotificationStatus::Sent,
            NotificationStatus::Failed => SdkNotificationStatus::Failed,
        }
    }
}
