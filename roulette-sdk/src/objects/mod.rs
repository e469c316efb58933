pub mod admin;
pub mod meeting;
pub mod notification;
pub mod status;

pub use admin::{
    ListFailedNotificationsQuery, NotificationTaskResponse, PairingResponse, ParticipantFilter,
    PreviewPairing, PreviewResponse, RecoverStaleRoundsResponse, RoundDetailResponse,
    RoundResponse, RoundRunResponse, RunRoundRequest, WelcomeResponse, clamp_pagination,
};
pub use meeting::{MeetingAttendee, MeetingBookingRequest, MeetingBookingResponse};
pub use notification::{RelayChannel, RelayPayload};
pub use status::{
    NotificationChannel, NotificationStatus, NotificationType, PairingStatus, RoundSource,
    RoundStatus, SeniorityLevel,
};
