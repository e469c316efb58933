use crate::entities::{MatchingPreference, SeniorityLevel};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub chat_handle: Option<String>,
    pub department_id: Option<Uuid>,
    pub seniority: SeniorityLevel,
    pub matching_preference: MatchingPreference,
    pub is_vip: bool,
    pub is_active: bool,
    pub opted_in: bool,
    pub opted_in_at: Option<time::OffsetDateTime>,
    /// Waives the waiting period after opting in.
    pub skip_grace_period: bool,
    /// Temporarily unavailable until this date (inclusive start of availability).
    pub available_from: Option<time::Date>,
    /// Eligible even when the department is disabled for the program.
    pub department_exclusion_override: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub matching_enabled: bool,
}

/// Contact details the dispatcher needs to address a notification.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Recipient {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub chat_handle: Option<String>,
}

impl Participant {
    /// Active, opted-in participants. Eligibility is decided in memory by
    /// [`crate::matching::eligibility`].
    pub async fn list_opted_in(
        executor: impl sqlx::PgExecutor<'_>,
    ) -> Result<Vec<Participant>, sqlx::Error> {
        sqlx::query_as::<_, Participant>(
            r#"
            SELECT
                id,
                display_name,
                email,
                chat_handle,
                department_id,
                seniority,
                matching_preference,
                is_vip,
                is_active,
                opted_in,
                opted_in_at,
                skip_grace_period,
                available_from,
                department_exclusion_override
            FROM participants
            WHERE is_active = true AND opted_in = true
            ORDER BY id
            "#,
        )
        .fetch_all(executor)
        .await
    }
}

impl From<&Participant> for Recipient {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name.clone(),
            email: p.email.clone(),
            chat_handle: p.chat_handle.clone(),
        }
    }
}

impl Department {
    pub async fn list_all(
        executor: impl sqlx::PgExecutor<'_>,
    ) -> Result<Vec<Department>, sqlx::Error> {
        sqlx::query_as::<_, Department>(
            r#"
            SELECT id, name, matching_enabled
            FROM departments
            "#,
        )
        .fetch_all(executor)
        .await
    }
}

#[derive(Debug, Clone)]
/// Look up the contact details of a single participant.
pub struct GetRecipient {
    pub participant_id: Uuid,
}

impl Processor<GetRecipient> for DatabaseProcessor {
    type Output = Option<Recipient>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRecipient")]
    async fn process(&self, query: GetRecipient) -> Result<Option<Recipient>, sqlx::Error> {
        let recipient = sqlx::query_as::<_, Recipient>(
            r#"
            SELECT id, display_name, email, chat_handle
            FROM participants
            WHERE id = $1
            "#,
        )
        .bind(query.participant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(recipient)
    }
}
