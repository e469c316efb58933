use crate::entities::{RoundSource, RoundStatus};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use roulette_sdk::objects::ParticipantFilter;
use sqlx::types::Json;
use uuid::Uuid;

const ROUND_COLUMNS: &str = r#"
    id,
    scheduled_date,
    executed_at,
    status,
    source,
    participant_count,
    pairing_count,
    filter,
    ignore_recent_history,
    unpaired_participant_ids,
    error_message,
    created_at
"#;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MatchingRound {
    pub id: Uuid,
    pub scheduled_date: time::Date,
    pub executed_at: Option<time::OffsetDateTime>,
    pub status: RoundStatus,
    pub source: RoundSource,
    pub participant_count: i32,
    pub pairing_count: i32,
    pub filter: Option<Json<ParticipantFilter>>,
    pub ignore_recent_history: bool,
    pub unpaired_participant_ids: Vec<Uuid>,
    pub error_message: Option<String>,
    pub created_at: time::OffsetDateTime,
}

/// Data for opening a new round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRound {
    pub scheduled_date: time::Date,
    pub source: RoundSource,
    pub filter: Option<ParticipantFilter>,
    pub ignore_recent_history: bool,
}

/// Counts written when a round's unit of work completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundCompletion {
    pub participant_count: i32,
    pub pairing_count: i32,
    pub unpaired_participant_ids: Vec<Uuid>,
}

impl MatchingRound {
    /// Insert a round directly in `in_progress`.
    ///
    /// The partial unique index `matching_rounds_single_in_progress` makes
    /// this fail with a unique violation while another round is running.
    pub async fn insert_in_progress(
        executor: impl sqlx::PgExecutor<'_>,
        round: &NewRound,
    ) -> Result<MatchingRound, sqlx::Error> {
        Self::insert_with_status(executor, round, RoundStatus::InProgress).await
    }

    /// Insert a scratch round used by dry runs. It stays `scheduled` so it
    /// never collides with the in-progress index.
    pub async fn insert_scratch(
        executor: impl sqlx::PgExecutor<'_>,
        round: &NewRound,
    ) -> Result<MatchingRound, sqlx::Error> {
        Self::insert_with_status(executor, round, RoundStatus::Scheduled).await
    }

    async fn insert_with_status(
        executor: impl sqlx::PgExecutor<'_>,
        round: &NewRound,
        status: RoundStatus,
    ) -> Result<MatchingRound, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO matching_rounds
                (id, scheduled_date, executed_at, status, source, filter, ignore_recent_history)
            VALUES ($1, $2, NOW(), $3, $4, $5, $6)
            RETURNING {ROUND_COLUMNS}
            "#
        );
        sqlx::query_as::<_, MatchingRound>(&sql)
            .bind(Uuid::now_v7())
            .bind(round.scheduled_date)
            .bind(status)
            .bind(round.source)
            .bind(round.filter.clone().map(Json))
            .bind(round.ignore_recent_history)
            .fetch_one(executor)
            .await
    }

    /// Mark an in-progress round completed with its final counts.
    ///
    /// Returns the number of rows updated (0 if the round was not in progress).
    pub async fn complete(
        executor: impl sqlx::PgExecutor<'_>,
        round_id: Uuid,
        completion: &RoundCompletion,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE matching_rounds
            SET status = 'completed',
                participant_count = $2,
                pairing_count = $3,
                unpaired_participant_ids = $4,
                error_message = NULL
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(round_id)
        .bind(completion.participant_count)
        .bind(completion.pairing_count)
        .bind(&completion.unpaired_participant_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Open a round in `in_progress`.
pub struct StartMatchingRound {
    pub round: NewRound,
}

impl Processor<StartMatchingRound> for DatabaseProcessor {
    type Output = MatchingRound;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:StartMatchingRound")]
    async fn process(&self, cmd: StartMatchingRound) -> Result<MatchingRound, sqlx::Error> {
        MatchingRound::insert_in_progress(&self.pool, &cmd.round).await
    }
}

#[derive(Debug, Clone)]
/// Move a round that has not finished to `failed`, recording why.
pub struct MarkRoundFailed {
    pub round_id: Uuid,
    pub error_message: String,
}

impl Processor<MarkRoundFailed> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkRoundFailed")]
    async fn process(&self, cmd: MarkRoundFailed) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE matching_rounds
            SET status = 'failed', error_message = $2
            WHERE id = $1 AND status IN ('scheduled', 'in_progress')
            "#,
        )
        .bind(cmd.round_id)
        .bind(cmd.error_message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Fail rounds left `in_progress` by a process that never finished them.
pub struct FailStaleRounds {
    pub started_before: time::OffsetDateTime,
    pub error_message: String,
}

impl Processor<FailStaleRounds> for DatabaseProcessor {
    type Output = Vec<Uuid>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FailStaleRounds")]
    async fn process(&self, cmd: FailStaleRounds) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE matching_rounds
            SET status = 'failed', error_message = $2
            WHERE status = 'in_progress' AND created_at < $1
            RETURNING id
            "#,
        )
        .bind(cmd.started_before)
        .bind(cmd.error_message)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GetMatchingRoundById {
    pub round_id: Uuid,
}

impl Processor<GetMatchingRoundById> for DatabaseProcessor {
    type Output = Option<MatchingRound>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetMatchingRoundById")]
    async fn process(
        &self,
        query: GetMatchingRoundById,
    ) -> Result<Option<MatchingRound>, sqlx::Error> {
        let sql = format!("SELECT {ROUND_COLUMNS} FROM matching_rounds WHERE id = $1");
        sqlx::query_as::<_, MatchingRound>(&sql)
            .bind(query.round_id)
            .fetch_optional(&self.pool)
            .await
    }
}
