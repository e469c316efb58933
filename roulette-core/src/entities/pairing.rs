use crate::entities::PairingStatus;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

const PAIRING_COLUMNS: &str = r#"
    id,
    round_id,
    participant_a,
    participant_b,
    status,
    score,
    meeting_scheduled_at,
    meeting_completed_at,
    calendar_event_ref,
    created_at
"#;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Pairing {
    pub id: Uuid,
    pub round_id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub status: PairingStatus,
    pub score: i64,
    pub meeting_scheduled_at: Option<time::OffsetDateTime>,
    pub meeting_completed_at: Option<time::OffsetDateTime>,
    pub calendar_event_ref: Option<String>,
    pub created_at: time::OffsetDateTime,
}

/// Data for inserting a new pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPairing {
    pub round_id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub score: i64,
}

/// A past pairing, used for repeat-avoidance scoring.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PairHistoryEntry {
    pub round_id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
}

impl Pairing {
    pub async fn insert(
        executor: impl sqlx::PgExecutor<'_>,
        pairing: &NewPairing,
    ) -> Result<Pairing, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO pairings (id, round_id, participant_a, participant_b, status, score)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING {PAIRING_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Pairing>(&sql)
            .bind(Uuid::now_v7())
            .bind(pairing.round_id)
            .bind(pairing.participant_a)
            .bind(pairing.participant_b)
            .bind(pairing.score)
            .fetch_one(executor)
            .await
    }
}

impl PairHistoryEntry {
    /// Non-cancelled pairings from the most recent `lookback_rounds`
    /// completed rounds.
    pub async fn list_recent(
        executor: impl sqlx::PgExecutor<'_>,
        lookback_rounds: i64,
    ) -> Result<Vec<PairHistoryEntry>, sqlx::Error> {
        if lookback_rounds <= 0 {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, PairHistoryEntry>(
            r#"
            SELECT p.round_id, p.participant_a, p.participant_b
            FROM pairings p
            WHERE p.status <> 'cancelled'
              AND p.round_id IN (
                SELECT r.id
                FROM matching_rounds r
                WHERE r.status = 'completed'
                ORDER BY r.executed_at DESC NULLS LAST
                LIMIT $1
              )
            "#,
        )
        .bind(lookback_rounds)
        .fetch_all(executor)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct ListPairingsForRound {
    pub round_id: Uuid,
}

impl Processor<ListPairingsForRound> for DatabaseProcessor {
    type Output = Vec<Pairing>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListPairingsForRound")]
    async fn process(&self, query: ListPairingsForRound) -> Result<Vec<Pairing>, sqlx::Error> {
        let sql = format!(
            "SELECT {PAIRING_COLUMNS} FROM pairings WHERE round_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, Pairing>(&sql)
            .bind(query.round_id)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Attach a scheduled meeting to a committed pairing.
pub struct RecordPairingMeeting {
    pub pairing_id: Uuid,
    pub scheduled_at: time::OffsetDateTime,
    pub calendar_event_ref: String,
}

impl Processor<RecordPairingMeeting> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordPairingMeeting")]
    async fn process(&self, cmd: RecordPairingMeeting) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE pairings
            SET meeting_scheduled_at = $2, calendar_event_ref = $3
            WHERE id = $1
            "#,
        )
        .bind(cmd.pairing_id)
        .bind(cmd.scheduled_at)
        .bind(cmd.calendar_event_ref)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
