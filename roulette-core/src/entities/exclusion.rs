use uuid::Uuid;

/// Two participants that must never be paired.
///
/// Rows are stored normalized (`participant_low < participant_high`) so each
/// unordered pair exists once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::FromRow)]
pub struct ExclusionPair {
    pub participant_low: Uuid,
    pub participant_high: Uuid,
}

impl ExclusionPair {
    /// Build a normalized pair. Returns `None` for a self-pair.
    pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self {
                participant_low: a,
                participant_high: b,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                participant_low: b,
                participant_high: a,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub async fn list_all(
        executor: impl sqlx::PgExecutor<'_>,
    ) -> Result<Vec<ExclusionPair>, sqlx::Error> {
        sqlx::query_as::<_, ExclusionPair>(
            r#"
            SELECT participant_low, participant_high
            FROM exclusion_pairs
            "#,
        )
        .fetch_all(executor)
        .await
    }
}
