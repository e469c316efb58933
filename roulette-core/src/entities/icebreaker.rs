use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IcebreakerTopic {
    pub id: Uuid,
    pub text: String,
}

impl IcebreakerTopic {
    pub async fn list_active(
        executor: impl sqlx::PgExecutor<'_>,
    ) -> Result<Vec<IcebreakerTopic>, sqlx::Error> {
        sqlx::query_as::<_, IcebreakerTopic>(
            r#"
            SELECT id, text
            FROM icebreaker_topics
            WHERE active = true
            ORDER BY id
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Link topics to a pairing. Topic order is preserved via `position`.
    pub async fn assign(
        executor: impl sqlx::PgExecutor<'_>,
        pairing_id: Uuid,
        topic_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        if topic_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO pairing_icebreakers (pairing_id, topic_id, position)
            SELECT $1, t.topic_id, t.position::INT
            FROM UNNEST($2::UUID[]) WITH ORDINALITY AS t(topic_id, position)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(pairing_id)
        .bind(topic_ids)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
