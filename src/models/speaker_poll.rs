use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerPoll {
    pub id: Uuid,
    pub speaker: String,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpeakerPoll {
    /// All speakers, most votes first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM speaker_polls
            ORDER BY votes DESC, speaker ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Adds one vote; `None` when the speaker is not on the poll
    pub async fn record_vote(pool: &PgPool, speaker: &str) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, Self>(
            r#"
            UPDATE speaker_polls
            SET votes = votes + 1, updated_at = NOW()
            WHERE speaker = $1
            RETURNING *
            "#,
        )
        .bind(speaker)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Sets every vote count back to zero, returning the number of speakers reset
    pub async fn reset_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE speaker_polls
            SET votes = 0, updated_at = NOW()
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

pub fn total_votes(rows: &[SpeakerPoll]) -> i64 {
    rows.iter().map(|r| i64::from(r.votes.max(0))).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    async fn test_record_vote_adds_exactly_one(pool: PgPool) {
        let first = SpeakerPoll::record_vote(&pool, "Ashley May").await.unwrap().unwrap();
        assert_eq!(first.votes, 1);

        let second = SpeakerPoll::record_vote(&pool, "Ashley May").await.unwrap().unwrap();
        assert_eq!(second.votes, 2);

        let rows = SpeakerPoll::list(&pool).await.unwrap();
        assert_eq!(rows[0].speaker, "Ashley May");
        assert_eq!(total_votes(&rows), 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_unknown_speaker_is_not_recorded(pool: PgPool) {
        let row = SpeakerPoll::record_vote(&pool, "Nobody In Particular").await.unwrap();
        assert!(row.is_none());

        let rows = SpeakerPoll::list(&pool).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(total_votes(&rows), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_reset_all_zeroes_every_speaker(pool: PgPool) {
        SpeakerPoll::record_vote(&pool, "Bradley Bennett").await.unwrap();
        SpeakerPoll::record_vote(&pool, "Tessie Baehr").await.unwrap();

        assert_eq!(SpeakerPoll::reset_all(&pool).await.unwrap(), 6);

        let rows = SpeakerPoll::list(&pool).await.unwrap();
        assert!(rows.iter().all(|r| r.votes == 0));
    }
}
