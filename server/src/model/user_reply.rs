use anyhow::Context;

use crate::db_core::prelude::*;
use crate::error::AppResult;

pub struct UserReplyCtrl;

impl UserReplyCtrl {
    /// Append one edited reply to the user's list. A single-statement
    /// insert: concurrent saves serialize on the primary key sequence
    /// instead of clobbering each other.
    pub async fn append(
        conn: &DatabaseConnection,
        user_id: &str,
        content: &str,
    ) -> AppResult<user_reply::Model> {
        let active = user_reply::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(user_id.to_string()),
            content: ActiveValue::Set(content.to_string()),
            created_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        let model = active
            .insert(conn)
            .await
            .context("Error saving user reply")?;

        Ok(model)
    }

    /// The user's replies in insertion order.
    pub async fn list_for_user(
        conn: &DatabaseConnection,
        user_id: &str,
    ) -> AppResult<Vec<user_reply::Model>> {
        let replies = UserReply::find()
            .filter(user_reply::Column::UserId.eq(user_id))
            .order_by(user_reply::Column::Id, Order::Asc)
            .all(conn)
            .await
            .context("Error fetching user replies")?;

        Ok(replies)
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;

    #[tokio::test]
    async fn test_append_then_list_preserves_insertion_order() {
        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let draft_a = user_reply::Model {
            id: 1,
            user_id: "u1".to_string(),
            content: "draft A".to_string(),
            created_at: now,
        };
        let draft_b = user_reply::Model {
            id: 2,
            user_id: "u1".to_string(),
            content: "draft B".to_string(),
            created_at: now,
        };

        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![draft_a.clone()],
                vec![draft_b.clone()],
                vec![draft_a, draft_b],
            ])
            .into_connection();

        let first = UserReplyCtrl::append(&conn, "u1", "draft A").await.unwrap();
        let second = UserReplyCtrl::append(&conn, "u1", "draft B").await.unwrap();
        assert!(first.id < second.id);

        let replies = UserReplyCtrl::list_for_user(&conn, "u1").await.unwrap();
        let contents = replies.iter().map(|r| r.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["draft A", "draft B"]);
    }
}
