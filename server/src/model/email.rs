use anyhow::Context;
use sea_orm::sea_query::Expr;

use crate::db_core::prelude::*;
use crate::email::canonical::CanonicalEmail;
use crate::error::AppResult;

pub struct EmailCtrl;

impl EmailCtrl {
    /// Insert freshly fetched emails, skipping ids imported before.
    /// Returns the number of rows actually inserted.
    pub async fn import_batch(
        conn: &DatabaseConnection,
        emails: &[CanonicalEmail],
    ) -> AppResult<u64> {
        if emails.is_empty() {
            return Ok(0);
        }

        let now: DateTimeWithTimeZone = chrono::Utc::now().into();
        let models = emails.iter().map(|e| email::ActiveModel {
            id: ActiveValue::NotSet,
            gmail_id: ActiveValue::Set(e.gmail_id.clone()),
            thread_id: ActiveValue::Set(e.thread_id.clone()),
            from_address: ActiveValue::Set(e.from.clone()),
            from_name: ActiveValue::Set(e.from_name.clone()),
            to_address: ActiveValue::Set(e.to.clone()),
            subject: ActiveValue::Set(e.subject.clone()),
            body: ActiveValue::Set(e.body.clone()),
            received_at: ActiveValue::Set(e.received_at.into()),
            read: ActiveValue::Set(e.read),
            starred: ActiveValue::Set(e.starred),
            important: ActiveValue::Set(e.important),
            created_at: ActiveValue::Set(now),
        });

        let inserted = Email::insert_many(models)
            .on_conflict(
                OnConflict::column(email::Column::GmailId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .context("Error importing emails")?;

        Ok(inserted)
    }

    pub async fn set_read(conn: &DatabaseConnection, gmail_id: &str, read: bool) -> AppResult<()> {
        Email::update_many()
            .col_expr(email::Column::Read, Expr::value(read))
            .filter(email::Column::GmailId.eq(gmail_id))
            .exec(conn)
            .await
            .context("Error updating read flag")?;

        Ok(())
    }

    pub async fn set_starred(
        conn: &DatabaseConnection,
        gmail_id: &str,
        starred: bool,
    ) -> AppResult<()> {
        Email::update_many()
            .col_expr(email::Column::Starred, Expr::value(starred))
            .filter(email::Column::GmailId.eq(gmail_id))
            .exec(conn)
            .await
            .context("Error updating starred flag")?;

        Ok(())
    }
}
