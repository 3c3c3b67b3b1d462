use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    Row,
    postgres::{PgListener, PgPool, PgPoolOptions, PgRow},
    query,
};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{
    DocumentHandle, FieldFilter, PostDocuments, RepoError, SnapshotStream, StoredPost,
};
use crate::domain::posts::{NewPostDocument, PostMergeUpdate};

use super::{CREATED_AT, UPDATED_AT, decode_snapshot, timestamp_value, to_document};

/// Channel the `documents` trigger notifies with the changed collection's name.
const CHANGE_CHANNEL: &str = "documents_changed";
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) if db.message().contains("invalid input syntax") => {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

/// Documents stored as JSONB rows with `LISTEN/NOTIFY` change delivery.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }
}

fn parse_handle(handle: &DocumentHandle) -> Result<Uuid, RepoError> {
    Uuid::parse_str(&handle.key).map_err(|_| RepoError::InvalidInput {
        message: format!("`{}` is not a document key", handle.key),
    })
}

fn row_document(collection: &str, row: PgRow) -> Result<(DocumentHandle, Value), RepoError> {
    let doc_id: Uuid = row.try_get("doc_id").map_err(map_sqlx_error)?;
    let mut body: Value = row.try_get("body").map_err(map_sqlx_error)?;
    let created_at: OffsetDateTime = row.try_get("created_at").map_err(map_sqlx_error)?;
    let updated_at: OffsetDateTime = row.try_get("updated_at").map_err(map_sqlx_error)?;

    if let Value::Object(fields) = &mut body {
        fields.insert(CREATED_AT.to_string(), timestamp_value(created_at)?);
        fields.insert(UPDATED_AT.to_string(), timestamp_value(updated_at)?);
    }

    Ok((DocumentHandle::new(collection, doc_id.to_string()), body))
}

async fn load_collection(pool: &PgPool, collection: &str) -> Result<Vec<StoredPost>, RepoError> {
    let rows = query(
        r#"
        SELECT doc_id, body, created_at, updated_at
        FROM documents
        WHERE collection = $1
        ORDER BY created_at, doc_id
        "#,
    )
    .bind(collection)
    .fetch_all(pool)
    .await
    .map_err(map_sqlx_error)?;

    let documents = rows
        .into_iter()
        .map(|row| row_document(collection, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(decode_snapshot(documents))
}

#[async_trait]
impl PostDocuments for PostgresDocumentStore {
    async fn subscribe_collection(&self, collection: &str) -> Result<SnapshotStream, RepoError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        listener
            .listen(CHANGE_CHANNEL)
            .await
            .map_err(map_sqlx_error)?;

        let pool = self.pool.clone();
        let collection = collection.to_string();
        info!(
            target = "postdesk::infra::db::postgres",
            collection = %collection,
            "listening for document changes"
        );

        let stream = stream! {
            yield load_collection(&pool, &collection).await;

            loop {
                match listener.recv().await {
                    Ok(notification) if notification.payload() != collection => continue,
                    Ok(_) => yield load_collection(&pool, &collection).await,
                    Err(err) => {
                        warn!(
                            target = "postdesk::infra::db::postgres",
                            error = %err,
                            "change listener interrupted; notifications may have been missed"
                        );
                        yield Err(RepoError::Subscription(err.to_string()));
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        yield load_collection(&pool, &collection).await;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Vec<DocumentHandle>, RepoError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT doc_id
            FROM documents
            WHERE collection = $1 AND body ->> $2 = $3
            ORDER BY created_at, doc_id
            "#,
        )
        .bind(collection)
        .bind(filter.field.as_str())
        .bind(&filter.value)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ids
            .into_iter()
            .map(|id| DocumentHandle::new(collection, id.to_string()))
            .collect())
    }

    async fn create(
        &self,
        collection: &str,
        document: NewPostDocument,
    ) -> Result<DocumentHandle, RepoError> {
        let body = Value::Object(to_document(&document)?);
        let doc_id = Uuid::new_v4();

        query(
            r#"
            INSERT INTO documents (doc_id, collection, body, created_at, updated_at)
            VALUES ($1, $2, $3, now(), now())
            "#,
        )
        .bind(doc_id)
        .bind(collection)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(DocumentHandle::new(collection, doc_id.to_string()))
    }

    async fn merge_update(
        &self,
        handle: &DocumentHandle,
        update: PostMergeUpdate,
    ) -> Result<(), RepoError> {
        let doc_id = parse_handle(handle)?;
        let fields = Value::Object(to_document(&update)?);

        let result = query(
            r#"
            UPDATE documents
            SET body = body || $3, updated_at = now()
            WHERE doc_id = $1 AND collection = $2
            "#,
        )
        .bind(doc_id)
        .bind(&handle.collection)
        .bind(fields)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, handle: &DocumentHandle) -> Result<(), RepoError> {
        let doc_id = parse_handle(handle)?;
        query("DELETE FROM documents WHERE doc_id = $1 AND collection = $2")
            .bind(doc_id)
            .bind(&handle.collection)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
