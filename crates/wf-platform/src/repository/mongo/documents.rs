use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime};

use super::MongoStore;
use crate::domain::Document;
use crate::error::Result;
use crate::repository::DocumentRepository;

#[async_trait]
impl DocumentRepository for MongoStore {
    async fn upsert(&self, document: &Document) -> Result<()> {
        self.documents
            .replace_one(doc! { "_id": &document.id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_storage_key(&self, storage_key: &str) -> Result<Option<Document>> {
        Ok(self
            .documents
            .find_one(doc! { "storageKey": storage_key })
            .await?)
    }

    async fn find_by_student(&self, student_uid: &str, enabled_only: bool) -> Result<Vec<Document>> {
        let mut filter = doc! { "studentUid": student_uid };
        if enabled_only {
            filter.insert("isEnabled", true);
        }
        let cursor = self
            .documents
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_enabled(&self, id: &str, enabled: bool, now: DateTime<Utc>) -> Result<bool> {
        let result = self
            .documents
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "isEnabled": enabled, "updatedAt": BsonDateTime::from_chrono(now) } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.documents.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
