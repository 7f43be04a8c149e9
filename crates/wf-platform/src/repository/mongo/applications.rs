use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document as BsonDocument};

use super::MongoStore;
use crate::domain::Application;
use crate::error::Result;
use crate::repository::ApplicationRepository;

#[async_trait]
impl ApplicationRepository for MongoStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Application>> {
        Ok(self.applications.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<Application>> {
        Ok(self.applications.find_one(doc! { "uid": uid }).await?)
    }

    async fn find_all(&self) -> Result<Vec<Application>> {
        let cursor = self
            .applications
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_pending(&self, application: &Application) -> Result<bool> {
        let result = self
            .applications
            .replace_one(doc! { "_id": &application.id, "status": "pending" }, application)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_rejected_before(&self, cutoff: DateTime<Utc>, limit: u32) -> Result<u64> {
        let filter = doc! {
            "status": "rejected",
            "updatedAt": { "$lt": BsonDateTime::from_chrono(cutoff) },
        };

        let ids: Vec<Bson> = self
            .applications
            .clone_with_type::<BsonDocument>()
            .find(filter)
            .sort(doc! { "updatedAt": 1 })
            .limit(i64::from(limit))
            .projection(doc! { "_id": 1 })
            .await?
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .filter_map(|d| d.get("_id").cloned())
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        let result = self
            .applications
            .delete_many(doc! { "_id": { "$in": ids }, "status": "rejected" })
            .await?;
        Ok(result.deleted_count)
    }
}
