use async_trait::async_trait;
use wf_common::{OutboxItem, OutboxStatus};
use crate::repository::OutboxRepository;
use anyhow::Result;
use mongodb::{Client, Collection, IndexModel};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use chrono::Utc;
use std::time::Duration;
use tracing::info;

pub struct MongoOutboxRepository {
    collection: Collection<OutboxItem>,
}

impl MongoOutboxRepository {
    pub fn new(client: Client, db_name: &str, collection_name: &str) -> Self {
        let db = client.database(db_name);
        let collection = db.collection(collection_name);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "status": 1, "createdAt": 1 })
            .options(IndexOptions::builder().name("status_created".to_string()).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl OutboxRepository for MongoOutboxRepository {
    async fn claim_pending(&self, limit: u32) -> Result<Vec<OutboxItem>> {
        let options = FindOneAndUpdateOptions::builder()
            .sort(doc! { "createdAt": 1 })
            .return_document(ReturnDocument::After)
            .build();

        let mut items = Vec::new();
        // One document per round trip so two consumers never claim the same item.
        while items.len() < limit as usize {
            let claimed = self.collection
                .find_one_and_update(
                    doc! { "status": OutboxStatus::PENDING.as_str() },
                    doc! { "$set": {
                        "status": OutboxStatus::PROCESSING.as_str(),
                        "claimedAt": BsonDateTime::now(),
                    } },
                )
                .with_options(options.clone())
                .await?;

            match claimed {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "status": OutboxStatus::COMPLETED.as_str(),
                        "processedAt": BsonDateTime::now(),
                    },
                    "$inc": { "attempts": 1 },
                    "$unset": { "lastError": "" },
                },
            )
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str, retry: bool) -> Result<()> {
        let update = if retry {
            doc! {
                "$set": { "status": OutboxStatus::PENDING.as_str(), "lastError": error },
                "$inc": { "attempts": 1 },
                "$unset": { "claimedAt": "" },
            }
        } else {
            doc! {
                "$set": {
                    "status": OutboxStatus::FAILED.as_str(),
                    "lastError": error,
                    "processedAt": BsonDateTime::now(),
                },
                "$inc": { "attempts": 1 },
            }
        };

        self.collection.update_one(doc! { "_id": id }, update).await?;
        Ok(())
    }

    async fn recover_stuck_items(&self, timeout: Duration) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::from_std(timeout)?;

        let filter = doc! {
            "status": OutboxStatus::PROCESSING.as_str(),
            "claimedAt": { "$lt": BsonDateTime::from_chrono(cutoff) }
        };

        let update = doc! {
            "$set": { "status": OutboxStatus::PENDING.as_str() },
            "$unset": { "claimedAt": "" }
        };

        let result = self.collection.update_many(filter, update).await?;
        let recovered = result.modified_count;

        if recovered > 0 {
            info!("Recovered {} stuck outbox items (MongoDB)", recovered);
        }
        Ok(recovered)
    }
}
