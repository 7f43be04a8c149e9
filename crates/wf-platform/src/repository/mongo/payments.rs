use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;

use super::{is_duplicate_key, MongoStore};
use crate::domain::Payment;
use crate::error::{PlatformError, Result};
use crate::repository::PaymentRepository;

#[async_trait]
impl PaymentRepository for MongoStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        match self.payments.insert_one(payment).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(PlatformError::duplicate(format!(
                "Payment order {} already exists",
                payment.order_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        Ok(self.payments.find_one(doc! { "_id": order_id }).await?)
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Vec<Payment>> {
        let cursor = self
            .payments
            .find(doc! { "uid": uid })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
