use async_trait::async_trait;
use mongodb::bson::doc;

use super::MongoStore;
use crate::domain::UserClaims;
use crate::error::Result;
use crate::repository::ClaimRepository;

#[async_trait]
impl ClaimRepository for MongoStore {
    async fn find(&self, uid: &str) -> Result<Option<UserClaims>> {
        Ok(self.claims.find_one(doc! { "_id": uid }).await?)
    }

    async fn upsert(&self, claims: &UserClaims) -> Result<()> {
        self.claims
            .replace_one(doc! { "_id": &claims.uid }, claims)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.claims.count_documents(doc! { "admin": true }).await?)
    }
}
