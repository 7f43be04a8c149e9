use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;

use super::MongoStore;
use crate::domain::Student;
use crate::error::{PlatformError, Result};
use crate::repository::StudentRepository;

#[async_trait]
impl StudentRepository for MongoStore {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<Student>> {
        Ok(self.students.find_one(doc! { "_id": uid }).await?)
    }

    async fn find_by_application_id(&self, application_id: &str) -> Result<Option<Student>> {
        Ok(self
            .students
            .find_one(doc! { "applicationId": application_id })
            .await?)
    }

    async fn find_all(&self) -> Result<Vec<Student>> {
        let cursor = self
            .students
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update(&self, student: &Student) -> Result<()> {
        let result = self
            .students
            .replace_one(doc! { "_id": &student.uid }, student)
            .await?;
        if result.matched_count == 0 {
            return Err(PlatformError::not_found("Student", &student.uid));
        }
        Ok(())
    }
}
