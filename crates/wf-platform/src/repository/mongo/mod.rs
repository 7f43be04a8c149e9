//! MongoDB store
//!
//! One collection per record type. Units of work run in multi-document
//! transactions, which need a replica set deployment.

use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::info;
use wf_common::OutboxItem;

use crate::domain::{Application, Document, Payment, Student, UserClaims};
use crate::error::{PlatformError, Result};

pub const APPLICATIONS: &str = "applications";
pub const STUDENTS: &str = "students";
pub const PAYMENTS: &str = "payments";
pub const DOCUMENTS: &str = "documents";
pub const USER_CLAIMS: &str = "user_claims";
pub const OUTBOX: &str = "outbox";

pub(crate) const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    applications: Collection<Application>,
    students: Collection<Student>,
    payments: Collection<Payment>,
    documents: Collection<Document>,
    claims: Collection<UserClaims>,
    outbox: Collection<OutboxItem>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            applications: db.collection(APPLICATIONS),
            students: db.collection(STUDENTS),
            payments: db.collection(PAYMENTS),
            documents: db.collection(DOCUMENTS),
            claims: db.collection(USER_CLAIMS),
            outbox: db.collection(OUTBOX),
        }
    }

    /// Unique indexes close the duplicate-submission and double-derivation races.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.applications
            .create_index(unique_index(doc! { "uid": 1 }, "uid_unique"))
            .await?;
        self.applications
            .create_index(index(doc! { "status": 1, "updatedAt": 1 }, "status_updated"))
            .await?;
        self.students
            .create_index(unique_index(doc! { "applicationId": 1 }, "application_unique"))
            .await?;
        self.payments
            .create_index(index(doc! { "uid": 1, "createdAt": -1 }, "uid_created"))
            .await?;
        self.documents
            .create_index(index(doc! { "studentUid": 1, "createdAt": -1 }, "student_created"))
            .await?;
        self.documents
            .create_index(index(doc! { "storageKey": 1 }, "storage_key"))
            .await?;
        self.outbox
            .create_index(index(doc! { "status": 1, "createdAt": 1 }, "status_created"))
            .await?;

        info!("MongoDB indexes ensured");
        Ok(())
    }
}

fn index(keys: mongodb::bson::Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(name.to_string()).build())
        .build()
}

fn unique_index(keys: mongodb::bson::Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(name.to_string()).unique(true).build())
        .build()
}

pub(crate) fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

pub(crate) fn is_transient(error: &PlatformError) -> bool {
    match error {
        PlatformError::Database(e) => {
            e.contains_label(TRANSIENT_TRANSACTION_ERROR)
                || e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
        }
        _ => false,
    }
}

/// Runs `$body` inside a transaction bound to `$session`, committing on
/// success and retrying transient transaction errors.
macro_rules! in_transaction {
    ($store:expr, |$session:ident| $body:expr) => {{
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut $session = $store.client.start_session().await?;
            $session.start_transaction().await?;

            let outcome = $body.await;
            let result = match outcome {
                Ok(value) => $session
                    .commit_transaction()
                    .await
                    .map(|_| value)
                    .map_err($crate::error::PlatformError::from),
                Err(e) => {
                    let _ = $session.abort_transaction().await;
                    Err(e)
                }
            };

            match result {
                Err(e) if attempt < $crate::repository::mongo::MAX_TRANSACTION_ATTEMPTS
                    && $crate::repository::mongo::is_transient(&e) =>
                {
                    tracing::warn!(attempt, "Retrying transaction after transient error: {}", e);
                }
                other => break other,
            }
        }
    }};
}
pub(crate) use in_transaction;

mod applications;
mod claims;
mod documents;
mod payments;
mod students;
mod unit_of_work;
