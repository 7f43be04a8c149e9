//! Administrator claims
//!
//! The persisted `admin` claim is the only source of elevated privilege
//! besides the token's own custom claim. The first administrator is granted
//! out of band through [`ClaimService::bootstrap_admin`].

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::UserClaims;
use crate::error::{PlatformError, Result};
use crate::repository::{ApplicationRepository, ClaimRepository, StudentRepository};
use crate::service::authorization::{checks, AuthContext};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomClaims {
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserClaimsView {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub custom_claims: CustomClaims,
}

pub struct ClaimService {
    claims: Arc<dyn ClaimRepository>,
    applications: Arc<dyn ApplicationRepository>,
    students: Arc<dyn StudentRepository>,
}

impl ClaimService {
    pub fn new(
        claims: Arc<dyn ClaimRepository>,
        applications: Arc<dyn ApplicationRepository>,
        students: Arc<dyn StudentRepository>,
    ) -> Self {
        Self {
            claims,
            applications,
            students,
        }
    }

    pub async fn set_admin(&self, ctx: &AuthContext, uid: &str) -> Result<()> {
        checks::require_admin(ctx)?;
        self.write_claim(uid, true, &ctx.uid).await
    }

    pub async fn remove_admin(&self, ctx: &AuthContext, uid: &str) -> Result<()> {
        checks::require_admin(ctx)?;
        if ctx.is_owner(uid) {
            return Err(PlatformError::validation(
                "Administrators cannot remove their own admin claim",
            ));
        }
        self.write_claim(uid, false, &ctx.uid).await
    }

    pub async fn user_claims(&self, ctx: &AuthContext, uid: &str) -> Result<UserClaimsView> {
        checks::require_admin(ctx)?;
        self.lookup(uid).await
    }

    /// Claim state for a uid, without an acting administrator.
    pub async fn lookup(&self, uid: &str) -> Result<UserClaimsView> {
        let stored = self.claims.find(uid).await?;
        let email = self.known_email(uid).await?;

        if stored.is_none() && email.is_none() {
            return Err(PlatformError::not_found("User", uid));
        }

        Ok(UserClaimsView {
            uid: uid.to_string(),
            email,
            custom_claims: CustomClaims {
                admin: stored.is_some_and(|c| c.admin),
            },
        })
    }

    /// Grant or revoke the claim. `actor` is recorded as the author.
    pub async fn write_claim(&self, uid: &str, admin: bool, actor: &str) -> Result<()> {
        if uid.trim().is_empty() {
            return Err(PlatformError::validation("uid is required"));
        }
        self.claims.upsert(&UserClaims::new(uid, admin, actor)).await?;
        info!(uid = %uid, admin, actor = %actor, "Admin claim updated");
        Ok(())
    }

    /// Grants the claim only while no administrator exists. Returns whether it granted.
    pub async fn bootstrap_admin(&self, uid: &str) -> Result<bool> {
        let admins = self.claims.count_admins().await?;
        if admins > 0 {
            info!(existing_admins = admins, "Bootstrap admin skipped, an administrator already exists");
            return Ok(false);
        }
        self.write_claim(uid, true, "bootstrap").await?;
        Ok(true)
    }

    async fn known_email(&self, uid: &str) -> Result<Option<String>> {
        if let Some(student) = self.students.find_by_uid(uid).await? {
            return Ok(Some(student.details.email));
        }
        Ok(self
            .applications
            .find_by_uid(uid)
            .await?
            .map(|app| app.details.email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn service(store: &MemoryStore) -> ClaimService {
        let store = Arc::new(store.clone());
        ClaimService::new(store.clone(), store.clone(), store)
    }

    fn admin(uid: &str) -> AuthContext {
        AuthContext {
            uid: uid.to_string(),
            email: None,
            is_admin: true,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_only_once() {
        let store = MemoryStore::new();
        let svc = service(&store);

        assert!(svc.bootstrap_admin("first").await.unwrap());
        assert!(!svc.bootstrap_admin("second").await.unwrap());

        assert!(svc.lookup("first").await.unwrap().custom_claims.admin);
        assert!(svc.lookup("second").await.is_err());
    }

    #[tokio::test]
    async fn test_admin_cannot_remove_own_claim() {
        let store = MemoryStore::new();
        let svc = service(&store);

        svc.set_admin(&admin("a1"), "a2").await.unwrap();
        assert!(matches!(
            svc.remove_admin(&admin("a1"), "a1").await,
            Err(PlatformError::Validation { .. })
        ));

        svc.remove_admin(&admin("a1"), "a2").await.unwrap();
        let view = svc.user_claims(&admin("a1"), "a2").await.unwrap();
        assert!(!view.custom_claims.admin);
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let user = AuthContext {
            uid: "u1".to_string(),
            email: None,
            is_admin: false,
        };
        assert!(matches!(svc.set_admin(&user, "u1").await, Err(PlatformError::Forbidden { .. })));
    }
}
