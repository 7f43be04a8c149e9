//! Authorization
//!
//! Administrator privilege comes from claims only: the token's `admin` custom
//! claim or the claim persisted for the uid.

use std::sync::Arc;

use crate::error::Result;
use crate::repository::ClaimRepository;
use crate::service::auth::IdentityClaims;

/// Resolved caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub uid: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl AuthContext {
    pub fn is_owner(&self, uid: &str) -> bool {
        self.uid == uid
    }
}

pub struct AuthorizationService {
    claims: Arc<dyn ClaimRepository>,
}

impl AuthorizationService {
    pub fn new(claims: Arc<dyn ClaimRepository>) -> Self {
        Self { claims }
    }

    pub async fn build_context(&self, identity: &IdentityClaims) -> Result<AuthContext> {
        let is_admin = identity.admin
            || self
                .claims
                .find(&identity.sub)
                .await?
                .is_some_and(|stored| stored.admin);

        Ok(AuthContext {
            uid: identity.sub.clone(),
            email: identity.email.clone(),
            is_admin,
        })
    }
}

pub mod checks {
    use super::AuthContext;
    use crate::error::{PlatformError, Result};

    pub fn require_admin(ctx: &AuthContext) -> Result<()> {
        if ctx.is_admin {
            Ok(())
        } else {
            Err(PlatformError::forbidden("Admin access required"))
        }
    }

    pub fn require_owner_or_admin(ctx: &AuthContext, owner_uid: &str) -> Result<()> {
        if ctx.is_admin || ctx.is_owner(owner_uid) {
            Ok(())
        } else {
            Err(PlatformError::forbidden("Access denied"))
        }
    }
}
