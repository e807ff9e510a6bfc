//! Access control: principals, roles, and the credential collaborator seam.
//!
//! Identity establishment (password hashing, token signing) is delegated to
//! an external collaborator behind the [`CredentialService`] trait. This
//! module only resolves *who is calling* and *what role they hold*, and
//! offers the pure ownership check the services use for scoping.

use crate::errors::{ServiceError, ServiceResult};
use crate::types::UserId;
use async_trait::async_trait;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Privileged caller: full access regardless of resource ownership.
    Admin,
    /// Regular caller: access scoped to owned resources.
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(ServiceError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// The resolved identity and role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identity of the caller.
    pub user_id: UserId,
    /// Role of the caller.
    pub role: Role,
}

impl Principal {
    /// Creates a principal.
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether this caller holds the privileged role.
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// Ownership/role dispatch: may `principal` touch a resource owned by `owner`?
///
/// Admins may; everyone else only when they own the resource.
pub fn can_access(owner: UserId, principal: &Principal) -> bool {
    principal.is_admin() || owner == principal.user_id
}

/// Returns `Forbidden` unless the caller holds the privileged role.
pub fn require_admin(principal: &Principal) -> ServiceResult<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

/// An opaque bearer credential presented by a caller.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 512),
    derive(Debug, Clone, PartialEq, Eq, Hash, AsRef, Deref, Serialize, Deserialize, TryFrom)
)]
pub struct BearerToken(String);

/// Failures raised by the credential collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// The credential did not resolve to a principal.
    #[error("invalid or expired credential")]
    InvalidCredential,
    /// The collaborator itself failed.
    #[error("credential backend failure: {0}")]
    Backend(String),
}

impl From<AccessError> for ServiceError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::InvalidCredential => Self::InvalidCredentials,
            AccessError::Backend(msg) => {
                Self::Store(crate::errors::StoreError::Connection(msg))
            }
        }
    }
}

/// External collaborator that owns credential mechanics.
///
/// Hashing and token formats are deliberately opaque to this crate; real
/// deployments plug in their identity provider here.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Hashes a plaintext password for storage.
    fn hash_password(&self, password: &str) -> String;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> bool;

    /// Issues a bearer token that resolves back to `principal`.
    async fn issue_token(&self, principal: Principal) -> Result<BearerToken, AccessError>;

    /// Resolves a bearer token to the principal it was issued for.
    async fn verify_token(&self, token: &BearerToken) -> Result<Principal, AccessError>;
}

#[async_trait]
impl<C> CredentialService for std::sync::Arc<C>
where
    C: CredentialService + ?Sized,
{
    fn hash_password(&self, password: &str) -> String {
        (**self).hash_password(password)
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        (**self).verify_password(password, hash)
    }

    async fn issue_token(&self, principal: Principal) -> Result<BearerToken, AccessError> {
        (**self).issue_token(principal).await
    }

    async fn verify_token(&self, token: &BearerToken) -> Result<Principal, AccessError> {
        (**self).verify_token(token).await
    }
}

/// Resolves authenticated request contexts to principals.
#[derive(Debug)]
pub struct AccessGate<C> {
    credentials: C,
}

impl<C> AccessGate<C>
where
    C: CredentialService,
{
    /// Creates a gate over the given credential collaborator.
    pub const fn new(credentials: C) -> Self {
        Self { credentials }
    }

    /// Resolves a bearer token to the calling principal.
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, token: &BearerToken) -> ServiceResult<Principal> {
        Ok(self.credentials.verify_token(token).await?)
    }
}

/// Deterministic in-memory credential collaborator for development and tests.
///
/// Tokens are random and kept in a process-local table; the password "hash"
/// is a tagged copy of the input. Not suitable for production use.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    tokens: RwLock<HashMap<String, Principal>>,
}

impl StaticCredentials {
    /// Creates an empty collaborator.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialService for StaticCredentials {
    fn hash_password(&self, password: &str) -> String {
        format!("static${password}")
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("static$") == Some(password)
    }

    async fn issue_token(&self, principal: Principal) -> Result<BearerToken, AccessError> {
        let raw = Uuid::now_v7().simple().to_string();
        let token = BearerToken::try_new(raw.clone())
            .map_err(|e| AccessError::Backend(e.to_string()))?;
        self.tokens
            .write()
            .expect("RwLock poisoned")
            .insert(raw, principal);
        Ok(token)
    }

    async fn verify_token(&self, token: &BearerToken) -> Result<Principal, AccessError> {
        self.tokens
            .read()
            .expect("RwLock poisoned")
            .get(token.as_ref())
            .copied()
            .ok_or(AccessError::InvalidCredential)
    }
}
