//! User accounts and the registration/login surface.
//!
//! Credential mechanics (hashing, token formats) belong to the
//! [`CredentialService`] collaborator; this module only orchestrates the
//! store and the collaborator.

use crate::access::{BearerToken, CredentialService, Principal, Role};
use crate::errors::{ServiceError, ServiceResult};
use crate::store::UserStore;
use crate::types::{Login, UserId, Username};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A registered user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity assigned by the store.
    pub id: UserId,
    /// Unique login (email-shaped).
    pub login: Login,
    /// Display name.
    pub username: Username,
    /// Opaque password hash. Never serialized.
    #[serde(skip)]
    pub password_hash: String,
    /// Role of the account.
    pub role: Role,
}

impl User {
    /// The principal this account acts as.
    pub const fn principal(&self) -> Principal {
        Principal::new(self.id, self.role)
    }
}

/// Fields for inserting a user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Unique login.
    pub login: Login,
    /// Display name.
    pub username: Username,
    /// Opaque password hash.
    pub password_hash: String,
    /// Role of the account.
    pub role: Role,
}

/// A registration request. The plaintext password never reaches the store.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Desired login.
    pub login: Login,
    /// Display name.
    pub username: Username,
    /// Plaintext password, hashed by the credential collaborator.
    pub password: String,
    /// Role for the new account. Self-service registration uses `User`.
    pub role: Role,
}

/// A successful login: the account plus a bearer token for later requests.
#[derive(Debug, Clone)]
pub struct Session {
    /// The authenticated account.
    pub user: User,
    /// Token to present on subsequent requests.
    pub token: BearerToken,
}

/// Registration, login and password management over a user store.
#[derive(Debug, Clone)]
pub struct UserDirectory<S, C> {
    store: S,
    credentials: C,
}

impl<S, C> UserDirectory<S, C>
where
    S: UserStore,
    C: CredentialService,
{
    /// Creates the directory over a store and a credential collaborator.
    pub const fn new(store: S, credentials: C) -> Self {
        Self { store, credentials }
    }

    /// Registers a new account.
    #[instrument(skip(self, registration), fields(login = %registration.login))]
    pub async fn register(&self, registration: Registration) -> ServiceResult<User> {
        if self
            .store
            .fetch_user_by_login(&registration.login)
            .await?
            .is_some()
        {
            return Err(ServiceError::DuplicateLogin(registration.login));
        }

        let user = NewUser {
            login: registration.login,
            username: registration.username,
            password_hash: self.credentials.hash_password(&registration.password),
            role: registration.role,
        };
        Ok(self.store.insert_user(user).await?)
    }

    /// Verifies a login/password pair and issues a bearer token.
    ///
    /// A missing account and a wrong password are indistinguishable to the
    /// caller.
    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &Login, password: &str) -> ServiceResult<Session> {
        let user = self
            .store
            .fetch_user_by_login(login)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !self
            .credentials
            .verify_password(password, &user.password_hash)
        {
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.credentials.issue_token(user.principal()).await?;
        Ok(Session { user, token })
    }

    /// Changes the calling user's password after verifying the current one.
    #[instrument(skip(self, current_password, new_password), fields(user = %principal.user_id))]
    pub async fn change_password(
        &self,
        principal: &Principal,
        current_password: &str,
        new_password: &str,
    ) -> ServiceResult<()> {
        let user = self
            .store
            .fetch_user(principal.user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(principal.user_id))?;

        if !self
            .credentials
            .verify_password(current_password, &user.password_hash)
        {
            return Err(ServiceError::InvalidCredentials);
        }

        let hash = self.credentials.hash_password(new_password);
        Ok(self.store.update_password(user.id, hash).await?)
    }
}
