//! Authentication service.
//!
//! Password registration and login. The very first registration in a fresh
//! store becomes the admin; see [`AuthService::register`].

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{info, instrument};

use ca_portal_core::{Email, Role, UserId, normalize_zone};

use super::AssignmentEngine;
use crate::db::{DirectoryStore, RepositoryError};
use crate::models::{Ambassador, AmbassadorLookup, AmbassadorPatch, NewAmbassador};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration form.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub pin_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zone: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    directory: &'a dyn DirectoryStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(directory: &'a dyn DirectoryStore) -> Self {
        Self { directory }
    }

    /// Register a new user with email and password.
    ///
    /// The record is inserted as a `CA` first. The first successful insert to
    /// claim the store's bootstrap flag is then promoted to `ADMIN`; everyone
    /// else stays a `CA` and is linked to their zone head straight away.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: Registration) -> Result<Ambassador, AuthError> {
        let email = Email::parse(&form.email)?;
        validate_password(&form.password)?;

        if self
            .directory
            .find_ambassador(AmbassadorLookup::Email(&email))
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&form.password)?;
        let new = NewAmbassador {
            full_name: non_blank(form.full_name),
            phone: non_blank(form.phone),
            college: non_blank(form.college),
            pin_code: non_blank(form.pin_code),
            city: non_blank(form.city),
            state: non_blank(form.state),
            zone: form.zone.as_deref().and_then(normalize_zone),
            ..NewAmbassador::new(email, password_hash, Role::Ca)
        };
        let user = self.create_registered(&new).await?;
        info!(user_id = %user.id, role = %user.role, "user registered");

        if user.role != Role::Ca {
            return Ok(user);
        }

        AssignmentEngine::new(self.directory)
            .assign(&user.canonical_zone())
            .await?;
        self.get_user(user.id).await
    }

    /// Create an admin directly, bypassing registration.
    ///
    /// Also claims the bootstrap flag so a later registration does not
    /// become a second admin by accident.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`].
    #[instrument(skip(self, password))]
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<Ambassador, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let new = NewAmbassador {
            full_name: non_blank(full_name),
            ..NewAmbassador::new(email, password_hash, Role::Admin)
        };
        let admin = self.create(&new).await?;
        self.directory.claim_bootstrap().await?;

        info!(user_id = %admin.id, "admin created");
        Ok(admin)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Ambassador, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .directory
            .password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<Ambassador, AuthError> {
        self.directory
            .find_ambassador(AmbassadorLookup::Id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Insert `new`, then claim the bootstrap flag. Only a record that made it
    /// into the store can take the flag, and the claimant becomes `ADMIN`.
    async fn create_registered(&self, new: &NewAmbassador) -> Result<Ambassador, AuthError> {
        let user = self.create(new).await?;
        if !self.directory.claim_bootstrap().await? {
            return Ok(user);
        }

        let patch = AmbassadorPatch {
            role: Some(Role::Admin),
            ..AmbassadorPatch::default()
        };
        let admin = self.directory.update_ambassador(user.id, &patch).await?;
        info!(user_id = %admin.id, "first registration promoted to admin");
        Ok(admin)
    }

    async fn create(&self, new: &NewAmbassador) -> Result<Ambassador, AuthError> {
        self.directory
            .create_ambassador(new)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn form(email: &str) -> Registration {
        Registration {
            email: email.to_owned(),
            password: "correct horse".to_owned(),
            ..Registration::default()
        }
    }

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret-pass", &hash).is_ok());
        assert!(verify_password("wrong-pass", &hash).is_err());
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);

        let first = auth.register(form("first@x.io")).await.unwrap();
        let second = auth.register(form("second@x.io")).await.unwrap();

        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::Ca);
        assert_eq!(second.zone.as_deref(), Some("INTERNATIONAL"));
    }

    #[tokio::test]
    async fn test_duplicate_does_not_burn_bootstrap() {
        let store = MemoryStore::new();
        store
            .create_ambassador(&NewAmbassador::new(
                Email::parse("taken@x.io").unwrap(),
                "x".to_owned(),
                Role::Ca,
            ))
            .await
            .unwrap();
        let auth = AuthService::new(&store);

        let err = auth.register(form("TAKEN@x.io")).await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));

        let next = auth.register(form("next@x.io")).await.unwrap();
        assert_eq!(next.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_bootstrap() {
        let store = MemoryStore::new();
        let taken = NewAmbassador::new(Email::parse("taken@x.io").unwrap(), "x".to_owned(), Role::Ca);
        store.create_ambassador(&taken).await.unwrap();
        let auth = AuthService::new(&store);

        // Same email slipping past the lookup, as with two concurrent sign-ups.
        let err = auth.create_registered(&taken).await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));

        assert!(store.claim_bootstrap().await.unwrap());
    }

    #[tokio::test]
    async fn test_login() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);
        auth.register(form("a@x.io")).await.unwrap();

        assert!(auth.login("A@x.io", "correct horse").await.is_ok());
        assert!(matches!(
            auth.login("a@x.io", "wrong horse").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@x.io", "correct horse").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_admin_create_claims_bootstrap() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);
        let admin = auth
            .create_admin("root@x.io", "long enough", Some("Root".to_owned()))
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        let user = auth.register(form("user@x.io")).await.unwrap();
        assert_eq!(user.role, Role::Ca);
    }
}
