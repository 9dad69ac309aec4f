//! Authentication and user management service

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use regex::Regex;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        book::non_blank,
        user::{
            ChangePassword, Principal, RegisterUser, Role, UpdateProfile, User, UserClaims,
        },
        Pagination,
    },
    repository::{
        users::{NewUser, ProfileChanges},
        Repository,
    },
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Token lifetime in seconds
    pub fn token_ttl_seconds(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    /// Register a regular user and issue a token
    pub async fn register(&self, mut data: RegisterUser) -> AppResult<(String, User)> {
        data.username = data.username.trim().to_string();
        data.email = data.email.trim().to_lowercase();
        data.phone = non_blank(data.phone);
        data.address = non_blank(data.address);
        data.validate()?;
        validate_username(&data.username)?;
        if let Some(phone) = data.phone.as_deref() {
            validate_phone(phone)?;
        }

        if self.repository.users.username_exists(&data.username, None).await? {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if self.repository.users.email_exists(&data.email, None).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&data.password)?;
        let user = self
            .repository
            .users
            .create(NewUser {
                username: &data.username,
                email: &data.email,
                password_hash: &password_hash,
                phone: data.phone.as_deref(),
                address: data.address.as_deref(),
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        let token = self.issue_token(&user)?;
        Ok((token, user))
    }

    /// Authenticate by username or email and issue a token
    pub async fn login(&self, login: &str, password: &str) -> AppResult<(String, User)> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let user = match self.repository.users.find_by_login(login).await? {
            Some(user) if verify_password(&user.password_hash, password)? => user,
            _ => {
                tracing::warn!(login = %login, "Rejected login attempt");
                return Err(AppError::Authentication(
                    "Invalid username or password".to_string(),
                ));
            }
        };

        tracing::info!(user_id = user.id, "User logged in");

        let token = self.issue_token(&user)?;
        Ok((token, user))
    }

    /// Create a signed bearer token for a user
    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        UserClaims::new(user.id, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Resolve a bearer token to the current identity of its user
    pub async fn resolve_principal(&self, token: &str) -> AppResult<Principal> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))?;

        let user = self
            .repository
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?;

        Ok(Principal::from(&user))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Update the caller's own profile
    pub async fn update_profile(&self, user_id: i64, mut data: UpdateProfile) -> AppResult<User> {
        data.username = data.username.map(|u| u.trim().to_string());
        data.email = data.email.map(|e| e.trim().to_lowercase());
        data.validate()?;

        let mut changes = ProfileChanges::default();

        if let Some(username) = data.username {
            validate_username(&username)?;
            if self.repository.users.username_exists(&username, Some(user_id)).await? {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
            changes.username = Some(username);
        }

        if let Some(email) = data.email {
            if self.repository.users.email_exists(&email, Some(user_id)).await? {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
            changes.email = Some(email);
        }

        if let Some(phone) = data.phone {
            let phone = phone.trim().to_string();
            if !phone.is_empty() {
                validate_phone(&phone)?;
            }
            changes.phone = Some(phone);
        }

        changes.address = data.address.map(|a| a.trim().to_string());

        if let Some(password) = data.password {
            changes.password_hash = Some(hash_password(&password)?);
        }

        let user = self.repository.users.update_profile(user_id, &changes).await?;
        tracing::info!(user_id, "Profile updated");
        Ok(user)
    }

    /// Change password after checking the current one
    pub async fn change_password(&self, user_id: i64, data: ChangePassword) -> AppResult<()> {
        data.validate()?;

        let user = self.repository.users.get_by_id(user_id).await?;
        if !verify_password(&user.password_hash, &data.current_password)? {
            return Err(AppError::Authentication(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(&data.new_password)?;
        self.repository.users.set_password_hash(user_id, &password_hash).await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// List users (admin)
    pub async fn list(&self, actor: &Principal, pagination: Pagination) -> AppResult<(Vec<User>, i64)> {
        actor.require_admin()?;
        self.repository.users.list(pagination).await
    }

    /// Grant or revoke admin privileges
    pub async fn set_role(&self, actor: &Principal, target_id: i64, role: Role) -> AppResult<User> {
        actor.require_admin()?;

        if role == Role::User && target_id == actor.user_id {
            return Err(AppError::Validation(
                "Cannot remove admin privileges from yourself".to_string(),
            ));
        }

        let user = self.repository.users.set_role(target_id, role).await?;
        tracing::info!(
            actor_id = actor.user_id,
            user_id = user.id,
            role = %role,
            "User role changed"
        );
        Ok(user)
    }

    /// Create an administrator unless the username is already taken.
    /// Returns the existing or new account.
    pub async fn ensure_admin(&self, username: &str, email: &str, password: &str) -> AppResult<User> {
        validate_username(username)?;
        if let Some(user) = self.repository.users.find_by_login(username).await? {
            if user.username == username {
                return Ok(user);
            }
        }

        let password_hash = hash_password(password)?;
        let user = self
            .repository
            .users
            .create(NewUser {
                username,
                email: &email.trim().to_lowercase(),
                password_hash: &password_hash,
                phone: None,
                address: None,
                role: Role::Admin,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Bootstrap administrator created");
        Ok(user)
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a plaintext attempt against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Usernames cannot contain `@`, which marks an email login
pub fn validate_username(username: &str) -> AppResult<()> {
    if username.contains('@') {
        return Err(AppError::Validation(
            "Username cannot contain '@'".to_string(),
        ));
    }
    Ok(())
}

/// Validate phone number format
pub fn validate_phone(phone: &str) -> AppResult<()> {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE_REGEX
        .get_or_init(|| Regex::new(r"^[+]?[1-9]?\d{9,15}$").expect("Failed to compile phone regex"));

    if regex.is_match(phone) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid phone number format".to_string()))
    }
}
