use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{NewUser, ProfilePatch, RegisterRequest, User, UserRole};
use crate::store::Store;

pub struct UserService;

impl UserService {
    /// Registers a user with an institutional email address.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a bad username or a non-institutional email
    /// - [`AppError::DuplicateKey`] naming `email` or `username`
    #[instrument(skip_all)]
    pub async fn register(store: &dyn Store, request: RegisterRequest) -> AppResult<User> {
        debug!("Processing registration");

        let request = request.normalized();
        request.validate().map_err(|e| {
            warn!(error = %e, "Rejected registration payload");
            AppError::from(e)
        })?;
        if request.role == UserRole::Admin {
            warn!("Rejected self-assigned admin role");
            return Err(AppError::validation("admin role cannot be self-assigned"));
        }

        let user = store
            .insert_user(NewUser {
                username: request.username,
                email: request.email,
                role: request.role,
                major: request.major,
                grad_year: request.grad_year,
            })
            .await?;

        info!(user_id = %user.id, role = ?user.role, "User registered");
        Ok(user)
    }

    pub async fn get_user(store: &dyn Store, id: Uuid) -> AppResult<User> {
        store
            .user_by_id(id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(store: &dyn Store, email: &str) -> AppResult<User> {
        store
            .user_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    #[instrument(skip_all, fields(actor = %actor, user_id = %id))]
    pub async fn update_profile(
        store: &dyn Store,
        actor: Uuid,
        id: Uuid,
        patch: ProfilePatch,
    ) -> AppResult<User> {
        if actor != id {
            warn!("Rejected profile edit of another user");
            return Err(AppError::Ownership("can only edit your own profile"));
        }

        let patch = patch.normalized();
        patch.validate()?;

        let user = store
            .update_user(id, &patch)
            .await?
            .ok_or(AppError::NotFound("user"))?;

        info!("Profile updated");
        Ok(user)
    }
}
