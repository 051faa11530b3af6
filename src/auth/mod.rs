//! Authentication and user management for EFarmerConnect

mod types;

use log::{error, info};
use serde_json::Value;

use efarmer_auth::store::USER;

use crate::error::{Error, Result};
use crate::fetch::ApiClient;
use crate::interceptor::validation_messages;

pub use types::*;

/// Client for login, registration, password and profile operations
#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    /// Create a new Auth client
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Sign in with a username and password.
    ///
    /// Both tokens are persisted and the access token becomes the default
    /// bearer credential for every following request.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let credentials = LoginCredentials {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self
            .client
            .post("/token/")
            .json(&credentials)?
            .execute::<TokenResponse>()
            .await
            .map_err(|err| {
                error!("Login failed: {}", err);
                user_facing(err, "Login failed. Please check your credentials.")
            })?;

        let (access, refresh) = match (response.access, response.refresh) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                (access, refresh)
            }
            _ => return Err(Error::auth("Invalid response from server")),
        };

        self.client.session().establish(&access, &refresh);
        info!("Logged in as {}", username);

        Ok(TokenPair { access, refresh })
    }

    /// Drop the session and return to the login page
    pub fn logout(&self) {
        self.client.session().logout();
    }

    /// Create an account
    pub async fn register(&self, request: &RegisterRequest) -> Result<Value> {
        let result = self
            .client
            .post("/register/")
            .json(request)?
            .execute::<Value>()
            .await;

        match result {
            Ok(created) => {
                self.notify_success("Registration successful! Please log in.");
                Ok(created)
            }
            Err(err) => {
                error!("Registration failed: {}", err);
                let fields = err
                    .body()
                    .filter(|body| body.is_object())
                    .map(|body| validation_messages(body).join(" "))
                    .filter(|joined| !joined.is_empty());
                match fields {
                    Some(joined) => Err(Error::Auth(joined)),
                    None => Err(user_facing(err, "Registration failed. Please try again.")),
                }
            }
        }
    }

    /// Ask for a password reset link to be emailed
    pub async fn request_password_reset(&self, email: &str) -> Result<Value> {
        let response = self
            .client
            .post("/password-reset/request/")
            .json(&PasswordResetRequest { email })?
            .execute::<Value>()
            .await
            .map_err(|err| user_facing(err, "Failed to send password reset email."))?;

        self.notify_success("Password reset link has been sent to your email.");
        Ok(response)
    }

    /// Set a new password using the token from the reset email
    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> Result<Value> {
        let response = self
            .client
            .post("/password-reset/confirm/")
            .json(&PasswordResetConfirm {
                token,
                new_password,
            })?
            .execute::<Value>()
            .await
            .map_err(|err| user_facing(err, "Failed to reset password."))?;

        self.notify_success("Password has been reset successfully.");
        Ok(response)
    }

    /// Fetch the signed-in user's profile and cache it
    pub async fn get_profile(&self) -> Result<User> {
        let user = self
            .client
            .get("/profile/")
            .execute::<User>()
            .await
            .map_err(|err| user_facing(err, "Failed to load profile."))?;

        self.client.session().store().set_item(USER, &user);
        Ok(user)
    }

    /// Update editable profile fields
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let user = self
            .client
            .put("/profile/")
            .json(update)?
            .execute::<User>()
            .await
            .map_err(|err| user_facing(err, "Failed to update profile."))?;

        self.client.session().store().set_item(USER, &user);
        self.notify_success("Profile updated successfully");
        Ok(user)
    }

    /// Change the password of the signed-in user
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<Value> {
        let response = self
            .client
            .post("/change-password/")
            .json(&ChangePasswordRequest {
                old_password: current_password,
                new_password,
            })?
            .execute::<Value>()
            .await
            .map_err(|err| user_facing(err, "Failed to change password."))?;

        self.notify_success("Password changed successfully");
        Ok(response)
    }

    /// The profile cached by the last successful profile call
    pub fn current_user(&self) -> Option<User> {
        self.client.session().store().get_item(USER)
    }

    /// Whether a non-expired access token is stored
    pub fn is_authenticated(&self) -> bool {
        self.client.session().is_authenticated()
    }

    /// `Bearer <token>` for the stored access token, if any
    pub fn auth_header(&self) -> Option<String> {
        self.client
            .session()
            .access_token()
            .map(|token| format!("Bearer {}", token))
    }

    /// Replace (or with `None`, clear) the stored access token and default header
    pub fn set_auth_header(&self, token: Option<&str>) {
        self.client.session().set_access_token(token);
    }

    fn notify_success(&self, message: &str) {
        self.client.session().notifier().success(message);
    }
}

/// Collapse an error into the `detail` the server sent, or `fallback`.
fn user_facing(err: Error, fallback: &str) -> Error {
    match err.detail() {
        Some(detail) => Error::auth(detail),
        None => Error::auth(fallback),
    }
}
