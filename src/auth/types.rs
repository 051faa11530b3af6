//! Types for authentication and user management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Credentials exchanged for a token pair
#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Token pair issued on login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer credential
    pub access: String,

    /// Longer-lived credential used to obtain new access tokens
    pub refresh: String,
}

/// Login response as sent by the server, before validation
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// Marketplace role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    Farmer,
    Buyer,
    Admin,
}

/// Account registration data
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
}

/// User data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: i64,

    /// The login name
    pub username: String,

    /// The user's email address
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    /// The user's phone number
    #[serde(default)]
    pub phone_number: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    /// Farmer, buyer or admin
    #[serde(default)]
    pub user_type: Option<UserType>,

    /// Whether an admin has verified the account
    #[serde(default)]
    pub is_verified: Option<bool>,

    /// Fields this client does not model
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Editable profile fields; unset fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_coordinates: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetConfirm<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangePasswordRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}
