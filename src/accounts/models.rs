

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::core::batch::ItemError;

// Also matches the truncated form some login responses carry.
const LOGIN_FAILURE_PREFIX: &str = "login unsuccessfu";


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountAction {
    Login,
    Sync,
    Delete,
}


#[derive(Error, Debug)]
pub enum AccountsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Remote error (code {code}): {message}")]
    Remote { code: i64, message: String },

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("Invalid account id: {0:?}")]
    InvalidAccountId(String),
}

impl From<AccountsError> for ItemError {
    fn from(err: AccountsError) -> Self {
        match err {
            AccountsError::Remote { code, message } => ItemError::Remote { code, message },
            other => ItemError::Failed(other.to_string()),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
}


#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<(String, Option<T>), AccountsError> {
        if let Some(error) = self.error {
            return Err(AccountsError::Remote {
                code: self.code,
                message: format!("{}: {}", error.kind, error.detail),
            });
        }

        if self.code != 0 {
            return Err(AccountsError::Remote {
                code: self.code,
                message: self.message,
            });
        }

        Ok((self.message, self.data))
    }
}


#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionData {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub account_id: Option<String>,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountActionResponse {
    pub account_id: String,
    pub action: AccountAction,
    pub message: String,
}

impl AccountActionResponse {
    pub fn from_envelope(
        action: AccountAction,
        account_id: &str,
        envelope: ApiEnvelope<ActionData>,
    ) -> Result<Self, AccountsError> {
        let code = envelope.code;
        let (message, data) = envelope.into_result()?;
        let data = data.unwrap_or_default();

        if action == AccountAction::Login {
            let rejected = data.success == Some(false)
                || message.to_lowercase().contains(LOGIN_FAILURE_PREFIX);
            if rejected {
                return Err(AccountsError::Remote { code, message });
            }
        }

        Ok(Self {
            account_id: data.account_id.unwrap_or_else(|| account_id.to_string()),
            action,
            message,
        })
    }
}
