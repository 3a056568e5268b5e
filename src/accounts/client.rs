

use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::models::{AccountAction, AccountActionResponse, AccountsError, ActionData, ApiEnvelope};
use crate::core::config::BulkOpsConfig;

const MAX_ERROR_BODY_CHARS: usize = 200;


pub struct AccountsClient {
    base_url: Url,
    access_token: Option<String>,
    client: Client,
}

impl AccountsClient {

    pub fn new(
        base_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AccountsError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| AccountsError::Endpoint(format!("{}: {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        info!("AccountsClient initialized for {}", base_url);

        Ok(Self {
            base_url,
            access_token,
            client,
        })
    }

    pub fn from_config(config: &BulkOpsConfig) -> Result<Self, AccountsError> {
        Self::new(
            &config.api_base_url,
            config.access_token.clone(),
            config.request_timeout(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, account_id: &str, action: AccountAction) -> Result<Url, AccountsError> {
        if account_id.trim().is_empty() {
            return Err(AccountsError::InvalidAccountId(account_id.to_string()));
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AccountsError::Endpoint(self.base_url.to_string()))?;
            segments.pop_if_empty().push("accounts").push(account_id);
            match action {
                AccountAction::Login => {
                    segments.push("login");
                }
                AccountAction::Sync => {
                    segments.push("sync");
                }
                AccountAction::Delete => {}
            }
        }
        Ok(url)
    }

    pub async fn login(&self, account_id: &str) -> Result<AccountActionResponse, AccountsError> {
        self.perform(AccountAction::Login, account_id).await
    }

    pub async fn sync(&self, account_id: &str) -> Result<AccountActionResponse, AccountsError> {
        self.perform(AccountAction::Sync, account_id).await
    }

    pub async fn delete(&self, account_id: &str) -> Result<AccountActionResponse, AccountsError> {
        self.perform(AccountAction::Delete, account_id).await
    }

    pub async fn perform(
        &self,
        action: AccountAction,
        account_id: &str,
    ) -> Result<AccountActionResponse, AccountsError> {
        let url = self.endpoint(account_id, action)?;
        let method = match action {
            AccountAction::Login | AccountAction::Sync => Method::POST,
            AccountAction::Delete => Method::DELETE,
        };

        let envelope: ApiEnvelope<ActionData> = self.send(method, url).await?;
        AccountActionResponse::from_envelope(action, account_id, envelope)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
    ) -> Result<ApiEnvelope<T>, AccountsError> {
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ApiEnvelope<T>>(&body) {
            Ok(envelope) if !status.is_success() && envelope.code == 0 => {
                Err(AccountsError::Remote {
                    code: i64::from(status.as_u16()),
                    message: envelope.message,
                })
            }
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(AccountsError::Remote {
                code: i64::from(status.as_u16()),
                message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
