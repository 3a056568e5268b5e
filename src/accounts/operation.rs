

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::client::AccountsClient;
use super::models::{AccountAction, AccountActionResponse};
use crate::core::batch::{BatchOperation, ItemError};


/// Applies one account action per item, with the item as the account id.
pub struct AccountOperation {
    client: Arc<AccountsClient>,
    action: AccountAction,
}

impl AccountOperation {
    pub fn new(client: Arc<AccountsClient>, action: AccountAction) -> Self {
        Self { client, action }
    }

    pub fn action(&self) -> AccountAction {
        self.action
    }
}

#[async_trait]
impl BatchOperation<String> for AccountOperation {
    type Output = AccountActionResponse;

    async fn run(&self, account_id: String, index: usize) -> Result<Self::Output, ItemError> {
        debug!("Account {} #{}: {}", self.action, index, account_id);
        Ok(self.client.perform(self.action, &account_id).await?)
    }
}
