

mod client;
mod models;
mod operation;

pub use client::AccountsClient;
pub use models::{
    AccountAction, AccountActionResponse, AccountsError, ActionData, ApiEnvelope, ApiErrorDetail,
};
pub use operation::AccountOperation;
