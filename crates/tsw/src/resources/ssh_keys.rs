//! SSH keys.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::Client;
use crate::error::Error;
use crate::models::{CreateSshKeyRequest, SshKey};
use crate::operation::Operation;

#[must_use]
pub fn list() -> Operation<Vec<SshKey>> {
    Operation::get("SshKey").require_success()
}

#[must_use]
pub fn get(id: i64) -> Operation<SshKey> {
    Operation::get(format!("SshKey/{id}")).require_success()
}

/// Create a key in `project_id`; the request's own project is overwritten.
///
/// # Errors
/// Returns [`Error::Encoding`] if the body cannot be serialized.
pub fn create(project_id: i64, mut req: CreateSshKeyRequest) -> Result<Operation<SshKey>, Error> {
    req.project_id = project_id;
    Ok(Operation::post("SshKey").json(&req)?.require_success())
}

impl Client {
    /// List the SSH keys of the caller's projects.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn list_ssh_keys(&self, ctx: &CancellationToken) -> Result<Vec<SshKey>, Error> {
        let response = self.execute(ctx, list()).await?;
        Ok(response.result.unwrap_or_default())
    }

    /// Fetch one SSH key.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn get_ssh_key(&self, ctx: &CancellationToken, id: i64) -> Result<SshKey, Error> {
        self.execute(ctx, get(id)).await?.into_result()
    }

    /// Register a new SSH key.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn create_ssh_key(
        &self,
        ctx: &CancellationToken,
        project_id: i64,
        req: CreateSshKeyRequest,
    ) -> Result<SshKey, Error> {
        info!(project_id, display_name = %req.display_name, "Creating SSH key");
        let key = self.execute(ctx, create(project_id, req)?).await?.into_result()?;
        info!(key_id = key.id, "SSH key created");
        Ok(key)
    }
}
