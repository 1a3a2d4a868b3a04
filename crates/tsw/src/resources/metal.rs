//! Bare metal services.

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::Client;
use crate::error::Error;
use crate::models::{
    CreateMetalRequest, Empty, LogMessage, Metal, MetalConfiguration, MetalTier, MetalTierType,
    PowerCommand, ReinstallMetalRequest, RenameMetalRequest, Status,
};
use crate::operation::Operation;
use crate::response::ApiResponse;

/// Filters for [`Client::list_metal`]. Zero and `None` values are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMetalOptions {
    pub skip: u32,
    pub limit: u32,
    pub status: Option<Status>,
    pub region: Option<String>,
    pub tier: Option<String>,
    pub tag: Option<String>,
    pub project_id: Option<i64>,
    pub tier_type: Option<MetalTierType>,
}

impl ListMetalOptions {
    fn apply<T>(&self, mut op: Operation<T>) -> Operation<T> {
        if self.skip > 0 {
            op = op.query("Skip", self.skip);
        }
        if self.limit > 0 {
            op = op.query("Limit", self.limit);
        }
        if let Some(status) = self.status {
            op = op.query("Status", status.as_str());
        }
        if let Some(region) = &self.region {
            op = op.query("Region", region);
        }
        if let Some(tier) = &self.tier {
            op = op.query("Tier", tier);
        }
        if let Some(tag) = &self.tag {
            op = op.query("Tag", tag);
        }
        if let Some(project_id) = self.project_id.filter(|id| *id > 0) {
            op = op.query("ProjectId", project_id);
        }
        if let Some(tier_type) = self.tier_type {
            op = op.query("MetalTierType", tier_type.as_str());
        }
        op
    }
}

#[must_use]
pub fn list(opts: &ListMetalOptions) -> Operation<Vec<Metal>> {
    opts.apply(Operation::get("Metal"))
}

/// # Errors
/// Returns [`Error::Encoding`] if the body cannot be serialized.
pub fn create(project_id: i64, req: &CreateMetalRequest) -> Result<Operation<Metal>, Error> {
    Ok(Operation::post("Metal")
        .query("projectId", project_id)
        .json(req)?)
}

#[must_use]
pub fn get(id: i64) -> Operation<Metal> {
    Operation::get(format!("Metal/{id}")).require_success()
}

/// # Errors
/// Returns [`Error::Encoding`] if the body cannot be serialized.
pub fn reinstall(id: i64, req: &ReinstallMetalRequest) -> Result<Operation<Metal>, Error> {
    Operation::post(format!("Metal/{id}/Reinstall")).json(req)
}

#[must_use]
pub fn power_command(id: i64, command: PowerCommand) -> Operation<Metal> {
    Operation::post(format!("Metal/{id}/PowerCommand"))
        .query("command", command.as_str())
        .require_success()
}

#[must_use]
pub fn logs(id: i64) -> Operation<Vec<LogMessage>> {
    Operation::get(format!("Metal/{id}/Logs")).require_success()
}

#[must_use]
pub fn tiers(tier_type: Option<MetalTierType>) -> Operation<Vec<MetalTier>> {
    let op = Operation::get("Metal/tiers").require_success();
    match tier_type {
        Some(tier_type) => op.query("metalTierType", tier_type.as_str()),
        None => op,
    }
}

#[must_use]
pub fn availability(project_id: i64, region: &str) -> Operation<Vec<MetalConfiguration>> {
    Operation::get("Metal/Availability")
        .query("ProjectId", project_id)
        .query("Region", region)
        .require_success()
}

/// # Errors
/// Returns [`Error::Encoding`] if the body cannot be serialized.
pub fn rename(id: i64, name: &str) -> Result<Operation<Empty>, Error> {
    Ok(Operation::post(format!("Metal/{id}/rename"))
        .json(&RenameMetalRequest {
            name: name.to_string(),
        })?
        .require_success())
}

impl Client {
    /// List metal services matching `opts`.
    ///
    /// # Errors
    /// Returns error if the request fails or the body cannot be decoded.
    pub async fn list_metal(
        &self,
        ctx: &CancellationToken,
        opts: &ListMetalOptions,
    ) -> Result<ApiResponse<Vec<Metal>>, Error> {
        self.execute(ctx, list(opts)).await
    }

    /// Order a new metal service in `project_id`.
    ///
    /// # Errors
    /// Returns error if the request fails or the body cannot be decoded.
    pub async fn create_metal(
        &self,
        ctx: &CancellationToken,
        project_id: i64,
        req: &CreateMetalRequest,
    ) -> Result<ApiResponse<Metal>, Error> {
        info!(
            project_id,
            display_name = %req.display_name,
            region = %req.region_id,
            tier = %req.tier_id,
            "Creating metal service"
        );
        self.execute(ctx, create(project_id, req)?).await
    }

    /// Fetch one metal service.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn get_metal(
        &self,
        ctx: &CancellationToken,
        id: i64,
    ) -> Result<ApiResponse<Metal>, Error> {
        self.execute(ctx, get(id)).await
    }

    /// Reinstall a metal service.
    ///
    /// # Errors
    /// Returns error if the request fails or the body cannot be decoded.
    pub async fn reinstall_metal(
        &self,
        ctx: &CancellationToken,
        id: i64,
        req: &ReinstallMetalRequest,
    ) -> Result<ApiResponse<Metal>, Error> {
        info!(metal_id = id, image = ?req.image_id, "Reinstalling metal service");
        self.execute(ctx, reinstall(id, req)?).await
    }

    /// Power a metal service on or off.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn send_power_command(
        &self,
        ctx: &CancellationToken,
        id: i64,
        command: PowerCommand,
    ) -> Result<ApiResponse<Metal>, Error> {
        info!(metal_id = id, %command, "Sending power command");
        self.execute(ctx, power_command(id, command)).await
    }

    /// Fetch the log of a metal service.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn get_metal_logs(
        &self,
        ctx: &CancellationToken,
        id: i64,
    ) -> Result<ApiResponse<Vec<LogMessage>>, Error> {
        self.execute(ctx, logs(id)).await
    }

    /// Copy the raw log response of a metal service into `sink`.
    ///
    /// # Errors
    /// Returns error if the request fails or the sink cannot be written.
    pub async fn copy_metal_logs<W>(
        &self,
        ctx: &CancellationToken,
        id: i64,
        sink: &mut W,
    ) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.execute_into(ctx, logs(id), sink).await
    }

    /// List hardware tiers, optionally of one type.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn list_metal_tiers(
        &self,
        ctx: &CancellationToken,
        tier_type: Option<MetalTierType>,
    ) -> Result<ApiResponse<Vec<MetalTier>>, Error> {
        self.execute(ctx, tiers(tier_type)).await
    }

    /// Configurations orderable by `project_id` in `region`.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn get_metal_availability(
        &self,
        ctx: &CancellationToken,
        project_id: i64,
        region: &str,
    ) -> Result<ApiResponse<Vec<MetalConfiguration>>, Error> {
        self.execute(ctx, availability(project_id, region)).await
    }

    /// Rename a metal service.
    ///
    /// # Errors
    /// Returns error if the request fails or the envelope reports failure.
    pub async fn rename_metal(
        &self,
        ctx: &CancellationToken,
        id: i64,
        name: &str,
    ) -> Result<ApiResponse<Empty>, Error> {
        info!(metal_id = id, name, "Renaming metal service");
        self.execute(ctx, rename(id, name)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[test]
    fn test_list_options_to_query() {
        let op = list(&ListMetalOptions {
            limit: 1,
            region: Some("SLC1".into()),
            status: Some(Status::Active),
            project_id: Some(480),
            tier_type: Some(MetalTierType::Gpu),
            ..ListMetalOptions::default()
        });
        assert_eq!(op.path(), "Metal");
        assert_eq!(op.query_value("Limit"), Some("1"));
        assert_eq!(op.query_value("Region"), Some("SLC1"));
        assert_eq!(op.query_value("Status"), Some("Active"));
        assert_eq!(op.query_value("ProjectId"), Some("480"));
        assert_eq!(op.query_value("MetalTierType"), Some("GPU"));
        assert_eq!(op.query_value("Skip"), None);
        assert!(!op.requires_success());
    }

    #[test]
    fn test_empty_list_options_send_nothing() {
        let op = list(&ListMetalOptions::default());
        assert!(op.request_options().is_empty());
    }

    #[test]
    fn test_power_command_operation() {
        let op = power_command(10346, PowerCommand::PowerOff);
        assert_eq!(op.method(), &Method::POST);
        assert_eq!(op.path(), "Metal/10346/PowerCommand");
        assert_eq!(op.query_value("command"), Some("PowerOff"));
        assert!(op.requires_success());
        assert!(op.request_body().is_empty());
    }

    #[test]
    fn test_tiers_operation() {
        assert_eq!(tiers(None).query_value("metalTierType"), None);
        assert_eq!(
            tiers(Some(MetalTierType::Compute)).query_value("metalTierType"),
            Some("Compute")
        );
    }

    #[test]
    fn test_create_and_reinstall_do_not_require_success() {
        let create_op = create(480, &CreateMetalRequest::default()).unwrap();
        assert_eq!(create_op.query_value("projectId"), Some("480"));
        assert!(!create_op.requires_success());

        let reinstall_op = reinstall(7, &ReinstallMetalRequest::default()).unwrap();
        assert_eq!(reinstall_op.path(), "Metal/7/Reinstall");
        assert!(!reinstall_op.requires_success());
    }

    #[test]
    fn test_rename_body() {
        let op = rename(7, "node-<1>").unwrap();
        assert_eq!(op.path(), "Metal/7/rename");
        assert_eq!(
            op.request_body().in_memory().unwrap().as_ref(),
            br#"{"name":"node-<1>"}"#
        );
    }

    #[test]
    fn test_availability_operation() {
        let op = availability(480, "LAX1");
        assert_eq!(op.path(), "Metal/Availability");
        assert_eq!(op.query_value("ProjectId"), Some("480"));
        assert_eq!(op.query_value("Region"), Some("LAX1"));
    }
}
