//! Regions and images.

use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::Error;
use crate::models::{Image, Region};
use crate::operation::Operation;

#[must_use]
pub fn list_regions() -> Operation<Vec<Region>> {
    Operation::get("region")
}

#[must_use]
pub fn list_images() -> Operation<Vec<Image>> {
    Operation::get("image")
}

impl Client {
    /// List all regions.
    ///
    /// # Errors
    /// Returns error if the request fails or the body cannot be decoded.
    pub async fn list_regions(&self, ctx: &CancellationToken) -> Result<Vec<Region>, Error> {
        let response = self.execute(ctx, list_regions()).await?;
        Ok(response.result.unwrap_or_default())
    }

    /// List all images.
    ///
    /// # Errors
    /// Returns error if the request fails or the body cannot be decoded.
    pub async fn list_images(&self, ctx: &CancellationToken) -> Result<Vec<Image>, Error> {
        let response = self.execute(ctx, list_images()).await?;
        Ok(response.result.unwrap_or_default())
    }
}
