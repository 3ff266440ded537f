//! Tenant image URLs.
//!
//! Images are served through the API, which proxies the tenant's bucket:
//!
//! ```text
//! {api}/{tenant}/storage/gcs/img/tenants/{tenant}/{type}/{filename}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::TenantContext;
use crate::TenantId;

/// Returned whenever a real URL cannot be built.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

/// Folder an image lives in under the tenant's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Product,
    Customer,
    Banner,
    Category,
    Review,
    Notification,
    Ecommerce,
    DeliveryMan,
    Chat,
    CategoryBanner,
    FlashSale,
    Gateway,
    Order,
}

impl ImageType {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageType::Product => "product",
            ImageType::Customer => "customer",
            ImageType::Banner => "banner",
            ImageType::Category => "category",
            ImageType::Review => "review",
            ImageType::Notification => "notification",
            ImageType::Ecommerce => "ecommerce",
            ImageType::DeliveryMan => "delivery_man",
            ImageType::Chat => "chat",
            ImageType::CategoryBanner => "category_banner",
            ImageType::FlashSale => "flash_sale",
            ImageType::Gateway => "gateway",
            ImageType::Order => "order",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds image URLs for whatever tenant the context holds at call time.
#[derive(Debug, Clone)]
pub struct ImageUrls {
    api_base: String,
    context: TenantContext,
}

impl ImageUrls {
    pub fn new(api_base: impl Into<String>, context: TenantContext) -> Self {
        let api_base: String = api_base.into();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            context,
        }
    }

    /// URL for `filename`, or [`PLACEHOLDER_IMAGE`] if the filename is
    /// missing or no tenant is current.
    pub fn url(&self, kind: ImageType, filename: Option<&str>) -> String {
        let Some(filename) = filename.filter(|f| !f.is_empty()) else {
            return PLACEHOLDER_IMAGE.to_string();
        };
        match self.context.guard() {
            Some(guard) => image_url(&self.api_base, guard.tenant(), kind, filename),
            None => PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

/// URL for `filename` under `tenant`. A leading `/` on the filename is dropped.
pub fn image_url(api_base: &str, tenant: &TenantId, kind: ImageType, filename: &str) -> String {
    let api_base = api_base.trim_end_matches('/');
    let filename = filename.strip_prefix('/').unwrap_or(filename);
    format!("{api_base}/{tenant}/storage/gcs/img/tenants/{tenant}/{kind}/{filename}")
}
