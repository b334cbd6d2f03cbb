//! Tenant headers carried by every HTTP request and topic message.

pub const TENANT_ID: &str = "TENANT_ID";
pub const REGION: &str = "REGION";
pub const MAJOR_VERSION: &str = "MAJOR_VERSION";
pub const MINOR_VERSION: &str = "MINOR_VERSION";
