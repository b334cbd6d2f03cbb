//! Tenant identity.
//!
//! Every registry, store query and emitted event is partitioned by a tenant.
//! Two tenants with the same id but different region or version are distinct
//! partitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::TenantId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    id: TenantId,
    region: String,
    major_version: u16,
    minor_version: u16,
}

impl Tenant {
    pub fn new(
        id: TenantId,
        region: impl Into<String>,
        major_version: u16,
        minor_version: u16,
    ) -> Self {
        Self {
            id,
            region: region.into(),
            major_version,
            minor_version,
        }
    }

    pub fn id(&self) -> TenantId {
        self.id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    /// GMS v83 auto-assigns beginner stats below level 11.
    pub fn auto_assigns_beginner_stats(&self) -> bool {
        self.region == "GMS" && self.major_version == 83
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} v{}.{}]",
            self.id, self.region, self.major_version, self.minor_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gms_83_auto_assigns_beginner_stats() {
        let tenant = Tenant::new(TenantId::new(), "GMS", 83, 1);
        assert!(tenant.auto_assigns_beginner_stats());

        let tenant = Tenant::new(TenantId::new(), "GMS", 95, 1);
        assert!(!tenant.auto_assigns_beginner_stats());

        let tenant = Tenant::new(TenantId::new(), "JMS", 83, 1);
        assert!(!tenant.auto_assigns_beginner_stats());
    }
}
