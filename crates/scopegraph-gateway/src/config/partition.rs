//! Partition marker labels: how a tenant id becomes a label and back

use regex::Regex;

use crate::data::{ConfigError, TenantId};

pub const DEFAULT_PARTITION_PREFIX: &str = "t";
pub const DEFAULT_SHARED_LABEL: &str = "Global";
pub const DEFAULT_TENANT_PATTERN: &str = "[0-9]+";

/// Naming scheme for tenant partition labels and the shared-access label.
#[derive(Debug, Clone)]
pub struct PartitionScheme {
    prefix: String,
    shared_label: String,
    tenant_pattern: Regex,
}

impl PartitionScheme {
    /// `tenant_pattern` is matched against the whole tenant id.
    pub fn new(
        prefix: impl Into<String>,
        shared_label: impl Into<String>,
        tenant_pattern: &str,
    ) -> Result<Self, ConfigError> {
        let prefix = prefix.into();
        let shared_label = shared_label.into();
        if prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("partition prefix must not be empty".into()));
        }
        if shared_label.trim().is_empty() {
            return Err(ConfigError::Invalid("shared label must not be empty".into()));
        }
        let tenant_pattern = Regex::new(&format!("^(?:{})$", tenant_pattern))?;
        Ok(Self {
            prefix,
            shared_label,
            tenant_pattern,
        })
    }

    pub fn is_valid_tenant(&self, tenant_id: &TenantId) -> bool {
        self.tenant_pattern.is_match(tenant_id.as_str())
    }

    pub fn partition_label(&self, tenant_id: &TenantId) -> String {
        format!("{}{}", self.prefix, tenant_id.as_str())
    }

    pub fn shared_label(&self) -> &str {
        &self.shared_label
    }

    /// True for the shared label and for the partition label of any valid tenant.
    pub fn is_marker_label(&self, label: &str) -> bool {
        if label == self.shared_label {
            return true;
        }
        match label.strip_prefix(self.prefix.as_str()) {
            Some(rest) if !rest.is_empty() => self.tenant_pattern.is_match(rest),
            _ => false,
        }
    }
}

impl Default for PartitionScheme {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PARTITION_PREFIX.to_string(),
            shared_label: DEFAULT_SHARED_LABEL.to_string(),
            tenant_pattern: Regex::new(&format!("^(?:{})$", DEFAULT_TENANT_PATTERN))
                .expect("default tenant pattern is a valid regex"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_label_uses_prefix() {
        let scheme = PartitionScheme::default();
        assert_eq!(scheme.partition_label(&TenantId::new("7")), "t7");
    }

    #[test]
    fn test_marker_label_detection() {
        let scheme = PartitionScheme::default();
        assert!(scheme.is_marker_label("t7"));
        assert!(scheme.is_marker_label("t1024"));
        assert!(scheme.is_marker_label("Global"));
        assert!(!scheme.is_marker_label("t"));
        assert!(!scheme.is_marker_label("Topic"));
        assert!(!scheme.is_marker_label("CVE"));
    }

    #[test]
    fn test_tenant_pattern_is_anchored() {
        let scheme = PartitionScheme::default();
        assert!(scheme.is_valid_tenant(&TenantId::new("42")));
        assert!(!scheme.is_valid_tenant(&TenantId::new("42) OR (1=1")));
        assert!(!scheme.is_valid_tenant(&TenantId::new("")));
    }

    #[test]
    fn test_rejects_empty_prefix_and_bad_pattern() {
        assert!(matches!(
            PartitionScheme::new("", "Global", "[0-9]+"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PartitionScheme::new("t", "Global", "[0-9"),
            Err(ConfigError::Pattern(_))
        ));
    }
}
