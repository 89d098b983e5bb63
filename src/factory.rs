// The filter factory: the ordered set of field groups a rule or template
// may reference, and the field catalog they export.

use crate::error::Result;
use crate::field_check::{BoundField, CheckInfo, FieldGroup};
use crate::jevt::JevtFields;
use crate::k8s_audit::K8sAuditFields;
use log::debug;

/// Resolves field references against every known field group.
///
/// Groups are tried in a fixed order (`jevt`, then `ka`) and the first group
/// that recognizes a reference binds it. Built once and shared read-only.
#[derive(Debug, Clone)]
pub struct FilterFactory {
    groups: Vec<FieldGroup>,
    info: Vec<CheckInfo>,
}

impl FilterFactory {
    pub fn new() -> Self {
        let groups = vec![
            FieldGroup::Jevt(JevtFields::new()),
            FieldGroup::K8sAudit(K8sAuditFields::new()),
        ];
        let info: Vec<CheckInfo> = groups.iter().map(|g| g.info().clone()).collect();

        debug!(
            "filter factory ready: {} field groups, {} fields",
            groups.len(),
            info.iter().map(|i| i.fields.len()).sum::<usize>()
        );

        FilterFactory { groups, info }
    }

    /// Binds the field reference at the start of `raw`.
    ///
    /// Returns the bound field and the number of bytes it took, or
    /// `Ok(None)` when no group knows the field. A malformed reference to a
    /// known field is an error.
    pub fn new_filtercheck(&self, raw: &str) -> Result<Option<(BoundField, usize)>> {
        for group in &self.groups {
            if let Some(found) = group.parse_field_name(raw)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// The field catalog of every group, in lookup order.
    pub fn fields(&self) -> &[CheckInfo] {
        &self.info
    }

    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }
}

impl Default for FilterFactory {
    fn default() -> Self {
        Self::new()
    }
}
