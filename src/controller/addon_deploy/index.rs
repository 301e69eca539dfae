//! # Work Indexes
//!
//! Secondary indexes over cached ManifestWorks, keyed `namespace/addon`, so a
//! syncer can find the works it created earlier without keeping any state.

use crate::constants::{ADDON_LABEL_KEY, ADDON_NAMESPACE_LABEL_KEY};
use crate::controller::addon_deploy::mode::{
    pre_delete_hook_hosting_work_name, pre_delete_hook_work_name,
};
use crate::crd::ManifestWork;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkIndexName {
    /// Deploy works in the addon's own namespace, keyed by the work namespace
    ByAddon,
    /// Deploy works on a hosting cluster, keyed by the addon namespace label
    ByHostedAddon,
    /// Pre-delete hook works on a hosting cluster, keyed by the addon namespace label
    HookByHostedAddon,
}

impl WorkIndexName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkIndexName::ByAddon => "manifestWorkByAddon",
            WorkIndexName::ByHostedAddon => "manifestWorkByHostedAddon",
            WorkIndexName::HookByHostedAddon => "manifestWorkHookByHostedAddon",
        }
    }
}

impl fmt::Display for WorkIndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup key for an addon: `namespace/addon`
#[must_use]
pub fn index_lookup_key(namespace: &str, addon: &str) -> String {
    format!("{namespace}/{addon}")
}

/// Key under which `work` is indexed by `index`, if it belongs to that index
#[must_use]
pub fn index_key(index: WorkIndexName, work: &ManifestWork) -> Option<String> {
    let addon = work.label(ADDON_LABEL_KEY).filter(|a| !a.is_empty())?;
    let addon_namespace = work.label(ADDON_NAMESPACE_LABEL_KEY).unwrap_or_default();
    let name = work.metadata.name.as_deref().unwrap_or_default();
    let is_hook = name.starts_with(&pre_delete_hook_work_name(addon))
        || name.starts_with(&pre_delete_hook_hosting_work_name(addon_namespace, addon));

    match index {
        WorkIndexName::ByAddon => {
            if !addon_namespace.is_empty() || is_hook {
                return None;
            }
            let namespace = work.metadata.namespace.as_deref().unwrap_or_default();
            Some(index_lookup_key(namespace, addon))
        }
        WorkIndexName::ByHostedAddon => {
            if addon_namespace.is_empty() || is_hook {
                return None;
            }
            Some(index_lookup_key(addon_namespace, addon))
        }
        WorkIndexName::HookByHostedAddon => {
            if addon_namespace.is_empty() || !is_hook {
                return None;
            }
            Some(index_lookup_key(addon_namespace, addon))
        }
    }
}
