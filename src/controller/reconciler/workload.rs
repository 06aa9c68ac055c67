//! Workload kinds a descriptor may declare.

use crate::cluster::ResourceKind;
use crate::controller::descriptor::Descriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    CronJob,
    Deployment,
}

impl WorkloadKind {
    /// Parse the descriptor `kind` field
    #[must_use]
    pub fn from_descriptor(descriptor: &Descriptor) -> Option<Self> {
        match descriptor.kind.as_str() {
            "cronjob" => Some(WorkloadKind::CronJob),
            "deployment" => Some(WorkloadKind::Deployment),
            _ => None,
        }
    }

    #[must_use]
    pub fn resource_kind(self) -> ResourceKind {
        match self {
            WorkloadKind::CronJob => ResourceKind::CronJob,
            WorkloadKind::Deployment => ResourceKind::Deployment,
        }
    }

    /// Template tier used for this workload
    ///
    /// Cronjobs always use the default template; deployments pick the descriptor tier.
    #[must_use]
    pub fn template_tier(self, descriptor: &Descriptor) -> &str {
        match self {
            WorkloadKind::CronJob => "",
            WorkloadKind::Deployment => &descriptor.tier,
        }
    }

    /// Whether a `service` section produces a companion service
    #[must_use]
    pub fn has_service_side_channel(self) -> bool {
        matches!(self, WorkloadKind::Deployment)
    }
}
