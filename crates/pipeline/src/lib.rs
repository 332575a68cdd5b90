//! Job bodies for docdesk: invoice merging, invoice field extraction and
//! listing harvest.
//!
//! Each body implements [`docdesk_core::body::JobBody`]; [`JobBodies`] maps
//! job kinds to the body that runs them.

pub mod extract;
pub mod harvest;
pub mod merge;
pub mod scan;

use std::collections::HashMap;
use std::sync::Arc;

use docdesk_core::body::JobBody;
use docdesk_core::job::JobKind;

use crate::extract::ExtractBody;
use crate::harvest::client::HarvestError;
use crate::harvest::{HarvestBody, HarvestConfig};
use crate::merge::MergeBody;

/// Registry of job bodies keyed by kind.
#[derive(Clone, Default)]
pub struct JobBodies {
    bodies: HashMap<JobKind, Arc<dyn JobBody>>,
}

impl JobBodies {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production bodies for every kind.
    pub fn standard(harvest: HarvestConfig) -> Result<Self, HarvestError> {
        Ok(Self::new()
            .with(Arc::new(MergeBody::new()))
            .with(Arc::new(ExtractBody::new()))
            .with(Arc::new(HarvestBody::new(harvest)?)))
    }

    /// Register `body` under its own kind, replacing any earlier one.
    pub fn with(mut self, body: Arc<dyn JobBody>) -> Self {
        self.bodies.insert(body.kind(), body);
        self
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobBody>> {
        self.bodies.get(&kind).cloned()
    }

    pub fn kinds(&self) -> impl Iterator<Item = JobKind> + '_ {
        self.bodies.keys().copied()
    }
}

impl std::fmt::Debug for JobBodies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobBodies")
            .field("kinds", &self.bodies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registers_every_kind() {
        let bodies = JobBodies::standard(HarvestConfig::default()).unwrap();
        for kind in JobKind::ALL {
            assert_eq!(bodies.get(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let bodies = JobBodies::new()
            .with(Arc::new(MergeBody::new()))
            .with(Arc::new(MergeBody::new()));
        assert_eq!(bodies.kinds().count(), 1);
        assert!(bodies.get(JobKind::Extract).is_none());
    }
}
