use super::OutageSwitch;
use crate::domain_model::SubjectId;
use crate::domain_port::*;
use dashmap::DashSet;

#[derive(Debug, Default)]
pub struct MemoryIdentityLookup {
    subjects: DashSet<SubjectId>,
    accept_any: bool,
    switch: OutageSwitch,
}

impl MemoryIdentityLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subjects(subjects: impl IntoIterator<Item = SubjectId>) -> Self {
        let lookup = Self::new();
        for subject in subjects {
            lookup.add(subject);
        }
        lookup
    }

    /// Every subject exists. Used by the `fake` storage backend.
    pub fn accept_any() -> Self {
        Self {
            accept_any: true,
            ..Self::default()
        }
    }

    pub fn add(&self, subject_id: SubjectId) {
        self.subjects.insert(subject_id);
    }

    pub fn remove(&self, subject_id: SubjectId) {
        self.subjects.remove(&subject_id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.switch.set_offline(offline);
    }
}

#[async_trait::async_trait]
impl IdentityLookup for MemoryIdentityLookup {
    async fn exists(&self, subject_id: SubjectId) -> Result<bool, StoreError> {
        self.switch.check("identity lookup")?;
        Ok(self.accept_any || self.subjects.contains(&subject_id))
    }
}
