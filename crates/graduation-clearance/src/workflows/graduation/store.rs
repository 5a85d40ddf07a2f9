use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{ApplicationId, GraduationApplication};
use super::repository::{ApplicationFilter, ApplicationRepository, Page, RepositoryError};

/// Process-local application store. Each call holds the map lock for its whole read-modify-write.
#[derive(Debug, Default, Clone)]
pub struct InMemoryApplicationStore {
    records: Arc<Mutex<BTreeMap<ApplicationId, GraduationApplication>>>,
}

impl InMemoryApplicationStore {
    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<ApplicationId, GraduationApplication>>, RepositoryError>
    {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ApplicationRepository for InMemoryApplicationStore {
    fn insert(
        &self,
        application: GraduationApplication,
    ) -> Result<GraduationApplication, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<GraduationApplication>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn update(
        &self,
        mut application: GraduationApplication,
        expected_version: u64,
    ) -> Result<GraduationApplication, RepositoryError> {
        let mut guard = self.lock()?;
        let stored = guard
            .get_mut(&application.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }

        application.version = expected_version + 1;
        *stored = application.clone();
        Ok(application)
    }

    fn list(
        &self,
        filter: &ApplicationFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<GraduationApplication>, RepositoryError> {
        let guard = self.lock()?;
        let matching: Vec<&GraduationApplication> = guard
            .values()
            .filter(|application| filter.matches(application))
            .collect();
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    fn delete(&self, id: &ApplicationId) -> Result<GraduationApplication, RepositoryError> {
        let mut guard = self.lock()?;
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }
}
