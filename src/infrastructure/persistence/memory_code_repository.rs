//! In-memory implementation of the code registry.
//!
//! Used for local runs without PostgreSQL (`STORAGE_BACKEND=memory`) and by
//! the HTTP and concurrency test suites. All mutations take one write lock,
//! which makes reservation and cascade deactivation atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::entities::{Code, Namespace, NewCode, ResourceRef, ReusePolicy};
use crate::domain::errors::CodeError;
use crate::domain::repositories::{CodeRepository, check_hierarchy};

#[derive(Debug, Default)]
struct Registry {
    next_id: i64,
    codes: HashMap<i64, Code>,
    live: HashMap<(Namespace, String), i64>,
    children: HashMap<i64, Vec<i64>>,
    /// Live primary codes per internal target, in creation order.
    by_resource: HashMap<(Namespace, i64), Vec<i64>>,
    /// Latest deactivation time per value, for the reuse policy.
    retired: HashMap<(Namespace, String), DateTime<Utc>>,
}

impl Registry {
    fn retire(&mut self, id: i64, now: DateTime<Utc>) -> bool {
        let Some(code) = self.codes.get_mut(&id) else {
            return false;
        };
        if !code.is_active() {
            return false;
        }

        code.deactivated_at = Some(now);
        let key = (code.namespace, code.value.clone());
        let resource_key = resource_key(code);
        self.live.remove(&key);
        self.retired.insert(key, now);

        if let Some(resource_key) = resource_key
            && let Some(ids) = self.by_resource.get_mut(&resource_key)
        {
            ids.retain(|live_id| *live_id != id);
            if ids.is_empty() {
                self.by_resource.remove(&resource_key);
            }
        }
        true
    }

    fn live_by_resource(&self, namespace: Namespace, resource_id: i64) -> Vec<i64> {
        self.by_resource
            .get(&(namespace, resource_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Deactivates a primary code and its live children.
    fn retire_tree(&mut self, id: i64, now: DateTime<Utc>) -> usize {
        if !self.retire(id, now) {
            return 0;
        }

        let child_ids = self.children.get(&id).cloned().unwrap_or_default();
        1 + child_ids
            .into_iter()
            .filter(|child| self.retire(*child, now))
            .count()
    }
}

/// Index key of a primary code pointing at a catalog resource.
fn resource_key(code: &Code) -> Option<(Namespace, i64)> {
    match code.target {
        ResourceRef::Internal { resource_id } if code.is_primary() => {
            Some((code.namespace, resource_id))
        }
        _ => None,
    }
}

/// Process-local code registry guarded by a single `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryCodeRepository {
    registry: RwLock<Registry>,
    reuse_policy: ReusePolicy,
}

impl InMemoryCodeRepository {
    pub fn new(reuse_policy: ReusePolicy) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            reuse_policy,
        }
    }
}

#[async_trait]
impl CodeRepository for InMemoryCodeRepository {
    async fn reserve(&self, new_code: NewCode) -> Result<Code, CodeError> {
        let mut registry = self.registry.write().await;

        let parent = new_code.parent_id.and_then(|id| registry.codes.get(&id));
        check_hierarchy(&new_code, parent)?;

        let key = (new_code.namespace, new_code.value.clone());
        if registry.live.contains_key(&key) {
            return Err(CodeError::DuplicateCode {
                namespace: new_code.namespace,
                value: new_code.value,
            });
        }

        registry.next_id += 1;
        let code = Code {
            id: registry.next_id,
            value: new_code.value,
            namespace: new_code.namespace,
            kind: new_code.kind,
            parent_id: new_code.parent_id,
            target: new_code.target,
            created_at: Utc::now(),
            deactivated_at: None,
        };

        registry.live.insert(key, code.id);
        if let Some(parent_id) = code.parent_id {
            registry.children.entry(parent_id).or_default().push(code.id);
        }
        if let Some(resource_key) = resource_key(&code) {
            registry.by_resource.entry(resource_key).or_default().push(code.id);
        }
        registry.codes.insert(code.id, code.clone());

        Ok(code)
    }

    async fn exists(&self, namespace: Namespace, value: &str) -> Result<bool, CodeError> {
        let registry = self.registry.read().await;
        let key = (namespace, value.to_string());

        if registry.live.contains_key(&key) {
            return Ok(true);
        }

        Ok(registry
            .retired
            .get(&key)
            .is_some_and(|at| self.reuse_policy.blocks(*at, Utc::now())))
    }

    async fn lookup(&self, namespace: Namespace, value: &str) -> Result<Option<Code>, CodeError> {
        let registry = self.registry.read().await;

        Ok(registry
            .live
            .get(&(namespace, value.to_string()))
            .and_then(|id| registry.codes.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Code>, CodeError> {
        Ok(self.registry.read().await.codes.get(&id).cloned())
    }

    async fn list_children(&self, parent_id: i64) -> Result<Vec<Code>, CodeError> {
        let registry = self.registry.read().await;

        Ok(registry
            .children
            .get(&parent_id)
            .into_iter()
            .flatten()
            .filter_map(|id| registry.codes.get(id))
            .filter(|code| code.is_active())
            .cloned()
            .collect())
    }

    async fn list_by_resource(
        &self,
        namespace: Namespace,
        resource_id: i64,
    ) -> Result<Vec<Code>, CodeError> {
        let registry = self.registry.read().await;

        Ok(registry
            .live_by_resource(namespace, resource_id)
            .iter()
            .filter_map(|id| registry.codes.get(id))
            .cloned()
            .collect())
    }

    async fn deactivate(&self, namespace: Namespace, value: &str) -> Result<usize, CodeError> {
        let mut registry = self.registry.write().await;

        let Some(&id) = registry.live.get(&(namespace, value.to_string())) else {
            return Ok(0);
        };

        Ok(registry.retire_tree(id, Utc::now()))
    }

    async fn deactivate_by_resource(
        &self,
        namespace: Namespace,
        resource_id: i64,
    ) -> Result<usize, CodeError> {
        let mut registry = self.registry.write().await;
        let now = Utc::now();
        let parent_ids = registry.live_by_resource(namespace, resource_id);

        Ok(parent_ids
            .into_iter()
            .map(|id| registry.retire_tree(id, now))
            .sum())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
