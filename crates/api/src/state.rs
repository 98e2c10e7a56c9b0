use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use backoffice_config::Settings;
use backoffice_services::{AuthService, ListCache, ResourceKind, ResourceService, TaskService};
use mongodb::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub cache: Arc<dyn ListCache>,
    pub resources: Arc<HashMap<ResourceKind, Arc<ResourceService>>>,
    pub tasks: Arc<TaskService>,
}

impl AppState {
    /// Every resource service and the task service share `cache`, so a
    /// mutation through either path drops the other's cached lists too.
    pub fn new(db: Database, settings: Settings, cache: Arc<dyn ListCache>) -> Self {
        let ttl = Duration::from_secs(settings.cache.ttl_secs);
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let resources = ResourceKind::ALL
            .iter()
            .map(|&kind| {
                let service = ResourceService::new(&db, kind, Arc::clone(&cache), ttl);
                (kind, Arc::new(service))
            })
            .collect();
        let tasks = Arc::new(TaskService::new(&db, Arc::clone(&cache), ttl));

        Self {
            db,
            settings,
            auth,
            cache,
            resources: Arc::new(resources),
            tasks,
        }
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceService> {
        self.resources.get(&kind).map(Arc::as_ref)
    }
}
