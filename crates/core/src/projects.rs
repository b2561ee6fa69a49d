use std::collections::HashMap;

/// Read-only view of the project/client registry: which template a project
/// is filed under.
#[async_trait::async_trait]
pub trait ProjectRegistry: Send + Sync {
    async fn template_for(&self, project_id: &str) -> Option<String>;
}

/// Registry backed by the `[projects]` table of the configuration. Project
/// ids compare case-insensitively since config keys are lower-cased on load.
#[derive(Debug, Clone, Default)]
pub struct StaticProjectRegistry {
    projects: HashMap<String, String>,
}

impl StaticProjectRegistry {
    pub fn new(projects: HashMap<String, String>) -> Self {
        projects
            .into_iter()
            .fold(Self::default(), |reg, (project, template)| {
                reg.with_project(&project, &template)
            })
    }

    pub fn with_project(mut self, project_id: &str, template_id: &str) -> Self {
        self.projects
            .insert(project_id.to_lowercase(), template_id.to_string());
        self
    }
}

#[async_trait::async_trait]
impl ProjectRegistry for StaticProjectRegistry {
    async fn template_for(&self, project_id: &str) -> Option<String> {
        self.projects.get(&project_id.to_lowercase()).cloned()
    }
}
