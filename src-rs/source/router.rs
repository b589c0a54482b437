use std::collections::HashMap;
use std::sync::Arc;

use super::templated::TemplatedSource;
use super::types::{Artifact, ArtifactSource, ServerFlavor};
use super::vanilla::{VanillaConfig, VanillaSource};
use crate::error::JobError;
use crate::job::DownloadSpec;

pub struct SourceRouter {
    sources: HashMap<ServerFlavor, Arc<dyn ArtifactSource>>,
}

impl SourceRouter {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    pub fn with_defaults(vanilla: VanillaConfig) -> Self {
        let mut router = Self::new();
        for flavor in [
            ServerFlavor::Paper,
            ServerFlavor::Purpur,
            ServerFlavor::Fabric,
            ServerFlavor::Forge,
        ] {
            router.register(flavor, Arc::new(TemplatedSource::new(flavor)));
        }
        router.register(ServerFlavor::Vanilla, Arc::new(VanillaSource::new(vanilla)));
        router
    }

    pub fn register(&mut self, flavor: ServerFlavor, source: Arc<dyn ArtifactSource>) {
        self.sources.insert(flavor, source);
    }

    pub async fn resolve(&self, spec: &DownloadSpec) -> Result<Artifact, JobError> {
        let flavor = spec.flavor()?;
        let source = self.sources.get(&flavor).ok_or_else(|| {
            JobError::Resolve(format!("no source registered for {}", flavor))
        })?;
        source.resolve(spec).await
    }
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self::with_defaults(VanillaConfig::default())
    }
}
