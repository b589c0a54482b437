pub mod router;
pub mod templated;
pub mod types;
pub mod vanilla;

pub use router::SourceRouter;
pub use templated::TemplatedSource;
pub use types::{Artifact, ArtifactSource, ServerFlavor};
pub use vanilla::{VanillaConfig, VanillaSource};
