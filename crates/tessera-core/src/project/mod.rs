//! Project descriptor editing: the descriptor model, where it lives on disk,
//! where dependencies come from, and the configurator tying them together.

pub mod configurator;
pub mod model;
pub mod registry;
pub mod store;

pub use configurator::{ConfigureError, ConfigureOutcome, ConfigureSettings, FrameworkPin, ProjectConfigurator};
pub use model::{Change, DependencyRef, ProjectDescriptor, Scheme, Target, TargetKind};
pub use registry::{DependencyRegistry, FileRegistry, RegistryError, StaticRegistry};
pub use store::{ProjectStore, StoreError};
