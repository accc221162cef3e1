mod config;
mod groups;
mod installer;
mod specifier;

pub use config::{ProjectConfig, ToolConfig, DEFAULT_PYTHON_VERSION};
pub use groups::{DependencyGroup, DependencyGroups, OrderedGroup};
pub use installer::InstallerKind;
pub use specifier::{bare_name, specifier_fingerprint, VERSION_OPERATORS};
