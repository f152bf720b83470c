mod registry;
mod rules;
mod types;

pub use registry::InteractableStore;
pub use rules::{assign_rules, AssignmentSummary, RuleAssignError, RuleCatalog};
pub use types::{Interactable, InteractableId, InteractableKind, RegistryError};
