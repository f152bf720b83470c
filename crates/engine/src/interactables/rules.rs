use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::info;

use super::registry::InteractableStore;
use super::types::InteractableKind;

/// Process-wide catalog of password-rule strings and NPC display names.
/// Read-only after construction.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<String>,
    npc_names: Vec<String>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<String>, npc_names: Vec<String>) -> Self {
        Self { rules, npc_names }
    }

    pub fn built_in() -> Self {
        let rules = [
            "Password must be at least 8 characters long",
            "Password must contain at least one number",
            "Password must contain at least one uppercase letter",
            "Password must contain at least one lowercase letter",
            "Password must end with a special character (!@#$%)",
            "Password must not contain your username",
            "Password must be different from your last 3 passwords",
            "Password must not contain dictionary words",
            "Password must contain at least 2 numbers",
            "Password must contain at least 2 special characters",
            "Password must not contain repeating characters",
            "Password must contain alternating letters and numbers",
            "Password must start and end with the same character type",
        ];
        let npc_names = [
            "Warden Alma",
            "Old Griff",
            "Archivist Wen",
            "Porter Sy",
            "Keeper Odile",
            "Gatehand Bram",
        ];
        Self {
            rules: rules.iter().map(ToString::to_string).collect(),
            npc_names: npc_names.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    pub fn npc_names(&self) -> &[String] {
        &self.npc_names
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleAssignError {
    #[error("rule catalog exhausted: need {needed} distinct rules, catalog has {available}")]
    CatalogExhausted { needed: usize, available: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentSummary {
    pub candidate_count: usize,
    pub assigned_count: usize,
}

/// Replaces the level's randomized rule assignment. Candidates are
/// unpinned empties, notes, and NPCs; `rule_count` of them (or all, when
/// fewer exist) each receive a distinct catalog rule. Empties that are
/// chosen become notes carrying the drawn rule. Chosen NPCs without a
/// name get one drawn from the name catalog. Pinned objects (rules
/// authored in the level file) and doors are untouched.
///
/// On error nothing is mutated, so a previous assignment survives.
pub fn assign_rules(
    store: &mut InteractableStore,
    level: &str,
    rule_count: usize,
    catalog: &RuleCatalog,
    rng: &mut StdRng,
) -> Result<AssignmentSummary, RuleAssignError> {
    let Some(items) = store.items_mut(level) else {
        return Ok(AssignmentSummary {
            candidate_count: 0,
            assigned_count: 0,
        });
    };

    let mut candidates: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.pinned && item.kind.is_rule_candidate())
        .map(|(index, _)| index)
        .collect();

    let assigned_count = rule_count.min(candidates.len());
    if assigned_count > catalog.rules.len() {
        return Err(RuleAssignError::CatalogExhausted {
            needed: assigned_count,
            available: catalog.rules.len(),
        });
    }

    // Previous randomized assignment is dropped wholesale before the
    // new draw.
    for &index in &candidates {
        match &mut items[index].kind {
            InteractableKind::Note { rule } | InteractableKind::Npc { rule, .. } => *rule = None,
            InteractableKind::Empty | InteractableKind::Door { .. } => {}
        }
    }

    candidates.shuffle(rng);
    let mut rule_indices: Vec<usize> = (0..catalog.rules.len()).collect();
    rule_indices.shuffle(rng);

    for (&item_index, &rule_index) in candidates.iter().zip(rule_indices.iter()).take(assigned_count)
    {
        let drawn = catalog.rules[rule_index].clone();
        let item = &mut items[item_index];
        match &mut item.kind {
            InteractableKind::Empty => {
                item.kind = InteractableKind::Note { rule: Some(drawn) };
            }
            InteractableKind::Note { rule } => *rule = Some(drawn),
            InteractableKind::Npc { name, rule } => {
                *rule = Some(drawn);
                if name.is_none() {
                    *name = catalog.npc_names.choose(rng).cloned();
                }
            }
            InteractableKind::Door { .. } => unreachable!("doors are never rule candidates"),
        }
    }

    let summary = AssignmentSummary {
        candidate_count: candidates.len(),
        assigned_count,
    };
    info!(
        level,
        candidate_count = summary.candidate_count,
        assigned_count = summary.assigned_count,
        "level_rules_assigned"
    );
    Ok(summary)
}
