//! Skills and the data-driven job graph.
//!
//! Jobs are data, not types: a node names its prerequisites and level
//! gate, and unlocking is a graph query. Resurrection is a tagged
//! capability on a skill rather than a special case, so the resolver
//! has exactly one revival path; the `leaves_shadow` flag covers the
//! Arise-style raise that brings the target back in a restricted
//! shadow state.

use serde::{Deserialize, Serialize};

use crate::status::StatusEffect;

/// What a resurrection skill does to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resurrection {
    /// True for Arise-style raises: the target returns as a shadow,
    /// blocked from spending until a higher-tier resurrection clears it.
    pub leaves_shadow: bool,
}

/// A combat skill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Display name.
    pub name: String,
    /// Damage as a multiplier on the user's attack, basis points.
    pub attack_bp: u32,
    /// Mana cost per use.
    pub mana_cost: u32,
    /// Status the skill may inflict, with its chance in basis points.
    pub inflicts: Option<(StatusEffect, u32)>,
    /// Resurrection capability, if any.
    pub grants_resurrection: Option<Resurrection>,
}

impl Skill {
    /// Plain weapon strike.
    #[must_use]
    pub fn basic_attack() -> Self {
        Self {
            name: "Strike".to_string(),
            attack_bp: 10_000,
            mana_cost: 0,
            inflicts: None,
            grants_resurrection: None,
        }
    }

    /// The Arise-style raise: revives a dead participant as a shadow.
    #[must_use]
    pub fn arise() -> Self {
        Self {
            name: "Arise".to_string(),
            attack_bp: 0,
            mana_cost: 100,
            inflicts: None,
            grants_resurrection: Some(Resurrection { leaves_shadow: true }),
        }
    }

    /// A full resurrection that also clears shadow state.
    #[must_use]
    pub fn divine_raise() -> Self {
        Self {
            name: "Divine Raise".to_string(),
            attack_bp: 0,
            mana_cost: 250,
            inflicts: None,
            grants_resurrection: Some(Resurrection {
                leaves_shadow: false,
            }),
        }
    }
}

/// A job class node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNode {
    /// Node id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Jobs that must already be held.
    pub requires: Vec<u32>,
    /// Minimum hunter level.
    pub min_level: u32,
}

/// The unlock graph over job nodes.
#[derive(Clone, Debug, Default)]
pub struct JobGraph {
    nodes: Vec<JobNode>,
}

impl JobGraph {
    /// Builds a graph from nodes.
    #[must_use]
    pub fn new(nodes: Vec<JobNode>) -> Self {
        Self { nodes }
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: u32) -> Option<&JobNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Whether a player can unlock `job` given their held jobs and
    /// level. Unknown jobs are never unlockable.
    #[must_use]
    pub fn can_unlock(&self, job: u32, held: &[u32], level: u32) -> bool {
        self.node(job).is_some_and(|node| {
            level >= node.min_level && node.requires.iter().all(|req| held.contains(req))
        })
    }
}
