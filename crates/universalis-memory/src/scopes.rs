//! Memory visibility scopes and the retrieval filter.
//!
//! Scoping prevents cross-agent memory interference while still
//! allowing shared knowledge: public rows are world knowledge, private
//! rows belong to one agent, shared-group rows belong to an
//! organization. Every retrieval passes a [`ScopeFilter`] naming the
//! requester; what the filter does not admit simply does not exist for
//! that agent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Visibility scope of one memory row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryScope {
    /// Accessible to all agents (news, weather, global events).
    Public,
    /// Only accessible to the owning agent.
    Private,
    /// Accessible to agents sharing the row's group, and to the owner.
    SharedGroup,
}

impl core::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
            Self::SharedGroup => "SHARED_GROUP",
        };
        write!(f, "{name}")
    }
}

/// Decides which memory rows a requester may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    /// The agent requesting memories; `None` means an anonymous
    /// requester who sees only public rows.
    pub requesting_agent_id: Option<String>,

    /// Groups the requesting agent belongs to.
    pub agent_groups: BTreeSet<String>,

    /// Whether public rows are admitted (default true).
    pub include_public: bool,
}

impl Default for ScopeFilter {
    fn default() -> Self {
        Self {
            requesting_agent_id: None,
            agent_groups: BTreeSet::new(),
            include_public: true,
        }
    }
}

impl ScopeFilter {
    /// A filter for one agent with no group memberships.
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            requesting_agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    /// Builder-style group memberships.
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style public toggle.
    #[must_use]
    pub const fn with_public(mut self, include_public: bool) -> Self {
        self.include_public = include_public;
        self
    }

    /// Whether a row with the given scope, owner, and group is visible
    /// to this requester.
    pub fn can_access(
        &self,
        scope: MemoryScope,
        owner_id: Option<&str>,
        group_id: Option<&str>,
    ) -> bool {
        let requester = self.requesting_agent_id.as_deref();
        match scope {
            MemoryScope::Public => self.include_public,
            MemoryScope::Private => requester.is_some() && owner_id == requester,
            MemoryScope::SharedGroup => {
                let in_group = group_id.is_some_and(|group| self.agent_groups.contains(group));
                let is_owner = requester.is_some() && owner_id == requester;
                in_group || is_owner
            }
        }
    }
}
