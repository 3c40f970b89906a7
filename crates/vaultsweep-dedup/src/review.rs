use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::collaborators::DuplicateReviewer;
use crate::error::Result;
use crate::finder::DuplicateSet;

/// Outcome of a review: which ciphers to delete, and whether the user agreed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub confirmed: bool,
    pub delete_cipher_ids: Vec<String>,
}

impl ReviewDecision {
    pub fn confirmed(delete_cipher_ids: Vec<String>) -> Self {
        Self {
            confirmed: true,
            delete_cipher_ids,
        }
    }
}

/// Keeps the first member of every set and selects the rest.
///
/// A cipher kept by any set is never selected, so overlapping sets cannot
/// delete every copy of a login.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepFirstReviewer {
    pub confirm: bool,
}

impl KeepFirstReviewer {
    pub fn new(confirm: bool) -> Self {
        Self { confirm }
    }

    pub fn select(sets: &[DuplicateSet]) -> Vec<String> {
        let kept: HashSet<&str> = sets
            .iter()
            .filter_map(|set| set.ciphers.first())
            .map(|c| c.id.as_str())
            .collect();

        let mut seen = HashSet::new();
        sets.iter()
            .flat_map(|set| set.ciphers.iter().skip(1))
            .map(|c| c.id.as_str())
            .filter(|id| !kept.contains(id) && seen.insert(*id))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl DuplicateReviewer for KeepFirstReviewer {
    async fn review(&self, sets: &[DuplicateSet]) -> Result<Option<ReviewDecision>> {
        Ok(Some(ReviewDecision {
            confirmed: self.confirm,
            delete_cipher_ids: Self::select(sets),
        }))
    }
}
