use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use vaultsweep_core::{CipherView, UriMatchStrategy};

use crate::strategy::KeyExtractor;
use crate::warnings::WarningAccumulator;

pub const URI_SET_PREFIX: &str = "username+uri:";
pub const NAME_SET_PREFIX: &str = "username+name:";

/// Which grouping produced a set. URI groupings outrank name groupings
/// when both yield the same members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKind {
    UsernameUri,
    UsernameName,
}

impl GroupingKind {
    fn priority(self) -> u8 {
        match self {
            Self::UsernameUri => 2,
            Self::UsernameName => 1,
        }
    }
}

/// Two or more ciphers judged to be the same login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSet {
    pub key: String,
    pub kind: GroupingKind,
    pub ciphers: Vec<CipherView>,
}

impl DuplicateSet {
    pub fn ids(&self) -> Vec<&str> {
        self.ciphers.iter().map(|c| c.id.as_str()).collect()
    }

    /// Sorted member ids; equal signatures mean identical membership.
    pub fn signature(&self) -> Vec<&str> {
        let mut ids = self.ids();
        ids.sort_unstable();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BucketKey {
    Uri { username: String, key: String },
    Name { username: String, name: String },
    /// Ciphers without a username never share a bucket with ones that have one.
    NameOnly { name: String },
}

struct Bucket {
    first: usize,
    set: Option<usize>,
}

struct PendingSet {
    key: String,
    kind: GroupingKind,
    members: Vec<usize>,
}

#[derive(Default)]
struct Buckets {
    buckets: HashMap<BucketKey, Bucket>,
    sets: Vec<PendingSet>,
}

impl Buckets {
    /// Adds `member` to a bucket. The set is created when the bucket reaches
    /// two members and grows in place afterwards.
    fn add(
        &mut self,
        bucket_key: BucketKey,
        member: usize,
        kind: GroupingKind,
        display_key: impl FnOnce() -> String,
    ) {
        match self.buckets.get_mut(&bucket_key) {
            None => {
                self.buckets.insert(bucket_key, Bucket { first: member, set: None });
            }
            Some(bucket) => match bucket.set {
                Some(set) => self.sets[set].members.push(member),
                None => {
                    let key = display_key();
                    debug!("duplicate set materialized: {key}");
                    bucket.set = Some(self.sets.len());
                    self.sets.push(PendingSet {
                        key,
                        kind,
                        members: vec![bucket.first, member],
                    });
                }
            },
        }
    }
}

/// Groups a vault into duplicate sets.
#[derive(Debug, Clone, Default)]
pub struct DuplicateFinder {
    extractor: KeyExtractor,
}

impl DuplicateFinder {
    pub fn new(extractor: KeyExtractor) -> Self {
        Self { extractor }
    }

    /// Single pass over `ciphers`, bucketing by `(username, uri key)` and by
    /// `(username, normalized name)`. Sets come back in discovery order, with
    /// identical memberships collapsed in favour of the URI grouping.
    pub fn find_duplicate_sets(
        &self,
        ciphers: &[CipherView],
        strategy: UriMatchStrategy,
        warnings: &mut WarningAccumulator,
    ) -> Vec<DuplicateSet> {
        let mut buckets = Buckets::default();

        for (idx, cipher) in ciphers.iter().enumerate() {
            let username = cipher
                .username()
                .map(str::trim)
                .filter(|u| !u.is_empty());

            if let Some(username) = username {
                let keys = self
                    .extractor
                    .keys_for(cipher.uri_strings(), strategy, warnings);
                for key in keys {
                    let display = format!("{URI_SET_PREFIX} {username} @ {key}");
                    buckets.add(
                        BucketKey::Uri {
                            username: username.to_string(),
                            key,
                        },
                        idx,
                        GroupingKind::UsernameUri,
                        || display,
                    );
                }
            }

            let raw_name = cipher.name.as_deref().filter(|n| !n.trim().is_empty());
            if let Some(raw_name) = raw_name {
                let name = normalize_name(raw_name);
                let bucket_key = match username {
                    Some(username) => BucketKey::Name {
                        username: username.to_string(),
                        name,
                    },
                    None => BucketKey::NameOnly { name },
                };
                // Name sets are labelled with the first member's name as typed.
                let first_name = buckets
                    .buckets
                    .get(&bucket_key)
                    .and_then(|b| ciphers[b.first].name.as_deref())
                    .unwrap_or_default();
                let display = format!(
                    "{NAME_SET_PREFIX} {} & {first_name}",
                    username.unwrap_or_default()
                );
                buckets.add(bucket_key, idx, GroupingKind::UsernameName, || display);
            }
        }

        let kept = collapse_identical_memberships(buckets.sets, ciphers);
        kept.into_iter()
            .map(|set| DuplicateSet {
                key: set.key,
                kind: set.kind,
                ciphers: set.members.iter().map(|&i| ciphers[i].clone()).collect(),
            })
            .collect()
    }
}

/// Lowercased with all whitespace removed, so `"My Bank"` matches `"mybank "`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn collapse_identical_memberships(
    sets: Vec<PendingSet>,
    ciphers: &[CipherView],
) -> Vec<PendingSet> {
    let mut by_signature: HashMap<Vec<&str>, usize> = HashMap::new();
    let mut kept: Vec<PendingSet> = Vec::with_capacity(sets.len());

    for set in sets {
        let mut signature: Vec<&str> = set.members.iter().map(|&i| ciphers[i].id.as_str()).collect();
        signature.sort_unstable();

        match by_signature.get(&signature) {
            None => {
                by_signature.insert(signature, kept.len());
                kept.push(set);
            }
            Some(&existing) => {
                if set.kind.priority() > kept[existing].kind.priority() {
                    debug!("{} replaces {}", set.key, kept[existing].key);
                    kept[existing] = set;
                }
            }
        }
    }

    kept
}
