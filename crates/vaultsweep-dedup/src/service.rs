use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vaultsweep_core::{CipherView, DedupConfig, MAX_DELETE_BATCH_SIZE, UriMatchStrategy};

use crate::collaborators::{CipherAuthorization, CipherStore, DuplicateReviewer};
use crate::error::{DedupError, Result};
use crate::finder::{DuplicateFinder, DuplicateSet};
use crate::strategy::KeyExtractor;
use crate::warnings::{DuplicateOperationWarnings, WarningAccumulator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateOptions {
    /// Overrides the service default for one run.
    pub uri_strategy: Option<UriMatchStrategy>,
}

impl DuplicateOptions {
    pub fn with_strategy(strategy: UriMatchStrategy) -> Self {
        Self {
            uri_strategy: Some(strategy),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateOperationResult {
    pub sets_found: usize,
    pub trashed: usize,
    pub permanently_deleted: usize,
    pub warnings: DuplicateOperationWarnings,
}

/// Detection output without any review or deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateScan {
    pub strategy: UriMatchStrategy,
    pub sets: Vec<DuplicateSet>,
    pub warnings: DuplicateOperationWarnings,
}

/// Finds duplicate ciphers, asks for a review and deletes what was selected.
pub struct DeDuplicateService {
    store: Arc<dyn CipherStore>,
    authorization: Arc<dyn CipherAuthorization>,
    reviewer: Arc<dyn DuplicateReviewer>,
    finder: DuplicateFinder,
    default_strategy: UriMatchStrategy,
    batch_size: usize,
    permission_concurrency: Option<usize>,
}

impl DeDuplicateService {
    pub fn new(
        store: Arc<dyn CipherStore>,
        authorization: Arc<dyn CipherAuthorization>,
        reviewer: Arc<dyn DuplicateReviewer>,
    ) -> Self {
        Self {
            store,
            authorization,
            reviewer,
            finder: DuplicateFinder::default(),
            default_strategy: UriMatchStrategy::default(),
            batch_size: MAX_DELETE_BATCH_SIZE,
            permission_concurrency: None,
        }
    }

    pub fn from_config(
        store: Arc<dyn CipherStore>,
        authorization: Arc<dyn CipherAuthorization>,
        reviewer: Arc<dyn DuplicateReviewer>,
        config: &DedupConfig,
    ) -> Self {
        Self::new(store, authorization, reviewer)
            .with_finder(DuplicateFinder::new(KeyExtractor::from_config(config)))
            .with_default_strategy(config.uri_strategy)
            .with_batch_size(config.effective_batch_size())
            .with_permission_concurrency(config.permission_check_concurrency)
    }

    pub fn with_finder(mut self, finder: DuplicateFinder) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_default_strategy(mut self, strategy: UriMatchStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Clamped to `1..=500` ids per store call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_DELETE_BATCH_SIZE);
        self
    }

    /// `None` checks every selected cipher at once.
    pub fn with_permission_concurrency(mut self, limit: Option<usize>) -> Self {
        self.permission_concurrency = limit.map(|n| n.max(1));
        self
    }

    pub fn default_strategy(&self) -> UriMatchStrategy {
        self.default_strategy
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn find_duplicates(
        &self,
        user_id: &str,
        options: DuplicateOptions,
    ) -> Result<DuplicateScan> {
        let strategy = options.uri_strategy.unwrap_or(self.default_strategy);
        let ciphers = self.store.get_all_decrypted(user_id).await?;

        let mut warnings = WarningAccumulator::new();
        let sets = self
            .finder
            .find_duplicate_sets(&ciphers, strategy, &mut warnings);
        info!(
            "scanned {} ciphers with {strategy} matching: {} duplicate sets",
            ciphers.len(),
            sets.len()
        );

        Ok(DuplicateScan {
            strategy,
            sets,
            warnings: warnings.finish(),
        })
    }

    pub async fn find_and_handle_duplicates(
        &self,
        user_id: &str,
        options: DuplicateOptions,
    ) -> Result<DuplicateOperationResult> {
        let strategy = options.uri_strategy.unwrap_or(self.default_strategy);
        let ciphers = self.store.get_all_decrypted(user_id).await?;

        let mut warnings = WarningAccumulator::new();
        let sets = self
            .finder
            .find_duplicate_sets(&ciphers, strategy, &mut warnings);
        let sets_found = sets.len();

        let nothing_deleted = |warnings: WarningAccumulator| DuplicateOperationResult {
            sets_found,
            trashed: 0,
            permanently_deleted: 0,
            warnings: warnings.finish(),
        };

        if sets.is_empty() {
            info!("no duplicates found among {} ciphers", ciphers.len());
            return Ok(nothing_deleted(warnings));
        }

        let selected = match self.reviewer.review(&sets).await? {
            Some(decision) if decision.confirmed && !decision.delete_cipher_ids.is_empty() => {
                decision.delete_cipher_ids
            }
            _ => {
                info!("review of {sets_found} duplicate sets ended without deletions");
                return Ok(nothing_deleted(warnings));
            }
        };

        let candidates = resolve_selection(&ciphers, &selected);
        let checked = self.check_permissions(candidates).await?;

        let mut soft = Vec::new();
        let mut hard = Vec::new();
        for (cipher, allowed) in checked {
            if !allowed {
                warn!("not permitted to delete cipher {}", cipher.id);
                warnings.record_permission_denied(cipher.display_name());
            } else if cipher.is_deleted() {
                hard.push(cipher.id.clone());
            } else {
                soft.push(cipher.id.clone());
            }
        }

        for batch in soft.chunks(self.batch_size) {
            debug!("moving {} ciphers to trash", batch.len());
            self.store.soft_delete_many(batch, user_id).await?;
        }
        for batch in hard.chunks(self.batch_size) {
            debug!("permanently deleting {} ciphers", batch.len());
            self.store.delete_many(batch, user_id).await?;
        }

        info!(
            "duplicate cleanup: {sets_found} sets, {} trashed, {} permanently deleted",
            soft.len(),
            hard.len()
        );

        Ok(DuplicateOperationResult {
            sets_found,
            trashed: soft.len(),
            permanently_deleted: hard.len(),
            warnings: warnings.finish(),
        })
    }

    /// Results keep the order of `candidates`.
    async fn check_permissions<'a>(
        &self,
        candidates: Vec<&'a CipherView>,
    ) -> Result<Vec<(&'a CipherView, bool)>> {
        let limit = self
            .permission_concurrency
            .unwrap_or(candidates.len())
            .max(1);
        let authorization = self.authorization.as_ref();

        stream::iter(candidates)
            .map(|cipher| async move {
                let allowed = authorization.can_delete_cipher(cipher).await?;
                Ok::<_, DedupError>((cipher, allowed))
            })
            .buffered(limit)
            .try_collect()
            .await
    }
}

/// Unique selected ids mapped to their ciphers, in selection order.
fn resolve_selection<'a>(ciphers: &'a [CipherView], selected: &[String]) -> Vec<&'a CipherView> {
    let by_id: HashMap<&str, &CipherView> = ciphers.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut seen = HashSet::new();

    selected
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| {
            let cipher = by_id.get(id.as_str()).copied();
            if cipher.is_none() {
                warn!("selected cipher {id} no longer exists, skipping");
            }
            cipher
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::review::{KeepFirstReviewer, ReviewDecision};

    const USER: &str = "user-1";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Soft(Vec<String>),
        Hard(Vec<String>),
    }

    #[derive(Default)]
    struct FakeStore {
        ciphers: Vec<CipherView>,
        calls: Mutex<Vec<Call>>,
        fail_on_call: Option<usize>,
    }

    impl FakeStore {
        fn with(ciphers: Vec<CipherView>) -> Self {
            Self {
                ciphers,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            if self.fail_on_call == Some(calls.len()) {
                return Err(DedupError::Store("connection reset".to_string()));
            }
            calls.push(call);
            Ok(())
        }
    }

    #[async_trait]
    impl CipherStore for FakeStore {
        async fn get_all_decrypted(&self, _user_id: &str) -> Result<Vec<CipherView>> {
            Ok(self.ciphers.clone())
        }

        async fn soft_delete_many(&self, ids: &[String], _user_id: &str) -> Result<()> {
            self.record(Call::Soft(ids.to_vec()))
        }

        async fn delete_many(&self, ids: &[String], _user_id: &str) -> Result<()> {
            self.record(Call::Hard(ids.to_vec()))
        }
    }

    /// Denies every cipher whose id starts with `deny`.
    struct PrefixAuthorization;

    #[async_trait]
    impl CipherAuthorization for PrefixAuthorization {
        async fn can_delete_cipher(&self, cipher: &CipherView) -> Result<bool> {
            Ok(!cipher.id.starts_with("deny"))
        }
    }

    struct FixedReviewer(Option<ReviewDecision>);

    #[async_trait]
    impl DuplicateReviewer for FixedReviewer {
        async fn review(&self, _sets: &[DuplicateSet]) -> Result<Option<ReviewDecision>> {
            Ok(self.0.clone())
        }
    }

    struct PanickingReviewer;

    #[async_trait]
    impl DuplicateReviewer for PanickingReviewer {
        async fn review(&self, _sets: &[DuplicateSet]) -> Result<Option<ReviewDecision>> {
            panic!("reviewer must not be called");
        }
    }

    fn same_login(ids: &[&str]) -> Vec<CipherView> {
        ids.iter()
            .map(|id| CipherView::login(*id, format!("Site {id}"), Some("u"), &["https://example.com"]))
            .collect()
    }

    fn service(store: Arc<FakeStore>, reviewer: Arc<dyn DuplicateReviewer>) -> DeDuplicateService {
        DeDuplicateService::new(store, Arc::new(PrefixAuthorization), reviewer)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn no_sets_skips_review() {
        let mut ciphers = same_login(&["1"]);
        ciphers.push(CipherView::login("2", "Other", Some("u"), &["http://"]));
        let store = Arc::new(FakeStore::with(ciphers));

        let result = service(store.clone(), Arc::new(PanickingReviewer))
            .find_and_handle_duplicates(USER, DuplicateOptions::default())
            .await
            .unwrap();

        assert_eq!(result.sets_found, 0);
        assert_eq!(result.trashed, 0);
        assert_eq!(result.warnings.unparseable_uri_count, 1);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn dismissed_or_unconfirmed_review_deletes_nothing() {
        let store = Arc::new(FakeStore::with(same_login(&["1", "2"])));

        for decision in [
            None,
            Some(ReviewDecision { confirmed: false, delete_cipher_ids: ids(&["2"]) }),
            Some(ReviewDecision::confirmed(Vec::new())),
        ] {
            let result = service(store.clone(), Arc::new(FixedReviewer(decision)))
                .find_and_handle_duplicates(USER, DuplicateOptions::default())
                .await
                .unwrap();
            assert_eq!(result.sets_found, 1);
            assert_eq!(result.trashed + result.permanently_deleted, 0);
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn deletes_in_sequential_batches_of_500() {
        let ids: Vec<String> = (0..1201).map(|i| format!("c{i:04}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let store = Arc::new(FakeStore::with(same_login(&refs)));

        let result = service(store.clone(), Arc::new(KeepFirstReviewer::new(true)))
            .find_and_handle_duplicates(USER, DuplicateOptions::default())
            .await
            .unwrap();

        assert_eq!(result.sets_found, 1);
        assert_eq!(result.trashed, 1200);
        assert_eq!(result.permanently_deleted, 0);

        let sizes: Vec<usize> = store
            .calls()
            .iter()
            .map(|call| match call {
                Call::Soft(ids) => ids.len(),
                Call::Hard(_) => panic!("unexpected hard delete"),
            })
            .collect();
        assert_eq!(sizes, vec![500, 500, 200]);
    }

    #[tokio::test]
    async fn trashed_ciphers_are_permanently_deleted() {
        let mut ciphers = same_login(&["1", "2", "3"]);
        ciphers[2].deleted_date = Some(Utc::now());
        let store = Arc::new(FakeStore::with(ciphers));

        let result = service(store.clone(), Arc::new(KeepFirstReviewer::new(true)))
            .find_and_handle_duplicates(USER, DuplicateOptions::default())
            .await
            .unwrap();

        assert_eq!(result.trashed, 1);
        assert_eq!(result.permanently_deleted, 1);
        assert_eq!(
            store.calls(),
            vec![Call::Soft(ids(&["2"])), Call::Hard(ids(&["3"]))]
        );
    }

    #[tokio::test]
    async fn denied_ciphers_are_reported_and_kept() {
        let store = Arc::new(FakeStore::with(same_login(&["keep", "deny-1", "drop", "deny-2"])));

        let result = service(store.clone(), Arc::new(KeepFirstReviewer::new(true)))
            .find_and_handle_duplicates(USER, DuplicateOptions::default())
            .await
            .unwrap();

        assert_eq!(result.trashed, 1);
        assert_eq!(result.warnings.permission_denied_count, 2);
        assert_eq!(
            result.warnings.permission_denied_names,
            vec!["Site deny-1", "Site deny-2"]
        );
        assert_eq!(store.calls(), vec![Call::Soft(ids(&["drop"]))]);
    }

    #[tokio::test]
    async fn selection_is_deduplicated_and_missing_ids_skipped() {
        let store = Arc::new(FakeStore::with(same_login(&["1", "2", "3"])));
        let decision = ReviewDecision::confirmed(ids(&["2", "gone", "3", "2"]));

        let result = service(store.clone(), Arc::new(FixedReviewer(Some(decision))))
            .find_and_handle_duplicates(USER, DuplicateOptions::default())
            .await
            .unwrap();

        assert_eq!(result.trashed, 2);
        assert_eq!(store.calls(), vec![Call::Soft(ids(&["2", "3"]))]);
    }

    #[tokio::test]
    async fn failed_batch_propagates_after_earlier_batches() {
        let store = Arc::new(FakeStore {
            fail_on_call: Some(1),
            ..FakeStore::with(same_login(&["1", "2", "3", "4"]))
        });

        let err = service(store.clone(), Arc::new(KeepFirstReviewer::new(true)))
            .with_batch_size(2)
            .find_and_handle_duplicates(USER, DuplicateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DedupError::Store(_)));
        assert_eq!(store.calls(), vec![Call::Soft(ids(&["2", "3"]))]);
    }

    #[tokio::test]
    async fn strategy_option_overrides_default() {
        let ciphers = vec![
            CipherView::login("1", "A", Some("u"), &["https://example.com/a"]),
            CipherView::login("2", "B", Some("u"), &["https://example.com/b"]),
        ];
        let store = Arc::new(FakeStore::with(ciphers));
        let svc = service(store, Arc::new(KeepFirstReviewer::new(false)))
            .with_default_strategy(UriMatchStrategy::Exact);

        let scan = svc.find_duplicates(USER, DuplicateOptions::default()).await.unwrap();
        assert_eq!(scan.strategy, UriMatchStrategy::Exact);
        assert!(scan.sets.is_empty());

        let scan = svc
            .find_duplicates(USER, DuplicateOptions::with_strategy(UriMatchStrategy::Hostname))
            .await
            .unwrap();
        assert_eq!(scan.sets.len(), 1);
        assert_eq!(scan.sets[0].key, "username+uri: u @ example.com");
    }

    #[tokio::test]
    async fn capped_permission_checks_give_same_result() {
        let store = Arc::new(FakeStore::with(same_login(&["1", "deny-2", "3", "4", "5"])));

        let result = service(store.clone(), Arc::new(KeepFirstReviewer::new(true)))
            .with_permission_concurrency(Some(2))
            .find_and_handle_duplicates(USER, DuplicateOptions::default())
            .await
            .unwrap();

        assert_eq!(result.trashed, 3);
        assert_eq!(result.warnings.permission_denied_count, 1);
        assert_eq!(store.calls(), vec![Call::Soft(ids(&["3", "4", "5"]))]);
    }

    #[test]
    fn config_drives_defaults() {
        let config = DedupConfig {
            uri_strategy: UriMatchStrategy::Host,
            delete_batch_size: 10_000,
            ..DedupConfig::default()
        };
        let svc = DeDuplicateService::from_config(
            Arc::new(FakeStore::default()),
            Arc::new(PrefixAuthorization),
            Arc::new(KeepFirstReviewer::default()),
            &config,
        );
        assert_eq!(svc.default_strategy(), UriMatchStrategy::Host);
        assert_eq!(svc.batch_size(), MAX_DELETE_BATCH_SIZE);
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(DuplicateOperationResult::default()).unwrap();
        assert_eq!(json["setsFound"], 0);
        assert_eq!(json["permanentlyDeleted"], 0);
        assert_eq!(json["warnings"]["unparseableUriCount"], 0);
    }
}
