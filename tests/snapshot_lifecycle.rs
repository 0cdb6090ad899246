//! End-to-end tests for snapshot decision and assembly.
//!
//! These tests drive the public API the way an embedding CMS would:
//! records change, handlers fire, snapshots accumulate.

use std::sync::Arc;

use versioned_snapshots::{
    fingerprint, resolve_origin, ActionHandler, Channel, ContentRecord, DecisionEngine,
    FixedAuthor, InMemorySnapshotStore, ListenerContext, MutationHandler, RecordId, RecordRef,
    Resolution, SaveHandler, SnapshotBuilder, SnapshotConfig, SnapshotDispatcher, SnapshotEvent,
    SnapshotStore, TriggerMode, Versioned,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

struct Article {
    id: Option<RecordId>,
    version: u32,
    draft_modified: bool,
}

impl Article {
    fn new(id: RecordId, version: u32, draft_modified: bool) -> Self {
        Self {
            id: Some(id),
            version,
            draft_modified,
        }
    }

    fn deleted() -> Self {
        Self {
            id: None,
            version: 0,
            draft_modified: false,
        }
    }
}

impl Versioned for Article {
    fn is_modified_on_draft(&self) -> bool {
        self.draft_modified
    }

    fn current_version(&self) -> u32 {
        self.version
    }
}

impl ContentRecord for Article {
    fn base_type(&self) -> &str {
        "Article"
    }

    fn record_id(&self) -> Option<RecordId> {
        self.id
    }

    fn versioning(&self) -> Option<&dyn Versioned> {
        Some(self)
    }
}

fn setup() -> (Arc<InMemorySnapshotStore>, SnapshotBuilder<InMemorySnapshotStore>) {
    let store = Arc::new(InMemorySnapshotStore::new());
    let builder = SnapshotBuilder::new(store.clone(), Arc::new(FixedAuthor(3)));
    (store, builder)
}

// ─────────────────────────────────────────────────────────────────────────────
// SCENARIOS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_published_change_end_to_end() {
    let (store, builder) = setup();
    let engine = DecisionEngine::new(store.clone());

    let owner = Article::new(42, 5, true);
    let owner_ref = owner.record_ref().unwrap();

    assert!(engine.should_snapshot(&owner_ref, &owner).await);

    let snapshot = builder
        .create_snapshot_from_action(&owner, None, "Published change", &[])
        .await
        .unwrap()
        .expect("owner is persisted");

    assert_eq!(snapshot.message, "Published change");
    assert_eq!(snapshot.origin, RecordRef::new(SnapshotEvent::RECORD_TYPE, 1));
    assert_eq!(snapshot.author_id, Some(3));

    let items: Vec<_> = snapshot
        .items
        .iter()
        .map(|i| (i.object.clone(), i.version))
        .collect();
    assert_eq!(
        items,
        vec![
            (RecordRef::new(SnapshotEvent::RECORD_TYPE, 1), SnapshotEvent::VERSION),
            (RecordRef::new("Article", 42), 5),
        ]
    );

    let event = store.get_event(1).await.unwrap().unwrap();
    assert_eq!(event.title, "Published change");
}

#[tokio::test]
async fn test_owner_is_always_last() {
    let (_, builder) = setup();
    let owner = Article::new(1, 2, true);
    let origin = Article::new(2, 7, true);
    let deleted = Article::deleted();
    let extra = Article::new(3, 1, false);

    let same: &dyn ContentRecord = &owner;
    let distinct: &dyn ContentRecord = &origin;
    let gone: &dyn ContentRecord = &deleted;

    let cases = [
        (None, "Created"),
        (None, ""),
        (Some(same), "Saved"),
        (Some(distinct), "Linked"),
        (Some(gone), "Removed"),
        (Some(gone), ""),
    ];

    for (origin, message) in cases {
        let snapshot = builder
            .create_snapshot_from_action(&owner, origin, message, &[&extra])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            snapshot.owner_item().map(|i| i.object.clone()),
            Some(RecordRef::new("Article", 1)),
            "owner must be last for message {:?}",
            message
        );
        assert_eq!(snapshot.origin_hash, snapshot.origin.fingerprint());
    }
}

#[tokio::test]
async fn test_deleted_origin_without_message_uses_owner() {
    let (store, builder) = setup();
    let owner = Article::new(1, 2, true);
    let deleted = Article::deleted();

    let resolved = resolve_origin(&owner.record_ref().unwrap(), Some(&deleted), "");
    assert_eq!(resolved.resolution, Resolution::OwnerFallback);

    let snapshot = builder
        .create_snapshot_from_action(&owner, Some(&deleted), "", &[])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(snapshot.origin, RecordRef::new("Article", 1));
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(store.num_events(), 0);
}

#[tokio::test]
async fn test_history_accumulates_and_dedups() {
    let (store, builder) = setup();
    let builder = Arc::new(builder);
    let config = Arc::new(SnapshotConfig::default().with_action("save"));
    let dispatcher = SnapshotDispatcher::new(config.clone())
        .on_action(Channel::Form, "save", Arc::new(SaveHandler::new(builder, config)));

    for (version, expect_snapshot) in [(1, true), (1, false), (2, true), (2, false), (3, true)] {
        let context = ListenerContext::new(Channel::Form, "save")
            .with_record(Arc::new(Article::new(42, version, true)));
        let created = dispatcher.dispatch(&context).await.unwrap();
        assert_eq!(created.is_some(), expect_snapshot, "version {}", version);
    }

    let history = store
        .snapshots_for_origin(&RecordRef::new("Article", 42))
        .await
        .unwrap();
    let versions: Vec<_> = history
        .iter()
        .map(|s| s.origin_item().map(|i| i.version))
        .collect();
    assert_eq!(versions, vec![Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn test_deleting_snapshot_reopens_decision() {
    let (store, builder) = setup();
    let engine = DecisionEngine::new(store.clone());
    let article = Article::new(42, 4, true);
    let article_ref = article.record_ref().unwrap();

    let snapshot = builder
        .create_snapshot_from_action(&article, Some(&article), "Saved", &[])
        .await
        .unwrap()
        .unwrap();
    assert!(!engine.should_snapshot(&article_ref, &article).await);

    assert!(store.delete_snapshot(snapshot.id).await.unwrap());
    assert_eq!(store.num_items(), 0);
    assert!(engine.should_snapshot(&article_ref, &article).await);
}

#[tokio::test]
async fn test_trigger_modes_route_channels() {
    let store = Arc::new(InMemorySnapshotStore::new());
    let builder = Arc::new(SnapshotBuilder::anonymous(store.clone()));

    let action_config = Arc::new(
        SnapshotConfig::default()
            .with_action("publish")
            .with_action("create")
            .with_message("graphql_crud_create", "Added block"),
    );
    let forms = Arc::new(ActionHandler::new(builder.clone(), action_config.clone()));
    let mutations = Arc::new(MutationHandler::new(builder, action_config.clone()));
    let dispatcher = SnapshotDispatcher::new(action_config)
        .on_channel(Channel::Form, forms)
        .on_channel(Channel::GraphQl, mutations);

    let page: Arc<dyn ContentRecord> = Arc::new(Article::new(1, 1, true));
    let publish = ListenerContext::new(Channel::Form, "publish").with_record(page.clone());
    let mutation = ListenerContext::new(Channel::GraphQl, "create").with_current_page(page.clone());
    let write = ListenerContext::new(Channel::ModelWrite, "write").with_record(page);

    assert!(dispatcher.dispatch(&publish).await.unwrap().is_some());
    let created = dispatcher.dispatch(&mutation).await.unwrap().unwrap();
    assert_eq!(created.message, "Added block");
    assert!(dispatcher.dispatch(&write).await.unwrap().is_none());
    assert_eq!(store.num_snapshots(), 2);

    assert_eq!(dispatcher.config().trigger, TriggerMode::Action);
}

#[test]
fn test_fingerprint_is_stable_hex() {
    let hash = fingerprint("Article", 42);
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, RecordRef::new("Article", 42).fingerprint());
    assert_ne!(hash, fingerprint("Article", 24));
}
