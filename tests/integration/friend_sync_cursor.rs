//! Incremental friend-list sync: cursor classification and `has_more` passthrough (§4.4
//! "Incremental friend sync", §8 "incremental-sync-cursor").

mod support;

// std
use std::sync::Arc;
// crates.io
use chrono::{Duration as ChronoDuration, Utc};
use imcore::{
	repository::relation::SyncPage,
	service::{friend::ChangeKind, FriendService},
	store::models::UserRelation,
};
// self
use crate::support::MemoryRelationRepo;

fn relation(peer: &str, created_at: chrono::DateTime<Utc>, deleted_at: Option<chrono::DateTime<Utc>>) -> UserRelation {
	UserRelation {
		user_uuid: support::uuid_str(1).parse().unwrap(),
		peer_uuid: peer.parse().unwrap(),
		status: 0,
		remark: None,
		group_tag: None,
		source: None,
		created_at,
		updated_at: created_at,
		deleted_at,
	}
}

#[tokio::test]
async fn a_first_page_with_more_remaining_reports_has_more_and_a_usable_cursor() {
	let now = Utc::now();
	let peer_a = support::uuid_str(300);
	let peer_b = support::uuid_str(301);

	let relation_repo = MemoryRelationRepo::default();
	*relation_repo.sync_page.lock().unwrap() = Some(SyncPage {
		relations: vec![relation(&peer_a, now - ChronoDuration::seconds(5), None), relation(&peer_b, now, None)],
		has_more: true,
		next_version: now,
	});

	let service = FriendService::new(Arc::new(relation_repo));
	let page = service.sync_friend_list(&support::uuid_str(1), 0, 50).await.unwrap();

	assert!(page.has_more);
	assert_eq!(page.changes.len(), 2);
	assert!(page.changes.iter().all(|c| c.kind == ChangeKind::Add));
	assert_eq!(page.next_version, now);
}

#[tokio::test]
async fn paging_with_the_returned_cursor_yields_the_remaining_changes_and_no_more() {
	let now = Utc::now();
	let peer = support::uuid_str(302);

	let relation_repo = MemoryRelationRepo::default();
	*relation_repo.sync_page.lock().unwrap() =
		Some(SyncPage { relations: vec![relation(&peer, now, None)], has_more: false, next_version: now });

	let service = FriendService::new(Arc::new(relation_repo));
	let cursor = now.timestamp_millis() - 1_000;
	let page = service.sync_friend_list(&support::uuid_str(1), cursor, 50).await.unwrap();

	assert!(!page.has_more);
	assert_eq!(page.changes.len(), 1);
}

#[tokio::test]
async fn a_soft_deleted_relation_since_the_cursor_is_classified_as_delete_not_add() {
	let now = Utc::now();
	let peer = support::uuid_str(303);

	let relation_repo = MemoryRelationRepo::default();
	*relation_repo.sync_page.lock().unwrap() =
		Some(SyncPage { relations: vec![relation(&peer, now - ChronoDuration::minutes(10), Some(now))], has_more: false, next_version: now });

	let service = FriendService::new(Arc::new(relation_repo));
	let page = service.sync_friend_list(&support::uuid_str(1), 0, 50).await.unwrap();

	assert_eq!(page.changes[0].kind, ChangeKind::Delete);
}

#[tokio::test]
async fn a_relation_created_before_the_cursor_but_still_returned_is_an_update() {
	let now = Utc::now();
	let peer = support::uuid_str(304);
	let created_at = now - ChronoDuration::hours(1);

	let relation_repo = MemoryRelationRepo::default();
	*relation_repo.sync_page.lock().unwrap() =
		Some(SyncPage { relations: vec![relation(&peer, created_at, None)], has_more: false, next_version: now });

	let service = FriendService::new(Arc::new(relation_repo));
	// Cursor postdates `created_at`, so this relation was already visible on a prior page; being
	// handed back again (e.g. a remark edit bumped `updated_at`) must classify as Update.
	let page = service.sync_friend_list(&support::uuid_str(1), (created_at + ChronoDuration::minutes(1)).timestamp_millis(), 50).await.unwrap();

	assert_eq!(page.changes[0].kind, ChangeKind::Update);
}
