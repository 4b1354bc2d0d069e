//! Cache-aside empty-placeholder convention: a miss is cached as a sentinel, and a sentinel hit
//! is told apart from a real value (§4.4 "Cache contract", §8 "cache-rebuild-on-miss").

mod support;

// std
use std::time::Duration;
// crates.io
use imcore::{
	cache::{is_empty_collection, is_empty_scalar, CacheClient},
	keys,
};
// self
use crate::support::MemoryCache;

#[tokio::test]
async fn a_scalar_miss_is_cached_as_the_empty_placeholder_and_recognized_on_the_next_read() {
	let cache = MemoryCache::default();
	let key = keys::user_info(&support::uuid_str(400));

	assert!(cache.get(&key).await.unwrap().is_none(), "nothing cached yet");

	// Simulating the repository's miss-path: the store also has nothing, so the placeholder is
	// written to defend against repeated penetration to the store.
	cache.set_ex(&key, keys::EMPTY_SCALAR_VALUE, Duration::from_secs(60)).await.unwrap();

	let cached = cache.get(&key).await.unwrap().unwrap();
	assert!(is_empty_scalar(&cached), "a placeholder hit must be distinguishable from a real row");
}

#[tokio::test]
async fn a_real_value_written_after_a_placeholder_overwrites_it() {
	let cache = MemoryCache::default();
	let key = keys::user_info(&support::uuid_str(401));

	cache.set_ex(&key, keys::EMPTY_SCALAR_VALUE, Duration::from_secs(60)).await.unwrap();
	assert!(is_empty_scalar(&cache.get(&key).await.unwrap().unwrap()));

	cache.set_ex(&key, r#"{"nickname":"real"}"#, Duration::from_secs(60)).await.unwrap();

	let cached = cache.get(&key).await.unwrap().unwrap();
	assert!(!is_empty_scalar(&cached), "a real value must never be mistaken for the placeholder");
}

#[test]
fn the_empty_collection_sentinel_is_only_recognized_as_a_single_exact_member() {
	let placeholder = vec![(keys::EMPTY_SET_MEMBER.to_owned(), String::new())];
	assert!(is_empty_collection(&placeholder));

	let real = vec![("peer-1".to_owned(), "0".to_owned())];
	assert!(!is_empty_collection(&real));

	let mixed = vec![(keys::EMPTY_SET_MEMBER.to_owned(), String::new()), ("peer-1".to_owned(), "0".to_owned())];
	assert!(!is_empty_collection(&mixed), "a real member alongside the sentinel means it is not actually empty");
}

#[tokio::test]
async fn deleting_a_key_clears_both_placeholder_and_real_values() {
	let cache = MemoryCache::default();
	let key = keys::user_info(&support::uuid_str(402));

	cache.set_ex(&key, keys::EMPTY_SCALAR_VALUE, Duration::from_secs(60)).await.unwrap();
	cache.del(&key).await.unwrap();

	assert!(cache.get(&key).await.unwrap().is_none());
}
