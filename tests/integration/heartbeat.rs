//! Heartbeat dispatch through the bounded worker pool (§4.3, §4.6 "heartbeat").

mod support;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use imcore::{
	pool::{AsyncPool, TraceContext},
	repository::DeviceRepository,
};
// self
use crate::support::MemoryDeviceRepo;

#[tokio::test]
async fn heartbeat_stamps_active_timestamp_through_run_safe() {
	let pool = AsyncPool::new(4);
	let device_repo: Arc<dyn DeviceRepository> = Arc::new(MemoryDeviceRepo::default());
	let user_uuid = support::uuid_str(10);

	let ctx = TraceContext { trace_id: "trace-1".into(), user_uuid: Some(user_uuid.clone()), device_id: Some("d1".into()), client_ip: None };

	let repo = device_repo.clone();
	let uuid = user_uuid.clone();
	pool.run_safe(ctx, async move { repo.touch_active(&uuid, "d1").await }, Duration::from_secs(5)).await.unwrap();

	let stamped = device_repo.get_active(&user_uuid, "d1").await.unwrap();
	assert!(stamped.is_some());
}

#[tokio::test]
async fn a_panicking_heartbeat_task_surfaces_as_an_error_without_taking_down_the_pool() {
	let pool = AsyncPool::new(4);
	let ctx = TraceContext::default();

	let result: imcore::Result<()> = pool.run_safe(ctx, async { panic!("simulated heartbeat failure") }, Duration::from_secs(1)).await;
	assert!(result.is_err());

	// The pool itself must still admit further work after a panicking task.
	let ctx2 = TraceContext::default();
	let ok: imcore::Result<i32> = pool.run_safe(ctx2, async { Ok(7) }, Duration::from_secs(1)).await;
	assert_eq!(ok.unwrap(), 7);
}

#[tokio::test]
async fn concurrent_heartbeats_for_distinct_devices_all_land() {
	let pool = AsyncPool::new(8);
	let device_repo: Arc<dyn DeviceRepository> = Arc::new(MemoryDeviceRepo::default());
	let user_uuid = support::uuid_str(11);

	let mut handles = Vec::new();
	for i in 0..5 {
		let repo = device_repo.clone();
		let uuid = user_uuid.clone();
		let pool = pool.clone();
		let device_id = format!("d{i}");

		handles.push(tokio::spawn(async move {
			let ctx = TraceContext { trace_id: format!("t{i}"), user_uuid: Some(uuid.clone()), device_id: Some(device_id.clone()), client_ip: None };

			pool.run_safe(ctx, async move { repo.touch_active(&uuid, &device_id).await }, Duration::from_secs(5)).await
		}));
	}

	for handle in handles {
		handle.await.unwrap().unwrap();
	}

	for i in 0..5 {
		assert!(device_repo.get_active(&user_uuid, &format!("d{i}")).await.unwrap().is_some());
	}
}
