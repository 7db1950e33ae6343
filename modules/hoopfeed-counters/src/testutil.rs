//! Test utilities for spinning up a real Redis instance via testcontainers.

use std::time::Duration;

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};

use crate::RedisCounterStore;

/// Spin up a Redis container and return the container handle + a connected store.
///
/// The container is dropped (and stopped) when `ContainerAsync` goes out of scope,
/// so callers must hold it alive for the duration of the test.
pub async fn redis_container() -> (ContainerAsync<GenericImage>, RedisCounterStore) {
    let container: ContainerAsync<GenericImage> = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(ContainerPort::Tcp(6379))
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start Redis container");

    let host_port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis host port");

    let url = format!("redis://127.0.0.1:{host_port}");
    let store = RedisCounterStore::connect(&url, Duration::from_secs(5))
        .await
        .expect("Failed to connect to Redis");

    (container, store)
}
