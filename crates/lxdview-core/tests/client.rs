//! LXD client against the fake daemon.

use std::time::{Duration, Instant};

use lxdview_core::lxd::{Image, InstanceIdentifier, ListOptions, LxdClient, LxdError, Network, StoragePool};
use lxdview_test_utils::fake_lxd::FakeLxd;
use pretty_assertions::assert_eq;

#[test_log::test(tokio::test)]
async fn empty_collection_makes_no_fan_out_requests() {
    let fake = FakeLxd::start().await;
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    let images = client.list_images(&ListOptions::default()).await.unwrap();
    assert_eq!(images, Vec::<Image>::new());
    assert_eq!(fake.requests(), vec!["/1.0/images"]);

    fake.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn each_kind_decodes_its_metadata() {
    let fake = FakeLxd::start().await;
    fake.add_image("06b86454720d");
    fake.add_network("lxdbr0");
    fake.add_storage_pool("default");
    let client = LxdClient::connect(fake.socket_path()).unwrap();
    let options = ListOptions::default();

    assert_eq!(
        client.list_images(&options).await.unwrap(),
        vec![Image {
            fingerprint: "06b86454720d".to_string()
        }]
    );
    assert_eq!(
        client.list_networks(&options).await.unwrap(),
        vec![Network {
            name: "lxdbr0".to_string()
        }]
    );
    assert_eq!(
        client.list_storage_pools(&options).await.unwrap(),
        vec![StoragePool {
            name: "default".to_string()
        }]
    );

    fake.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn fan_out_requests_run_concurrently_without_cap() {
    let fake = FakeLxd::start().await;
    let names = ["lxdbr0", "lxdbr1", "lxdfan0", "ovn0", "macvlan0"];
    for name in names {
        fake.add_network(name);
    }
    fake.set_delay(Duration::from_millis(200));
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    let started = Instant::now();
    let networks = client.list_networks(&ListOptions::default()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(networks.len(), names.len());
    assert_eq!(fake.max_in_flight(), names.len());
    // One listing round trip plus one fan-out round, not five.
    assert!(elapsed < Duration::from_millis(200 * 4), "took {elapsed:?}");

    fake.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn failed_sub_request_fails_whole_listing() {
    let fake = FakeLxd::start().await;
    fake.add_instance("web", "Running");
    fake.add_dangling_uri("/1.0/instances", "/1.0/instances/gone");
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    let err = client
        .list_instances(&ListOptions::default())
        .await
        .unwrap_err();
    let daemon = err.daemon().expect("daemon error");
    assert_eq!(daemon.code, 404);
    assert_eq!(daemon.message, "Not Found");
    assert_eq!(daemon.request_uri, "http://lxd/1.0/instances/gone");
    assert_eq!(daemon.metadata, serde_json::Value::Null);
    assert_eq!(
        err.to_string(),
        "LXD daemon returned an error response (404: Not Found). See response metadata for more details."
    );

    fake.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn error_on_list_request_is_returned() {
    let fake = FakeLxd::start().await;
    fake.fail_path("/1.0/networks", 403, "not authorized");
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    let err = client
        .list_networks(&ListOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.daemon().map(|d| d.code), Some(403));
    assert_eq!(fake.requests().len(), 1);

    fake.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn non_json_body_is_a_decode_error() {
    let fake = FakeLxd::start().await;
    fake.garble_path("/1.0/storage-pools");
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    let err = client
        .list_storage_pools(&ListOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LxdError::Decode { ref uri, .. } if uri == "http://lxd/1.0/storage-pools"));

    fake.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn only_present_options_are_sent() {
    let fake = FakeLxd::start().await;
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    client
        .list_instances(&ListOptions::default().with_project("dev"))
        .await
        .unwrap();
    client
        .list_instances(&ListOptions::all_projects().with_filter("status eq Running"))
        .await
        .unwrap();

    assert_eq!(
        fake.requests(),
        vec![
            "/1.0/instances?project=dev",
            "/1.0/instances?all-projects=true&filter=status+eq+Running",
        ]
    );

    fake.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn instance_identifiers_come_from_uris_alone() {
    let fake = FakeLxd::start().await;
    fake.add_instance("web", "Running");
    fake.add_instance_in_project("ci", "Stopped", "dev");
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    let mut ids = client
        .list_instance_identifiers(&ListOptions::all_projects())
        .await
        .unwrap();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            InstanceIdentifier::new("ci", Some("dev".to_string())),
            InstanceIdentifier::new("web", None),
        ]
    );
    assert_eq!(fake.requests(), vec!["/1.0/instances?all-projects=true"]);

    fake.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn malformed_instance_uri_is_rejected() {
    let fake = FakeLxd::start().await;
    fake.add_dangling_uri("/1.0/instances", "/1.0/containers/old");
    let client = LxdClient::connect(fake.socket_path()).unwrap();

    let err = client
        .list_instance_identifiers(&ListOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LxdError::InvalidResourceUri { .. }));

    fake.shutdown().await;
}
