use std::sync::Arc;
use std::time::{Duration, SystemTime};
use undertaker_core::*;
use undertaker_engine::*;
use undertaker_runtime::*;

fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn snapshot() -> Snapshot {
    Snapshot::new(
        vec![
            ContainerRecord::new(
                ContainerId::new("c1").unwrap(),
                ContainerStatus::Exited,
                ImageRef::Reference("app:latest".to_string()),
            )
            .with_name("old-job")
            .with_exited_at(now() - Duration::from_secs(7200)),
            ContainerRecord::new(
                ContainerId::new("c2").unwrap(),
                ContainerStatus::Other("running".to_string()),
                ImageRef::Id(ImageId::new("imgB").unwrap()),
            )
            .with_name("web"),
            ContainerRecord::new(
                ContainerId::new("c3").unwrap(),
                ContainerStatus::Exited,
                ImageRef::Unavailable("inspect failed".to_string()),
            ),
        ],
        vec![
            ImageRecord::new(ImageId::new("imgA").unwrap(), vec!["app:latest".to_string()]),
            ImageRecord::new(ImageId::new("imgB").unwrap(), vec!["base:1".to_string()]),
        ],
    )
}

#[tokio::test]
async fn test_snapshot_classify_reap() {
    let runtime = Arc::new(MemoryRuntime::new(snapshot()));
    let classifier = Classifier::new(Policies::new(), Retention::from_secs(3600));

    let snap = runtime.snapshot().await.unwrap();
    let result = classifier.classify(&snap, now());
    assert_eq!(result.stats.inconsistent, 1);

    let report = Reaper::new(runtime.clone()).reap(&result).await;

    assert!(report.is_clean());
    assert_eq!(
        runtime.removed_containers().await,
        [ContainerId::new("c1").unwrap()]
    );
    assert_eq!(runtime.removed_images().await, [ImageId::new("imgA").unwrap()]);

    // The inconsistent record is untouched
    let after = runtime.snapshot().await.unwrap();
    assert!(after.containers.iter().any(|c| c.id.as_str() == "c3"));
}

#[tokio::test]
async fn test_failed_container_removal_is_reported() {
    let runtime = Arc::new(MemoryRuntime::new(snapshot()));
    runtime.fail_removal_of("c1").await;

    let snap = runtime.snapshot().await.unwrap();
    let result = Classifier::new(Policies::new(), Retention::ZERO).classify(&snap, now());

    let report = Reaper::new(runtime.clone()).reap(&result).await;

    // c1 stays, so the runtime refuses its image too
    assert!(report.containers.is_empty());
    assert!(report.images.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].id, "c1");
    assert!(report.failures[1].message.contains("being used"));
}

#[tokio::test]
async fn test_second_pass_finds_nothing_new() {
    let runtime = Arc::new(MemoryRuntime::new(snapshot()));
    let classifier = Classifier::new(Policies::new(), Retention::from_secs(3600));

    let first = classifier.classify(&runtime.snapshot().await.unwrap(), now());
    Reaper::new(runtime.clone()).reap(&first).await;

    let second = classifier.classify(&runtime.snapshot().await.unwrap(), now());
    assert!(second.is_empty());
}

#[test]
fn test_docker_endpoint_validation() {
    assert!(DockerRuntime::connect(Some("ssh://host")).is_err());
}

#[test]
fn test_malformed_exit_time_is_not_reclaimed() {
    let (image, exited_at) = canonical::exit_state(
        &ContainerStatus::Exited,
        ImageRef::Reference("app:latest".to_string()),
        Some("2023-11-14 22:10:00"),
    );
    let mut record = ContainerRecord::new(
        ContainerId::new("c1").unwrap(),
        ContainerStatus::Exited,
        image,
    )
    .with_name("old-job");
    record.exited_at = exited_at;

    let snap = Snapshot::new(
        vec![record],
        vec![ImageRecord::new(
            ImageId::new("imgA").unwrap(),
            vec!["app:latest".to_string()],
        )],
    );
    let result =
        Classifier::new(Policies::new(), Retention::from_secs(86_400)).classify(&snap, now());

    assert!(result.containers.is_empty());
    assert_eq!(result.stats.inconsistent, 1);
    assert_eq!(result.inconsistencies[0].container.as_str(), "c1");
}
