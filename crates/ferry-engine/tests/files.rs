use std::sync::Arc;

use ferry_core::{DevicePath, RemoteError, RemotePath, ResourceKind, ServiceNamespace, ServicePath};
use ferry_engine::{DeviceBackend, FileClient, ServiceBackend, Session};
use ferry_test_support::FakeRemote;

const SERVICE_UPLOAD: &str = "/api/v1/files/upload";

fn service(remote: &Arc<FakeRemote>) -> FileClient<ServiceBackend> {
    FileClient::new(Session::new(remote.clone()), ServiceBackend)
}

fn shared(relative: &str) -> anyhow::Result<ServicePath> {
    Ok(ServicePath::new(ServiceNamespace::Shared, relative)?)
}

#[tokio::test]
async fn metadata_parses_the_returned_href() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Shared/team/Q3 plan.xlsx", b"12345");

    let info = service(&remote).metadata(&shared("team/Q3 plan.xlsx")?).await?;
    assert_eq!(info.kind, ResourceKind::File);
    assert_eq!(info.size, 5);
    assert_eq!(info.path.relative(), "team/Q3 plan.xlsx");
    assert_eq!(info.path.namespace(), ServiceNamespace::Shared);

    let missing = service(&remote).metadata(&shared("team/nothing")?).await;
    assert!(matches!(
        missing,
        Err(RemoteError::ObjectNotFound { path }) if path == "/webdav/Shared/team/nothing"
    ));
    Ok(())
}

#[tokio::test]
async fn open_chains_the_specific_cause() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/media/clip.mp4", b"frames");
    let client = FileClient::new(Session::new(remote.clone()), DeviceBackend);

    let handle = client.open(&DevicePath::new("media/clip.mp4")?).await?;
    assert_eq!(handle.size, 6);
    assert_eq!(handle.path.absolute(), "/share/media/clip.mp4");

    match client.open(&DevicePath::new("media/missing.mp4")?).await {
        Err(RemoteError::Open { path, cause }) => {
            assert_eq!(path, "/share/media/missing.mp4");
            assert!(matches!(*cause, RemoteError::ObjectNotFound { .. }));
        }
        other => panic!("expected Open, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn upload_stores_content_and_returns_the_new_path() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_folder("/webdav/Shared/team");

    let stored = service(&remote)
        .upload(&shared("team")?, "notes.txt", b"hello".to_vec())
        .await?;
    assert_eq!(stored.relative(), "team/notes.txt");
    assert_eq!(
        remote.file_content("/webdav/Shared/team/notes.txt"),
        Some(b"hello".to_vec())
    );
    Ok(())
}

#[tokio::test]
async fn upload_checks_the_destination_before_sending_content() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_folder("/webdav/Shared/locked");
    remote.mark_read_only("/webdav/Shared/locked");
    remote.add_file("/webdav/Shared/file.txt", b"x");
    let client = service(&remote);

    let read_only = client.upload(&shared("locked")?, "a.txt", b"a".to_vec()).await;
    assert!(matches!(read_only, Err(RemoteError::ReadOnlyDestination { .. })));

    let missing = client.upload(&shared("absent")?, "a.txt", b"a".to_vec()).await;
    assert!(matches!(
        missing,
        Err(RemoteError::DestinationNotFound { path }) if path == "/webdav/Shared/absent"
    ));

    let not_folder = client.upload(&shared("file.txt")?, "a.txt", b"a".to_vec()).await;
    assert!(matches!(not_folder, Err(RemoteError::NotAFolder { .. })));

    assert_eq!(remote.count_requests(SERVICE_UPLOAD), 0);
    Ok(())
}

#[tokio::test]
async fn upload_maps_server_result_codes() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_folder("/webdav/Shared/team");
    remote.reject_names_ending_with(".exe");
    remote.set_quota(4);
    let client = service(&remote);

    let rejected = client.upload(&shared("team")?, "setup.exe", b"mz".to_vec()).await;
    assert!(matches!(
        rejected,
        Err(RemoteError::NameRejected { name, .. }) if name == "setup.exe"
    ));

    let too_big = client.upload(&shared("team")?, "big.bin", b"12345".to_vec()).await;
    assert!(matches!(too_big, Err(RemoteError::QuotaExceeded { .. })));

    assert_eq!(remote.count_requests(SERVICE_UPLOAD), 2);
    assert!(!remote.exists("/webdav/Shared/team/big.bin"));
    Ok(())
}

#[tokio::test]
async fn invalid_upload_names_are_refused_locally() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    let client = service(&remote);
    for name in ["", "..", "a/b"] {
        let result = client.upload(&shared("team")?, name, Vec::new()).await;
        assert!(matches!(result, Err(RemoteError::PathValidation { .. })));
    }
    assert!(remote.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn wait_polls_until_terminal() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/a.txt", b"a");
    remote.set_running_polls(2);
    let client = FileClient::new(Session::new(remote.clone()), DeviceBackend).with_settings(
        ferry_engine::ClientSettings {
            poll_interval: std::time::Duration::from_millis(1),
            ..ferry_engine::ClientSettings::default()
        },
    );

    let handles = client
        .copy_items(
            vec![ferry_core::BatchItem::to(
                DevicePath::new("a.txt")?,
                DevicePath::new("b.txt")?,
            )],
            None,
            ferry_engine::BatchOptions::default().no_wait(),
        )
        .await?
        .into_handles()
        .ok_or_else(|| anyhow::anyhow!("expected handles"))?;
    let task = client.wait(handles[0].task_ref()).await?;
    assert!(task.is_terminal());
    assert_eq!(remote.count_requests("/api/device/tasks/"), 3);

    let unknown = client.wait(&ferry_core::TaskRef::new("task-404")).await;
    assert!(matches!(unknown, Err(RemoteError::TaskNotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn wait_returns_failed_tasks_as_data() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/in/a.txt", b"new");
    remote.add_file("/share/out/a.txt", b"old");
    let client = FileClient::new(Session::new(remote.clone()), DeviceBackend);

    let handles = client
        .copy_items(
            vec![ferry_core::BatchItem::into_dir(
                DevicePath::new("in/a.txt")?,
                DevicePath::new("out")?,
            )],
            None,
            ferry_engine::BatchOptions::default().no_wait(),
        )
        .await?
        .into_handles()
        .ok_or_else(|| anyhow::anyhow!("expected handles"))?;

    let task = client.wait(handles[0].task_ref()).await?;
    assert_eq!(task.status, ferry_core::TaskStatus::Failed);
    assert!(task.cursor.is_some());
    assert_eq!(task.failures[0].code, "conflict");
    assert_eq!(remote.file_content("/share/out/a.txt"), Some(b"old".to_vec()));
    Ok(())
}

#[tokio::test]
async fn wait_returns_tasks_with_warnings_as_data() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Shared/a.txt", b"a");
    remote.add_folder("/webdav/Shared/out");
    let client = service(&remote);

    let handles = client
        .copy_items(
            vec![
                ferry_core::BatchItem::new(shared("a.txt")?),
                ferry_core::BatchItem::new(shared("gone.txt")?),
            ],
            Some(&shared("out")?),
            ferry_engine::BatchOptions::default().no_wait(),
        )
        .await?
        .into_handles()
        .ok_or_else(|| anyhow::anyhow!("expected handles"))?;

    let task = handles
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("expected one aggregate task"))?
        .await?;
    assert_eq!(task.status, ferry_core::TaskStatus::CompletedWithWarnings);
    assert_eq!(task.failures.len(), 1);
    assert!(remote.exists("/webdav/Shared/out/a.txt"));
    Ok(())
}
