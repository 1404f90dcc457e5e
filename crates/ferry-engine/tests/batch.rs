use std::sync::Arc;
use std::time::Duration;

use ferry_core::{
    BatchItem, ConflictDisposition, ConflictResolutionPolicy, DevicePath, RemoteError,
    ServiceNamespace, ServicePath, TaskStatus, TransportError,
};
use ferry_engine::{
    BatchOptions, BatchOutcome, BatchReport, ClientSettings, DeviceBackend, FileClient,
    ItemOutcome, RetryGovernor, ServiceBackend, Session,
};
use ferry_telemetry::Metrics;
use ferry_test_support::FakeRemote;

const FAST: ClientSettings = ClientSettings {
    poll_interval: Duration::from_millis(1),
    max_resumptions: 8,
};

fn service_client(remote: &Arc<FakeRemote>) -> FileClient<ServiceBackend> {
    FileClient::new(Session::new(remote.clone()), ServiceBackend).with_settings(FAST)
}

fn device_client(remote: &Arc<FakeRemote>) -> FileClient<DeviceBackend> {
    FileClient::new(Session::new(remote.clone()), DeviceBackend).with_settings(FAST)
}

fn users(relative: &str) -> anyhow::Result<ServicePath> {
    Ok(ServicePath::new(ServiceNamespace::Users, relative)?)
}

fn report<B: ferry_engine::Backend>(
    outcome: BatchOutcome<B>,
) -> anyhow::Result<BatchReport<B::Path>> {
    outcome
        .into_report()
        .ok_or_else(|| anyhow::anyhow!("expected a waited batch"))
}

#[tokio::test]
async fn clean_copy_issues_a_single_submission() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"a");
    remote.add_file("/webdav/Users/alice/b.txt", b"b");
    remote.add_folder("/webdav/Users/alice/dest");
    remote.set_running_polls(2);

    let dest = users("alice/dest")?;
    let items = vec![
        BatchItem::new(users("alice/a.txt")?),
        BatchItem::new(users("alice/b.txt")?),
    ];
    let outcome = service_client(&remote)
        .copy_items(items, Some(&dest), BatchOptions::default())
        .await?;
    let report = report(outcome)?;

    assert!(report.is_success());
    assert_eq!(report.resumptions, 0);
    assert_eq!(remote.batch_submissions().len(), 1);
    assert!(remote.exists("/webdav/Users/alice/dest/a.txt"));
    assert!(remote.exists("/webdav/Users/alice/dest/b.txt"));
    assert!(remote.exists("/webdav/Users/alice/a.txt"));
    Ok(())
}

#[tokio::test]
async fn directory_target_is_joined_with_source_name() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Shared/team/My Notes/a b.txt", b"x");
    remote.add_folder("/webdav/Users/alice/inbox");

    let source = ServicePath::new(ServiceNamespace::Shared, "team/My Notes/a b.txt")?;
    let item = BatchItem::into_dir(source, users("alice/inbox")?);
    let outcome = service_client(&remote)
        .copy_items(vec![item], None, BatchOptions::default())
        .await?;
    assert!(report(outcome)?.is_success());

    let submissions = remote.batch_submissions();
    assert_eq!(
        submissions[0].items[0].destination.as_deref(),
        Some("/webdav/Users/alice/inbox/a%20b.txt")
    );
    assert_eq!(
        submissions[0].items[0].source,
        "/webdav/Shared/team/My%20Notes/a%20b.txt"
    );
    assert!(remote.exists("/webdav/Users/alice/inbox/a b.txt"));
    Ok(())
}

#[tokio::test]
async fn missing_source_fails_only_that_item_on_the_service() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/f1", b"1");
    remote.add_file("/webdav/Users/alice/f3", b"3");
    remote.add_folder("/webdav/Users/alice/out");

    let dest = users("alice/out")?;
    let items = vec![
        BatchItem::new(users("alice/f1")?),
        BatchItem::new(users("alice/f2-WRONG")?),
        BatchItem::new(users("alice/f3")?),
    ];
    let outcome = service_client(&remote)
        .move_items(items, Some(&dest), BatchOptions::default())
        .await?;
    let report = report(outcome)?;

    assert!(matches!(report.items[0].outcome, ItemOutcome::Succeeded));
    assert!(matches!(
        &report.items[1].outcome,
        ItemOutcome::Failed(RemoteError::ObjectNotFound { path }) if path == "/webdav/Users/alice/f2-WRONG"
    ));
    assert!(matches!(report.items[2].outcome, ItemOutcome::Succeeded));
    assert_eq!(report.resumptions, 0);
    assert_eq!(report.tasks[0].status, TaskStatus::CompletedWithWarnings);
    assert_eq!(remote.batch_submissions().len(), 1);
    assert!(remote.exists("/webdav/Users/alice/out/f3"));
    assert!(!remote.exists("/webdav/Users/alice/f1"));

    match report.into_result() {
        Err(RemoteError::BatchFailed { failures, .. }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].source, "Users/alice/f2-WRONG");
        }
        other => panic!("expected BatchFailed, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn missing_source_fails_only_that_item_on_the_device() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/in/f1", b"1");
    remote.add_file("/share/in/f3", b"3");
    remote.add_folder("/share/out");

    let dest = DevicePath::new("out")?;
    let items = vec![
        BatchItem::new(DevicePath::new("in/f1")?),
        BatchItem::new(DevicePath::new("in/f2-WRONG")?),
        BatchItem::new(DevicePath::new("in/f3")?),
    ];
    let outcome = device_client(&remote)
        .copy_items(items, Some(&dest), BatchOptions::default())
        .await?;
    let report = report(outcome)?;

    assert_eq!(report.tasks.len(), 3);
    assert_eq!(report.succeeded().count(), 2);
    assert!(matches!(
        &report.items[1].outcome,
        ItemOutcome::Failed(RemoteError::ObjectNotFound { path }) if path == "/share/in/f2-WRONG"
    ));
    assert_eq!(report.resumptions, 0);
    assert!(remote.exists("/share/out/f1"));
    assert!(remote.exists("/share/out/f3"));
    Ok(())
}

#[tokio::test]
async fn missing_destination_folder_is_reported_per_item() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"a");

    let item = BatchItem::to(users("alice/a.txt")?, users("alice/nowhere/a.txt")?);
    let outcome = service_client(&remote)
        .copy_items(vec![item], None, BatchOptions::default())
        .await?;
    let report = report(outcome)?;
    assert!(matches!(
        &report.items[0].outcome,
        ItemOutcome::Failed(RemoteError::DestinationNotFound { path }) if path == "/webdav/Users/alice/nowhere"
    ));
    Ok(())
}

#[tokio::test]
async fn unresolved_conflict_surfaces_cursor_without_retrying() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"new");
    remote.add_file("/webdav/Users/alice/b.txt", b"b");
    remote.add_file("/webdav/Users/alice/dest/a.txt", b"old");

    let dest = users("alice/dest")?;
    let items = vec![
        BatchItem::new(users("alice/a.txt")?),
        BatchItem::new(users("alice/b.txt")?),
    ];
    let outcome = service_client(&remote)
        .copy_items(items, Some(&dest), BatchOptions::default())
        .await?;
    let report = report(outcome)?;

    assert_eq!(remote.batch_submissions().len(), 1);
    assert!(matches!(report.items[1].outcome, ItemOutcome::Pending));
    let cursor = report
        .conflict()
        .and_then(RemoteError::cursor)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("conflict should carry a cursor"))?;
    assert!(cursor.directive().is_none());

    match report.into_result() {
        Err(RemoteError::Conflict { path, cursor: surfaced }) => {
            assert_eq!(path.as_deref(), Some("/webdav/Users/alice/a.txt"));
            assert_eq!(surfaced, cursor);
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert_eq!(remote.file_content("/webdav/Users/alice/dest/a.txt"), Some(b"old".to_vec()));
    assert!(!remote.exists("/webdav/Users/alice/dest/b.txt"));
    Ok(())
}

#[tokio::test]
async fn resolver_resubmits_with_the_server_cursor() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"new");
    remote.add_file("/webdav/Users/alice/b.txt", b"b");
    remote.add_file("/webdav/Users/alice/dest/a.txt", b"old");

    let dest = users("alice/dest")?;
    let items = vec![
        BatchItem::new(users("alice/a.txt")?),
        BatchItem::new(users("alice/b.txt")?),
    ];
    let options = BatchOptions::default()
        .with_resolver(ConflictResolutionPolicy::uniform(ConflictDisposition::Overwrite));
    let outcome = service_client(&remote)
        .copy_items(items, Some(&dest), options)
        .await?;
    let report = report(outcome)?;

    assert!(report.is_success());
    assert_eq!(report.resumptions, 1);
    let issued = report.tasks[0]
        .cursor
        .clone()
        .ok_or_else(|| anyhow::anyhow!("first round should stop with a cursor"))?;

    let submissions = remote.batch_submissions();
    assert_eq!(submissions.len(), 2);
    assert!(submissions[0].cursor.is_none());
    let resumed = submissions[1]
        .cursor
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("resubmission should carry the cursor"))?;
    assert_eq!(resumed.token(), issued.token());
    let directive = resumed
        .directive()
        .ok_or_else(|| anyhow::anyhow!("resubmission should carry a directive"))?;
    assert_eq!(directive.disposition, ConflictDisposition::Overwrite);
    assert!(directive.apply_to_all);

    assert_eq!(remote.file_content("/webdav/Users/alice/dest/a.txt"), Some(b"new".to_vec()));
    assert!(remote.exists("/webdav/Users/alice/dest/b.txt"));
    Ok(())
}

#[tokio::test]
async fn device_conflict_resumes_only_the_conflicting_item() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/in/a.txt", b"new");
    remote.add_file("/share/in/b.txt", b"b");
    remote.add_file("/share/out/a.txt", b"old");

    let dest = DevicePath::new("out")?;
    let items = vec![
        BatchItem::new(DevicePath::new("in/a.txt")?),
        BatchItem::new(DevicePath::new("in/b.txt")?),
    ];
    let policy = ConflictResolutionPolicy::per_path(|path: &str| {
        if path.ends_with("a.txt") {
            ConflictDisposition::KeepBoth
        } else {
            ConflictDisposition::Skip
        }
    });
    let outcome = device_client(&remote)
        .copy_items(items, Some(&dest), BatchOptions::default().with_resolver(policy))
        .await?;
    let report = report(outcome)?;

    assert!(report.is_success());
    assert_eq!(report.resumptions, 1);
    let submissions = remote.batch_submissions();
    let directive = submissions[1]
        .cursor
        .as_ref()
        .and_then(ferry_core::Cursor::directive)
        .ok_or_else(|| anyhow::anyhow!("resubmission should carry a directive"))?;
    assert_eq!(directive.disposition, ConflictDisposition::KeepBoth);
    assert!(!directive.apply_to_all);
    assert_eq!(remote.file_content("/share/out/a.txt"), Some(b"old".to_vec()));
    assert_eq!(remote.file_content("/share/out/a (1).txt"), Some(b"new".to_vec()));
    assert_eq!(remote.file_content("/share/out/b.txt"), Some(b"b".to_vec()));
    Ok(())
}

#[tokio::test]
async fn resuming_the_same_cursor_twice_is_harmless() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"new");
    remote.add_file("/webdav/Users/alice/dest/a.txt", b"old");
    let client = service_client(&remote);
    let dest = users("alice/dest")?;
    let items = || -> anyhow::Result<Vec<BatchItem<ServicePath>>> {
        Ok(vec![BatchItem::new(users("alice/a.txt")?)])
    };

    let first = report(
        client
            .copy_items(items()?, Some(&dest), BatchOptions::default())
            .await?,
    )?;
    let cursor = first
        .conflict()
        .and_then(RemoteError::cursor)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("expected a conflict"))?;
    let directive = ferry_core::ResolutionDirective {
        disposition: ConflictDisposition::Overwrite,
        apply_to_all: false,
    };

    for _ in 0..2 {
        let options = BatchOptions::default().with_cursor(cursor.with_directive(directive));
        let resumed = report(client.copy_items(items()?, Some(&dest), options).await?)?;
        assert!(resumed.is_success());
        assert_eq!(remote.file_content("/webdav/Users/alice/dest/a.txt"), Some(b"new".to_vec()));
    }
    Ok(())
}

#[tokio::test]
async fn supplied_cursor_carries_the_resolver_directive() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"new");
    remote.add_file("/webdav/Users/alice/dest/a.txt", b"old");
    let client = service_client(&remote);
    let dest = users("alice/dest")?;
    let items = || -> anyhow::Result<Vec<BatchItem<ServicePath>>> {
        Ok(vec![BatchItem::new(users("alice/a.txt")?)])
    };

    let first = report(
        client
            .copy_items(items()?, Some(&dest), BatchOptions::default())
            .await?,
    )?;
    let cursor = first
        .conflict()
        .and_then(RemoteError::cursor)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("expected a conflict"))?;

    let options = BatchOptions::default()
        .with_cursor(cursor.clone())
        .with_resolver(ConflictResolutionPolicy::uniform(ConflictDisposition::Overwrite))
        .no_wait();
    let handles = client
        .copy_items(items()?, Some(&dest), options)
        .await?
        .into_handles()
        .ok_or_else(|| anyhow::anyhow!("expected task handles"))?;

    let submissions = remote.batch_submissions();
    assert_eq!(submissions.len(), 2);
    let sent = submissions[1]
        .cursor
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("resubmission should carry the cursor"))?;
    assert_eq!(sent.token(), cursor.token());
    assert_eq!(
        sent.directive().map(|directive| directive.disposition),
        Some(ConflictDisposition::Overwrite)
    );

    for handle in handles {
        assert_eq!(handle.await?.status, TaskStatus::Completed);
    }
    assert_eq!(remote.file_content("/webdav/Users/alice/dest/a.txt"), Some(b"new".to_vec()));
    Ok(())
}

#[tokio::test]
async fn waited_resume_from_supplied_cursor_needs_no_extra_round() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/in/a.txt", b"new");
    remote.add_file("/share/out/a.txt", b"old");
    let client = device_client(&remote);
    let item = || -> anyhow::Result<Vec<BatchItem<DevicePath>>> {
        Ok(vec![BatchItem::into_dir(
            DevicePath::new("in/a.txt")?,
            DevicePath::new("out")?,
        )])
    };

    let first = report(client.copy_items(item()?, None, BatchOptions::default()).await?)?;
    let cursor = first
        .conflict()
        .and_then(RemoteError::cursor)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("expected a conflict"))?;

    let policy = ConflictResolutionPolicy::per_path(|_: &str| ConflictDisposition::KeepBoth);
    let options = BatchOptions::default().with_cursor(cursor).with_resolver(policy);
    let resumed = report(client.copy_items(item()?, None, options).await?)?;

    assert!(resumed.is_success());
    assert_eq!(resumed.resumptions, 0);
    assert_eq!(remote.batch_submissions().len(), 2);
    assert_eq!(remote.file_content("/share/out/a (1).txt"), Some(b"new".to_vec()));
    Ok(())
}

#[tokio::test]
async fn resumption_cap_stops_endless_conflicts() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"new");
    remote.add_file("/webdav/Users/alice/dest/a.txt", b"old");
    let client = FileClient::new(Session::new(remote.clone()), ServiceBackend).with_settings(
        ClientSettings {
            max_resumptions: 0,
            ..FAST
        },
    );
    let dest = users("alice/dest")?;
    let options = BatchOptions::default()
        .with_resolver(ConflictResolutionPolicy::uniform(ConflictDisposition::Skip));
    let result = client
        .copy_items(vec![BatchItem::new(users("alice/a.txt")?)], Some(&dest), options)
        .await;
    assert!(matches!(result, Err(RemoteError::ResumptionLimit { limit: 0 })));
    assert_eq!(remote.batch_submissions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn validation_errors_send_nothing() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    let client = service_client(&remote);

    let empty = client
        .copy_items(Vec::new(), None, BatchOptions::default())
        .await;
    assert!(matches!(empty, Err(RemoteError::EmptyBatch)));

    let orphan = client
        .copy_items(
            vec![BatchItem::new(users("alice/a.txt")?)],
            None,
            BatchOptions::default(),
        )
        .await;
    assert!(matches!(orphan, Err(RemoteError::MissingDestination { .. })));

    let bad_name = client
        .rename(&users("alice/a.txt")?, "x/y", BatchOptions::default())
        .await;
    assert!(matches!(bad_name, Err(RemoteError::PathValidation { .. })));

    assert!(remote.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn transient_failures_are_retried_and_counted() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"a");
    remote.add_folder("/webdav/Users/alice/dest");
    remote.inject_fault(TransportError::Connection {
        detail: "reset".into(),
    });
    remote.inject_fault(TransportError::Timeout {
        detail: "slow".into(),
    });

    let metrics = Metrics::new()?;
    let session = Session::new(remote.clone())
        .with_retry(RetryGovernor::new(
            3,
            2,
            Duration::from_millis(1),
            Duration::from_secs(5),
        ))
        .with_metrics(metrics.clone());
    let client = FileClient::new(session, ServiceBackend).with_settings(FAST);
    let dest = users("alice/dest")?;
    let outcome = client
        .copy_items(
            vec![BatchItem::new(users("alice/a.txt")?)],
            Some(&dest),
            BatchOptions::default(),
        )
        .await?;

    assert!(report(outcome)?.is_success());
    assert_eq!(metrics.retry_count("submit_batch"), 2);
    assert_eq!(remote.batch_submissions().len(), 3);
    assert!(metrics.command_count("submit_batch", true) >= 1);
    Ok(())
}

#[tokio::test]
async fn exhausted_retries_surface_as_transient() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    for _ in 0..2 {
        remote.inject_fault(TransportError::Connection {
            detail: "refused".into(),
        });
    }
    let session = Session::new(remote.clone()).with_retry(RetryGovernor::new(
        1,
        2,
        Duration::from_millis(1),
        Duration::from_secs(5),
    ));
    let client = FileClient::new(session, ServiceBackend).with_settings(FAST);
    let result = client.metadata(&users("alice")?).await;

    assert!(matches!(
        result,
        Err(RemoteError::Transient {
            operation: "get_metadata",
            attempts: 2,
            ..
        })
    ));
    assert_eq!(remote.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn no_wait_returns_handles_that_resolve_later() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/in/a.txt", b"a");
    remote.add_file("/share/in/b.txt", b"b");
    remote.add_folder("/share/out");
    remote.set_running_polls(3);

    let dest = DevicePath::new("out")?;
    let items = vec![
        BatchItem::new(DevicePath::new("in/a.txt")?),
        BatchItem::new(DevicePath::new("in/b.txt")?),
    ];
    let client = device_client(&remote);
    let handles = client
        .copy_items(items, Some(&dest), BatchOptions::default().no_wait())
        .await?
        .into_handles()
        .ok_or_else(|| anyhow::anyhow!("expected task handles"))?;
    assert_eq!(handles.len(), 2);

    for handle in handles {
        let task = handle.await?;
        assert_eq!(task.status, TaskStatus::Completed);
    }
    Ok(())
}

#[tokio::test]
async fn delete_reports_removed_relative_paths() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"a");
    remote.add_file("/webdav/Users/alice/old/b.txt", b"b");
    let client = service_client(&remote);

    let removed = client
        .delete(vec![users("alice/a.txt")?, users("alice/old")?], true)
        .await?;
    assert_eq!(removed, vec!["alice/a.txt".to_string(), "alice/old".to_string()]);
    assert!(!remote.exists("/webdav/Users/alice/old/b.txt"));
    assert!(remote.batch_submissions()[0].items[0].destination.is_none());

    let missing = client.delete(vec![users("alice/gone")?], true).await;
    match missing {
        Err(RemoteError::BatchFailed { failures, .. }) => assert!(matches!(
            failures[0].error,
            RemoteError::ObjectNotFound { .. }
        )),
        other => panic!("expected BatchFailed, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn rename_keeps_the_parent_folder() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::device());
    remote.add_file("/share/docs/draft.md", b"text");
    let outcome = device_client(&remote)
        .rename(&DevicePath::new("docs/draft.md")?, "final.md", BatchOptions::default())
        .await?;

    assert!(report(outcome)?.is_success());
    assert!(!remote.exists("/share/docs/draft.md"));
    assert_eq!(remote.file_content("/share/docs/final.md"), Some(b"text".to_vec()));
    Ok(())
}
