use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ferry_core::{BatchItem, RemoteError, ServiceNamespace, ServicePath, TaskStatus};
use ferry_engine::{
    BatchOptions, BlockingFileClient, ClientSettings, ExecutionBridge, ServiceBackend, Session,
};
use ferry_test_support::FakeRemote;

fn blocking_client(remote: &Arc<FakeRemote>) -> anyhow::Result<BlockingFileClient<ServiceBackend>> {
    let bridge = Arc::new(ExecutionBridge::start("ferry-test", Session::new(remote.clone()))?);
    Ok(BlockingFileClient::new(bridge, ServiceBackend).with_settings(ClientSettings {
        poll_interval: Duration::from_millis(1),
        ..ClientSettings::default()
    }))
}

#[test]
fn concurrent_threads_share_one_bridge() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    for index in 0..3 {
        remote.add_file(&format!("/webdav/Users/u{index}/in.txt"), format!("{index}").as_bytes());
    }
    remote.set_running_polls(2);
    let client = Arc::new(blocking_client(&remote)?);

    let workers: Vec<_> = (0..3)
        .map(|index| {
            let client = Arc::clone(&client);
            thread::spawn(move || -> Result<bool, RemoteError> {
                let source = ServicePath::new(ServiceNamespace::Users, &format!("u{index}/in.txt"))?;
                let target = ServicePath::new(ServiceNamespace::Users, &format!("u{index}/out.txt"))?;
                let outcome = client.copy_items(
                    vec![BatchItem::to(source, target)],
                    None,
                    BatchOptions::default(),
                )?;
                Ok(outcome.into_report().is_some_and(|report| report.is_success()))
            })
        })
        .collect();

    for worker in workers {
        let succeeded = worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        assert!(succeeded);
    }
    for index in 0..3 {
        assert_eq!(
            remote.file_content(&format!("/webdav/Users/u{index}/out.txt")),
            Some(format!("{index}").into_bytes())
        );
    }
    Ok(())
}

#[test]
fn handles_from_no_wait_calls_resolve_through_the_bridge() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_file("/webdav/Users/alice/a.txt", b"a");
    let client = blocking_client(&remote)?;

    let handles = client
        .copy_items(
            vec![BatchItem::to(
                ServicePath::new(ServiceNamespace::Users, "alice/a.txt")?,
                ServicePath::new(ServiceNamespace::Users, "alice/b.txt")?,
            )],
            None,
            BatchOptions::default().no_wait(),
        )?
        .into_handles()
        .ok_or_else(|| anyhow::anyhow!("expected handles"))?;

    for handle in handles {
        let task = client.wait_handle(handle)?;
        assert_eq!(task.status, TaskStatus::Completed);
    }

    let again = client.as_awaitable(ferry_core::TaskRef::new("task-1"))?;
    assert_eq!(client.wait_handle(again)?.status, TaskStatus::Completed);
    Ok(())
}

#[test]
fn blocking_file_operations_round_trip() -> anyhow::Result<()> {
    let remote = Arc::new(FakeRemote::service());
    remote.add_folder("/webdav/Backups/laptop");
    let client = blocking_client(&remote)?;
    let folder = ServicePath::new(ServiceNamespace::Backups, "laptop")?;

    let stored = client.upload(folder.clone(), "db.bak", b"dump".to_vec())?;
    let info = client.metadata(stored.clone())?;
    assert_eq!(info.size, 4);
    assert_eq!(client.open(stored.clone())?.path, stored);

    let removed = client.delete(vec![stored], true)?;
    assert_eq!(removed, vec!["laptop/db.bak".to_string()]);
    assert!(!remote.exists("/webdav/Backups/laptop/db.bak"));
    Ok(())
}
