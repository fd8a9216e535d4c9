use std::time::Duration;

use ttlsweep::backup::{RecordShape, SkipReason};
use ttlsweep::client::memory::{Command, MemoryStore};
use ttlsweep::client::{Store, Ttl};
use ttlsweep::config::{Config, Initializer};
use ttlsweep::core::{OnKeyError, Policy, Throttle, Workflow};
use ttlsweep::SweepError;

mod common;

#[test]
fn backup_expire_restore_cycle() {
    tokio_test::block_on(async move {
        let dir = common::temp_dir();
        let path = dir.path().join("backup.txt");
        let mut workflow = Workflow::new(common::populated_store(), common::settings(path.clone()));

        let summary = workflow.backup(true).await.unwrap();
        assert_eq!(summary.written, 5);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0.as_str(), "blob");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a###1\nb###2\nc###3\nd###4\ne###5\n"
        );

        let summary = workflow.expire().await.unwrap();
        assert_eq!(summary.succeeded, 5);
        // running it again gives the same ttl.
        workflow.expire().await.unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            assert_eq!(
                workflow.store_mut().remaining_ttl(key),
                Ttl::Expires(Policy::DEFAULT_EXPIRE_AFTER)
            );
        }
        assert_eq!(workflow.store_mut().remaining_ttl("blob"), Ttl::Persistent);

        let summary = workflow.restore().await.unwrap();
        assert_eq!(summary.succeeded, 5);
        for key in ["a", "b", "c", "d", "e"] {
            assert_eq!(workflow.store_mut().remaining_ttl(key), Ttl::Persistent);
        }
    })
}

#[test]
fn unfiltered_backup_then_delete() {
    tokio_test::block_on(async move {
        let dir = common::temp_dir();
        let path = dir.path().join("backup.txt");
        let mut workflow = Workflow::new(common::populated_store(), common::settings(path));

        let summary = workflow.backup(false).await.unwrap();
        assert_eq!(summary.written, 6);

        let summary = workflow.delete().await.unwrap();
        assert_eq!(summary.succeeded, 6);

        let store = workflow.store_mut();
        assert_eq!(store.len(), 2);
        assert_eq!(store.calls(Command::Unlink), 6);
        assert!(store.value("session:1").is_some());
    })
}

#[test]
fn key_ending_in_hash_never_targets_its_prefix() {
    tokio_test::block_on(async move {
        let dir = common::temp_dir();
        let path = dir.path().join("backup.txt");

        let mut store = MemoryStore::new();
        store.insert("user#", "1", None);
        store.insert("user", "precious", Some(Duration::from_secs(600)));
        let mut workflow = Workflow::new(store, common::settings(path.clone()));

        let summary = workflow.backup(true).await.unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0.as_str(), "user#");
        assert_eq!(summary.skipped[0].1, SkipReason::ContainsDelimiter);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        let summary = workflow.delete().await.unwrap();
        assert_eq!(summary.attempted, 0);

        let store = workflow.store_mut();
        assert_eq!(&store.value("user").unwrap()[..], b"precious");
        assert!(matches!(store.remaining_ttl("user"), Ttl::Expires(_)));
        assert!(store.value("user#").is_some());
        assert_eq!(store.calls(Command::Unlink), 0);
    })
}

#[test]
fn backup_replaces_previous_file() {
    tokio_test::block_on(async move {
        let dir = common::temp_dir();
        let path = dir.path().join("backup.txt");
        std::fs::write(&path, "stale###entry\nmore###lines\nthat###were\nhere###before\n").unwrap();

        let mut store = MemoryStore::new();
        store.insert("k", "v", None);
        let mut workflow = Workflow::new(store, common::settings(path.clone()));
        workflow.backup(true).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "k###v\n");
    })
}

#[test]
fn restore_ignores_rejected_lines() {
    tokio_test::block_on(async move {
        let dir = common::temp_dir();
        let path = dir.path().join("backup.txt");
        std::fs::write(
            &path,
            "good###1\nlonely\nx###y###z\nuser:otp###123456\n###empty\nlast###2",
        )
        .unwrap();

        let mut workflow = Workflow::new(MemoryStore::new(), common::settings(path));
        let summary = workflow.restore().await.unwrap();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 2);

        let store = workflow.store_mut();
        assert_eq!(store.len(), 2);
        assert_eq!(&store.value("good").unwrap()[..], b"1");
        assert_eq!(&store.value("last").unwrap()[..], b"2");
    })
}

#[test]
fn key_only_shape() {
    tokio_test::block_on(async move {
        let dir = common::temp_dir();
        let mut settings = common::settings(dir.path().join("keys.txt"));
        settings.shape = RecordShape::KeyOnly;
        settings.pattern = "[ab]".into();

        let mut workflow = Workflow::new(common::populated_store(), settings);
        workflow.backup(true).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("keys.txt")).unwrap(), "a\nb\n");

        let summary = workflow.delete().await.unwrap();
        assert_eq!(summary.succeeded, 2);
        assert!(workflow.store_mut().value("a").is_none());
        assert!(workflow.store_mut().value("c").is_some());
    })
}

#[test]
fn sweep_with_throttle() {
    tokio_test::block_on(async move {
        let mut store = MemoryStore::new().with_page_size(50);
        for i in 0..1000 {
            store.insert(&format!("key:{}", i), "v", None);
        }
        store.insert("keep", "v", Some(Duration::from_secs(600)));

        let dir = common::temp_dir();
        let mut settings = common::settings(dir.path().join("unused.txt"));
        settings.policy.throttle = Throttle {
            every: 1000,
            pause: Duration::ZERO,
        };

        let mut workflow = Workflow::new(store, settings);
        let summary = workflow.sweep().await.unwrap();
        assert_eq!(summary.succeeded, 1000);
        assert_eq!(summary.pauses, 1);

        let store = workflow.store_mut();
        assert_eq!(store.len(), 1);
        assert_eq!(store.calls(Command::Get), 0);
    })
}

#[test]
fn abort_policy_stops_at_failing_key() {
    tokio_test::block_on(async move {
        let dir = common::temp_dir();
        let path = dir.path().join("backup.txt");
        std::fs::write(&path, "a###1\nb###2\nc###3\n").unwrap();

        let mut store = MemoryStore::new();
        for key in ["a", "b", "c"] {
            store.insert(key, "v", None);
        }
        store.fail(Command::Expire, "b");

        let mut settings = common::settings(path);
        settings.policy.on_key_error = OnKeyError::Abort;
        let mut workflow = Workflow::new(store, settings);

        let err = workflow.expire().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SweepError::KeyOperationAborted { ref key, .. } if key == "b"
        ));
        // keys are processed in order, c is never reached.
        assert_eq!(workflow.store_mut().remaining_ttl("c"), Ttl::Persistent);
    })
}

#[test]
fn connect_over_tcp() {
    tokio_test::block_on(async move {
        let (port, server) = common::scripted_server(vec![
            (
                "*2\r\n$4\r\nAUTH\r\n$6\r\nsecret\r\n",
                "+OK\r\n",
            ),
            ("*2\r\n$6\r\nSELECT\r\n$1\r\n2\r\n", "+OK\r\n"),
            ("*1\r\n$4\r\nPING\r\n", "+PONG\r\n"),
            (
                "*4\r\n$4\r\nSCAN\r\n$1\r\n0\r\n$5\r\nMATCH\r\n$1\r\n*\r\n",
                "*2\r\n$1\r\n0\r\n*1\r\n$1\r\nk\r\n",
            ),
            ("*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n", ":-1\r\n"),
        ])
        .await;

        let mut config = Config::default();
        config.store.set_host(&mut Some("127.0.0.1".to_owned()));
        config.store.set_port(Some(port));
        config.store.set_password(&mut Some("secret".to_owned()));
        config.store.set_db(Some(2));

        let mut store = Initializer::new(config).connect().await.unwrap();
        let page = store.scan(0, "*", None).await.unwrap();
        assert_eq!(page.cursor, 0);
        assert_eq!(page.keys.len(), 1);
        assert_eq!(store.ttl(&page.keys[0]).await.unwrap(), Ttl::Persistent);

        server.await.unwrap();
    })
}

#[test]
fn rejected_credentials() {
    tokio_test::block_on(async move {
        let (port, server) = common::scripted_server(vec![(
            "*3\r\n$4\r\nAUTH\r\n$5\r\nadmin\r\n$5\r\nwrong\r\n",
            "-WRONGPASS invalid username-password pair or user is disabled.\r\n",
        )])
        .await;

        let mut config = Config::default();
        config.store.set_host(&mut Some("127.0.0.1".to_owned()));
        config.store.set_port(Some(port));
        config.store.set_username(&mut Some("admin".to_owned()));
        config.store.set_password(&mut Some("wrong".to_owned()));

        let err = Initializer::new(config).connect().await.err().unwrap();
        assert!(matches!(err, SweepError::Unauthenticated));

        server.await.unwrap();
    })
}
