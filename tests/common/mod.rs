use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ttlsweep::client::memory::MemoryStore;
use ttlsweep::core::Settings;

pub fn temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

pub fn settings(backup_path: PathBuf) -> Settings {
    Settings {
        backup_path,
        ..Settings::default()
    }
}

/// Keys a..=e without ttl, two session keys with ttl and one binary value.
pub fn populated_store() -> MemoryStore {
    let mut store = MemoryStore::new().with_page_size(4);
    for (key, value) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")] {
        store.insert(key, value, None);
    }
    store.insert("session:1", "s", Some(std::time::Duration::from_secs(600)));
    store.insert("session:2", "s", Some(std::time::Duration::from_secs(600)));
    store.insert("blob", [0x00_u8, 0xff, 0x10], None);
    store
}

/// Accept one connection and answer each expected request with a raw reply.
pub async fn scripted_server(
    script: Vec<(&'static str, &'static str)>,
) -> (u16, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        for (want, reply) in script {
            let mut got = vec![0; want.len()];
            stream.read_exact(&mut got).await.unwrap();
            assert_eq!(String::from_utf8(got).unwrap(), want);
            stream.write_all(reply.as_bytes()).await.unwrap();
        }
    });

    (port, handle)
}
