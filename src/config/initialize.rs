use std::path::Path;

use tokio::fs;

use crate::client::tcp::Client;
use crate::client::Store;
use crate::common::{debug, info, Result};
use crate::config::Config;
use crate::core::Workflow;

#[derive(Debug, Default)]
pub struct Initializer {
    pub config: Config,
}

impl Initializer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn load_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let f = fs::File::open(path).await?;
        let config = serde_yaml::from_reader::<_, Config>(f.into_std().await)?;

        Ok(Self { config })
    }

    /// Connect, authenticate when a password is configured and select the db.
    pub async fn connect(&self) -> Result<Box<dyn Store>> {
        let store = &self.config.store;
        debug!(
            host = store.host(),
            port = store.port(),
            tls = store.tls_ca().is_some(),
            "connecting"
        );

        let mut client: Box<dyn Store> = match store.tls_ca() {
            Some(ca) => {
                let mut client = Client::tls_from_addr(store.host(), store.port(), ca).await?;
                login(&mut client, store.username(), store.password(), store.db()).await?;
                Box::new(client)
            }
            None => {
                let mut client = Client::from_addr((store.host(), store.port())).await?;
                login(&mut client, store.username(), store.password(), store.db()).await?;
                Box::new(client)
            }
        };

        let latency = client.ping().await?;
        info!(
            host = store.host(),
            port = store.port(),
            db = store.db(),
            latency_ms = latency.num_milliseconds(),
            "connected"
        );

        Ok(client)
    }

    pub async fn workflow(self) -> Result<Workflow<Box<dyn Store>>> {
        let settings = self.config.sweep.settings()?;
        let store = self.connect().await?;
        Ok(Workflow::new(store, settings))
    }
}

async fn login<T>(client: &mut Client<T>, username: &str, password: &str, db: u32) -> Result<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    if !password.is_empty() {
        client.authenticate(username, password).await?;
    }
    if db != 0 {
        client.select(db).await?;
    }
    Ok(())
}
