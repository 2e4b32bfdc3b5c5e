use std::sync::Arc;

use crate::{
    config::Config,
    database::{RedisStore, init_redis},
    error::StartupError,
    notify::{LogNotifier, Notifier, WebhookNotifier},
    store::Store,
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, StartupError> {
        let connection = init_redis(&config.redis_url).await?;
        let store: Arc<dyn Store> = Arc::new(RedisStore::new(connection));
        store.ping().await?;

        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(
                url,
                config.notify_webhook_key.clone(),
                config.request_timeout,
            )?),
            None => Arc::new(LogNotifier),
        };

        Ok(Self::with_parts(config, store, notifier))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            notifier,
        })
    }
}
