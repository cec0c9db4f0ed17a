use std::sync::Arc;

use census::Store;

use super::{
    auth::token::TokenSigner,
    config::Config,
    database::init_store,
    error::AppError,
    mail::{Mailer, init_mailer},
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: TokenSigner,
}

impl State {
    pub async fn new() -> Result<Arc<Self>, AppError> {
        let config = Config::load();

        let store = init_store(&config).await?;
        let mailer = init_mailer(&config)?;

        Ok(Self::with_parts(config, store, mailer))
    }

    pub fn with_parts(config: Config, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Arc<Self> {
        let tokens = TokenSigner::new(&config.jwt_secret, config.token_ttl_hours);

        Arc::new(Self {
            config,
            store,
            mailer,
            tokens,
        })
    }
}
