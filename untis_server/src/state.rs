use untis_core::{Config, FeedSettings, WebUntisClient};

/// Shared by all requests; nothing in it changes after start-up.
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: WebUntisClient,
    pub settings: FeedSettings,
    pub access_token: Option<String>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            client: WebUntisClient::new(config.untis.clone()),
            settings: FeedSettings::from(config),
            access_token: config.access_token.clone(),
        }
    }
}
