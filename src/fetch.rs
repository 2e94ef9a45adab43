use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Settings;
use crate::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches one document. Implementations own transport concerns; callers only
/// see the body or a `FetchError`.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "fetched");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::Fetcher;
    use crate::error::FetchError;

    pub enum Reply {
        Body(String),
        NotFound,
        Status(u16),
    }

    /// In-memory fetcher. Unscripted URLs answer 404; every request is logged.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        replies: HashMap<String, Reply>,
        pub requested: RefCell<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
            self.replies.insert(url.to_string(), Reply::Body(body.into()));
            self
        }

        pub fn reply(mut self, url: &str, reply: Reply) -> Self {
            self.replies.insert(url.to_string(), reply);
            self
        }

        pub fn was_requested(&self, url: &str) -> bool {
            self.requested.borrow().iter().any(|u| u == url)
        }
    }

    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.borrow_mut().push(url.to_string());
            match self.replies.get(url) {
                Some(Reply::Body(b)) => Ok(b.clone()),
                Some(Reply::Status(status)) => Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                }),
                Some(Reply::NotFound) | None => Err(FetchError::NotFound {
                    url: url.to_string(),
                }),
            }
        }
    }
}
