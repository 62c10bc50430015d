use log::debug;
use reqwest::Client;
use std::{future::Future, time::Duration};

use crate::error::Error;

/// Retrieves the current content of a page.
pub trait Fetch {
    /// Fetches `url`, failing on transport errors and non-2xx statuses.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, Error>> + Send;
}

impl<T: Fetch> Fetch for &T {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, Error>> + Send {
        (**self).fetch(url)
    }
}

/// Plain HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the shared client. Without a timeout, a hung server stalls the
    /// caller for as long as the transport allows.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(timeout: Option<Duration>) -> Result<Self, Error> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!("GET {url}: {status}");
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}
