use rand::Rng;
use reqwest::blocking::Client;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 6.0; Nexus 5 Build/MRA58N) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Mobile Safari/537.36";

/// The HTTP client could not be built.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A single GET, no retries. The fetcher layers its policy on top.
pub trait Transport {
    fn get(&self, url: &str) -> anyhow::Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str) -> anyhow::Result<HttpResponse> {
        let response = self.client.get(url).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Lower bound of the random courtesy delay before every attempt.
    pub min_delay: Duration,
    /// Upper bound (inclusive) of the courtesy delay.
    pub max_delay: Duration,
    /// Extra wait after a failed attempt when another one remains.
    pub retry_delay: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(7),
            max_delay: Duration::from_secs(10),
            retry_delay: Duration::from_secs(10),
            max_attempts: 3,
            timeout: Duration::from_secs(15),
        }
    }
}

impl FetchPolicy {
    /// No sleeping at all, for tests and local fixtures.
    pub fn immediate() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    fn courtesy_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Anything that can hand the crawler a page body, or nothing.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> Option<String>;
}

pub struct PageFetcher<T: Transport = ReqwestTransport> {
    transport: T,
    policy: FetchPolicy,
}

impl PageFetcher<ReqwestTransport> {
    pub fn new(policy: FetchPolicy) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(policy.timeout)?;
        Ok(Self { transport, policy })
    }
}

impl<T: Transport> PageFetcher<T> {
    pub fn with_transport(transport: T, policy: FetchPolicy) -> Self {
        Self { transport, policy }
    }

    /// GET `url` with the courtesy delay and bounded retries. Returns `None`
    /// once every attempt has failed; never errors.
    pub fn fetch(&self, url: &str) -> Option<String> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            sleep(self.policy.courtesy_delay());
            debug!("GET {} (attempt {}/{})", url, attempt, attempts);

            match self.transport.get(url) {
                Ok(response) if response.status == 200 => {
                    if attempt > 1 {
                        info!("Connected on attempt {}", attempt);
                    }
                    return Some(response.body);
                }
                Ok(response) => {
                    warn!("Status {} (attempt {}/{})", response.status, attempt, attempts);
                }
                Err(e) => {
                    warn!("Network error (attempt {}/{}): {:#}", attempt, attempts, e);
                }
            }

            if attempt < attempts {
                sleep(self.policy.retry_delay);
            }
        }

        warn!("Giving up on {} after {} attempts", url, attempts);
        None
    }
}

impl<T: Transport> PageSource for PageFetcher<T> {
    fn fetch_page(&self, url: &str) -> Option<String> {
        self.fetch(url)
    }
}

fn sleep(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
