//! Fetch collaborator contract and the redirect-following driver.

use core::time::Duration;
use log::debug;
use log::warn;
use pp_core::PapyrusError;
use pp_core::PapyrusResult;

use crate::http::FetchResponse;
use crate::url::UrlParts;
use crate::url::try_resolve;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_REDIRECTS: usize = 3;
const DEFAULT_MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Bounds applied to a single document load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub max_response_bytes: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl FetchLimits {
    pub fn validate(&self) -> PapyrusResult<()> {
        if self.timeout.is_zero() {
            return Err(PapyrusError::new(
                "net.fetch.limits_invalid",
                "fetch timeout must be greater than zero",
            ));
        }

        if self.max_response_bytes == 0 {
            return Err(PapyrusError::new(
                "net.fetch.limits_invalid",
                "max_response_bytes must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Performs one request. Implementations must not follow redirects
/// themselves; [`fetch_document`] does that.
pub trait Fetcher {
    fn fetch(&mut self, url: &UrlParts, limits: &FetchLimits) -> PapyrusResult<FetchResponse>;
}

/// Final response of a load together with the URL it was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub url: UrlParts,
    pub response: FetchResponse,
    pub redirects: usize,
}

/// Fetches `url`, following redirects and enforcing `limits`.
pub fn fetch_document<F>(
    fetcher: &mut F,
    url: &str,
    limits: &FetchLimits,
) -> PapyrusResult<FetchedDocument>
where
    F: Fetcher + ?Sized,
{
    limits.validate()?;

    let mut current = UrlParts::parse(url)?;
    let mut redirects = 0_usize;

    loop {
        let response = fetcher.fetch(&current, limits)?;

        if response.body.len() > limits.max_response_bytes {
            warn!(
                "response from {current} is {} bytes, over the {} byte limit",
                response.body.len(),
                limits.max_response_bytes
            );
            return Err(PapyrusError::new(
                "net.fetch.response_too_large",
                format!("response body exceeds {} bytes", limits.max_response_bytes),
            ));
        }

        let location = match response.location() {
            Some(location) if response.is_redirect() => location,
            _ => {
                return Ok(FetchedDocument {
                    url: current,
                    response,
                    redirects,
                });
            }
        };

        if redirects >= limits.max_redirects {
            warn!("giving up on {current} after {redirects} redirects");
            return Err(PapyrusError::new(
                "net.fetch.redirect_limit",
                format!("exceeded redirect limit ({})", limits.max_redirects),
            ));
        }

        let base = current.to_string();
        let Some(target) = try_resolve(&base, location)? else {
            return Err(PapyrusError::new(
                "net.fetch.redirect_target_invalid",
                format!("redirect from {base} points to unusable location `{location}`"),
            ));
        };

        debug!("redirect {} -> {target}", response.status_line.trim());
        current = UrlParts::parse(&target)?;
        redirects += 1;
    }
}
