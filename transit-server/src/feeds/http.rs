//! Response handling shared by the HTTP feed clients.

use reqwest::{StatusCode, Url};

use super::FeedError;

/// Map the status code to a `FeedError` or return the body text.
///
/// `404` maps to `NotFound` with `what` as the message.
pub(crate) async fn read_body(response: reqwest::Response, what: &str) -> Result<String, FeedError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FeedError::Unauthorized);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FeedError::RateLimited);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(FeedError::NotFound(what.to_string()));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FeedError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    Ok(response.text().await?)
}

/// Parse a JSON body, keeping a snippet of it on failure.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, FeedError> {
    serde_json::from_str(body).map_err(|e| FeedError::json(e, body))
}

pub(crate) fn parse_base(url: &str) -> Result<Url, FeedError> {
    let url = Url::parse(url).map_err(|e| FeedError::NotConfigured(format!("{url}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(FeedError::NotConfigured(format!("{url}: not a base URL")));
    }
    Ok(url)
}

/// Append path segments to a base URL, percent-encoding each one.
pub(crate) fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_encodes_each_segment() {
        let base = parse_base("http://localhost:3000/api/").unwrap();
        let url = join(&base, &["trips", "a/b c"]);
        assert_eq!(url.as_str(), "http://localhost:3000/api/trips/a%2Fb%20c");

        let base = parse_base("http://localhost:3000/api").unwrap();
        let url = join(&base, &["departures", "Köln Messe/Deutz"]);
        assert_eq!(url.path(), "/api/departures/K%C3%B6ln%20Messe%2FDeutz");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(parse_base("not a url").is_err());
        assert!(parse_base("mailto:x@example.org").is_err());
    }
}
