//! Callback URL parsing shared by authentication and logout responses.

use indexmap::IndexMap;
use url::Url;
use url::form_urlencoded;

use crate::error::{ProtocolError, ResponsePart};

/// The response parameters found in a callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParameters {
    /// Where the parameters were found.
    pub part: ResponsePart,
    params: IndexMap<String, String>,
}

impl CallbackParameters {
    /// Parses `url`, preferring the fragment over the query.
    ///
    /// Each `name=value` pair must have a non-empty name and value.
    pub fn parse(url: &str) -> Result<Self, ProtocolError> {
        if url.trim().is_empty() {
            return Err(ProtocolError::MissingResponse);
        }
        let parsed = Url::parse(url).map_err(|e| ProtocolError::malformed_url(e.to_string()))?;

        let fragment = parse_pairs(parsed.fragment().unwrap_or_default())?;
        if !fragment.is_empty() {
            return Ok(Self {
                part: ResponsePart::Fragment,
                params: fragment,
            });
        }

        let query = parse_pairs(parsed.query().unwrap_or_default())?;
        if !query.is_empty() {
            return Ok(Self {
                part: ResponsePart::Query,
                params: query,
            });
        }

        Err(ProtocolError::MissingResponse)
    }

    /// A decoded parameter value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Takes a parameter out, leaving the rest.
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.params.shift_remove(name)
    }

    /// Fails with [`ProtocolError::ServerError`] if the server reported an error.
    pub fn ensure_no_errors(&self) -> Result<(), ProtocolError> {
        ensure_no_server_error(
            self.get("error"),
            self.get("error_description"),
            self.get("error_uri"),
        )
    }
}

/// Fails with [`ProtocolError::ServerError`] when any error parameter is present.
pub fn ensure_no_server_error(
    error: Option<&str>,
    description: Option<&str>,
    uri: Option<&str>,
) -> Result<(), ProtocolError> {
    if error.is_none() && description.is_none() && uri.is_none() {
        return Ok(());
    }
    Err(ProtocolError::server_error(
        error.unwrap_or("unknown_error"),
        description.map(str::to_string),
        uri.map(str::to_string),
    ))
}

fn parse_pairs(part: &str) -> Result<IndexMap<String, String>, ProtocolError> {
    let mut params = IndexMap::new();
    for pair in part.split('&').filter(|p| !p.is_empty()) {
        let mut halves = pair.split('=');
        match (halves.next(), halves.next(), halves.next()) {
            (Some(name), Some(value), None) if !name.is_empty() && !value.is_empty() => {
                let (name, value) = form_urlencoded::parse(pair.as_bytes())
                    .next()
                    .ok_or_else(|| ProtocolError::malformed_url(pair))?;
                params.insert(name.into_owned(), value.into_owned());
            }
            _ => return Err(ProtocolError::malformed_url(format!("invalid parameter '{pair}'"))),
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_wins_over_query() {
        let params =
            CallbackParameters::parse("https://app.example/cb?state=q#state=f&id_token=t").unwrap();
        assert_eq!(params.part, ResponsePart::Fragment);
        assert_eq!(params.get("state"), Some("f"));
        assert_eq!(params.get("id_token"), Some("t"));
    }

    #[test]
    fn test_query_when_fragment_empty() {
        let params = CallbackParameters::parse("https://app.example/cb?code=a%2Fb&state=s+1#").unwrap();
        assert_eq!(params.part, ResponsePart::Query);
        assert_eq!(params.get("code"), Some("a/b"));
        assert_eq!(params.get("state"), Some("s 1"));
    }

    #[test]
    fn test_missing_response() {
        assert!(matches!(
            CallbackParameters::parse(""),
            Err(ProtocolError::MissingResponse)
        ));
        assert!(matches!(
            CallbackParameters::parse("https://app.example/cb"),
            Err(ProtocolError::MissingResponse)
        ));
        assert!(matches!(
            CallbackParameters::parse("not a url"),
            Err(ProtocolError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_malformed_pairs() {
        for url in [
            "https://app.example/cb?state",
            "https://app.example/cb?state=",
            "https://app.example/cb?=value",
            "https://app.example/cb#a=b=c",
        ] {
            assert!(
                matches!(CallbackParameters::parse(url), Err(ProtocolError::MalformedUrl(_))),
                "{url}"
            );
        }
        // empty segments are skipped
        assert!(CallbackParameters::parse("https://app.example/cb?a=b&&c=d").is_ok());
    }

    #[test]
    fn test_server_error() {
        let params = CallbackParameters::parse(
            "https://app.example/cb?error=access_denied&error_description=User+cancelled&state=s",
        )
        .unwrap();
        match params.ensure_no_errors() {
            Err(ProtocolError::ServerError { error, description, uri }) => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("User cancelled"));
                assert_eq!(uri, None);
            }
            other => panic!("unexpected {other:?}"),
        }

        let ok = CallbackParameters::parse("https://app.example/cb?state=s").unwrap();
        assert!(ok.ensure_no_errors().is_ok());
    }
}
