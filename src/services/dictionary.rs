//! Remote dictionary access.
//!
//! [`DictionarySource`] is the seam between the crawler and the network:
//! the builder only ever sees typed results, so tests can swap in a
//! scripted source.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{FetchError, Result};
use crate::models::{Config, DictionaryItem, User};
use crate::utils::http::{dictionary_base_url, user_base_url};

/// Capabilities the crawler needs from the remote service.
#[async_trait]
pub trait DictionarySource: Send + Sync {
    /// Fetch a user profile including its lesson trees.
    async fn fetch_user(&self, username: &str) -> std::result::Result<User, FetchError>;

    /// Fetch the dictionary page of a lexeme, translated into `into_language`.
    async fn fetch_dictionary_item(
        &self,
        lexeme_id: &str,
        into_language: &str,
    ) -> std::result::Result<DictionaryItem, FetchError>;
}

/// [`DictionarySource`] backed by the public HTTP API.
pub struct HttpDictionary {
    client: Client,
    /// Dictionary endpoint per configured language ID
    dictionary_bases: HashMap<String, Url>,
    /// User endpoint without its `{username}` segment
    user_base: Url,
}

impl HttpDictionary {
    /// Resolve the endpoint templates for every configured language.
    ///
    /// A template that does not yield a usable URL is a configuration
    /// error, reported here instead of on every lookup.
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        let mut dictionary_bases = HashMap::new();
        for language in &config.languages {
            let url = dictionary_base_url(&config.endpoints.dictionary_url, &language.id)?;
            dictionary_bases.insert(language.id.clone(), url);
        }

        Ok(Self {
            client,
            dictionary_bases,
            user_base: user_base_url(&config.endpoints.user_url)?,
        })
    }

    /// Only configured language IDs ever reach the URL host or the cookie.
    fn dictionary_url(
        &self,
        lexeme_id: &str,
        into_language: &str,
    ) -> std::result::Result<Url, FetchError> {
        let mut url = self
            .dictionary_bases
            .get(into_language)
            .cloned()
            .ok_or_else(|| FetchError::UnsupportedLanguage {
                language: into_language.to_string(),
            })?;
        url.query_pairs_mut().append_pair("lexeme_id", lexeme_id);
        Ok(url)
    }

    fn user_url(&self, username: &str) -> Url {
        let mut url = self.user_base.clone();
        // `user_base_url` rejected cannot-be-a-base URLs.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(username);
        }
        url
    }

    /// Send a request and decode a JSON body, classifying every failure.
    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> std::result::Result<T, FetchError> {
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::network(url.as_str(), e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::network(url.as_str(), e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::parse(url.as_str(), e))
    }
}

#[async_trait]
impl DictionarySource for HttpDictionary {
    async fn fetch_user(&self, username: &str) -> std::result::Result<User, FetchError> {
        let url = self.user_url(username);
        log::debug!("Fetching user {}", url);
        self.get_json(self.client.get(url.clone()), &url).await
    }

    async fn fetch_dictionary_item(
        &self,
        lexeme_id: &str,
        into_language: &str,
    ) -> std::result::Result<DictionaryItem, FetchError> {
        let url = self.dictionary_url(lexeme_id, into_language)?;
        let request = self
            .client
            .get(url.clone())
            .header(header::COOKIE, format!("lang={}", into_language));
        self.get_json(request, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn source() -> HttpDictionary {
        HttpDictionary::new(Client::new(), &Config::default()).unwrap()
    }

    #[test]
    fn test_dictionary_url() {
        let url = source().dictionary_url("a1b2", "en").unwrap();
        assert_eq!(url.host_str(), Some("en.duolingo.com"));
        assert_eq!(url.query(), Some("lexeme_id=a1b2"));
    }

    #[test]
    fn test_lexeme_id_is_query_encoded() {
        let url = source().dictionary_url("a b&c", "fr").unwrap();
        assert_eq!(url.query(), Some("lexeme_id=a+b%26c"));
    }

    #[test]
    fn test_language_must_be_configured() {
        let source = source();
        for language in ["evil.example/x?", "de", ""] {
            assert_eq!(
                source.dictionary_url("x", language),
                Err(FetchError::UnsupportedLanguage {
                    language: language.to_string()
                })
            );
        }
    }

    #[tokio::test]
    async fn test_unconfigured_language_sends_nothing() {
        let err = source()
            .fetch_dictionary_item("x", "evil.example/x?")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn test_user_url() {
        let url = source().user_url("owl");
        assert_eq!(url.as_str(), "https://www.duolingo.com/users/owl");
    }

    #[test]
    fn test_username_stays_one_path_segment() {
        let url = source().user_url("a/b?c#d");
        assert_eq!(url.host_str(), Some("www.duolingo.com"));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        let segments: Vec<_> = url.path_segments().unwrap().collect();
        assert_eq!(segments, vec!["users", "a%2Fb%3Fc%23d"]);
    }

    #[test]
    fn test_bad_dictionary_template_is_config_error() {
        let mut config = Config::default();
        config.endpoints.dictionary_url = "not a url {lang}".into();
        assert!(matches!(
            HttpDictionary::new(Client::new(), &config),
            Err(AppError::Config(_))
        ));
    }
}
