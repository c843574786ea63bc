//! Reversible shortening of long URLs in oracle messages.
//!
//! Long query strings and fragments cost tokens without helping the oracle.
//! They are truncated and tagged with a short hash before the call, and the
//! originals are put back into whatever the oracle returns.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use soulpilot_core_types::{Action, DecisionOutput};

use crate::message::{ContentPart, Message, Role};

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'`]+"#).expect("url regex"));

const HASH_CHARS: usize = 7;

/// Mapping from shortened URL to the original, valid for one oracle call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlReplacements(BTreeMap<String, String>);

impl UrlReplacements {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, shortened: &str) -> Option<&str> {
        self.0.get(shortened).map(String::as_str)
    }

    fn extend(&mut self, other: UrlReplacements) {
        self.0.extend(other.0);
    }

    /// Put every original URL back into `text`.
    pub fn restore_str(&self, text: &str) -> String {
        let mut restored = text.to_string();
        for (shortened, original) in &self.0 {
            if restored.contains(shortened.as_str()) {
                restored = restored.replace(shortened.as_str(), original);
            }
        }
        restored
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UrlShortener {
    limit: usize,
}

impl UrlShortener {
    /// `limit` is the longest query/fragment kept verbatim.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn shorten_url(&self, url: &str) -> Option<String> {
        let split = [url.find('?'), url.find('#')]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(url.len());
        let (base, after_path) = url.split_at(split);
        if after_path.chars().count() <= self.limit {
            return None;
        }

        let kept: String = after_path.chars().take(self.limit).collect();
        let digest = hex::encode(Sha256::digest(after_path.as_bytes()));
        let shortened = format!("{base}{kept}...{}", &digest[..HASH_CHARS]);
        (shortened.len() < url.len()).then_some(shortened)
    }

    pub fn shorten_text(&self, text: &str) -> (String, UrlReplacements) {
        let mut replacements = BTreeMap::new();
        let shortened = URL_PATTERN.replace_all(text, |caps: &Captures<'_>| {
            let original = &caps[0];
            match self.shorten_url(original) {
                Some(short) => {
                    replacements.insert(short.clone(), original.to_string());
                    short
                }
                None => original.to_string(),
            }
        });
        (shortened.into_owned(), UrlReplacements(replacements))
    }

    /// Shortened copies of `messages`. System messages are left alone.
    pub fn shorten_messages(&self, messages: &[Message]) -> (Vec<Message>, UrlReplacements) {
        let mut all = UrlReplacements::default();
        let shortened = messages
            .iter()
            .map(|message| {
                if message.role == Role::System {
                    return message.clone();
                }
                let content = message
                    .content
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => {
                            let (text, found) = self.shorten_text(text);
                            all.extend(found);
                            ContentPart::Text { text }
                        }
                        image => image.clone(),
                    })
                    .collect();
                Message {
                    role: message.role,
                    content,
                }
            })
            .collect();
        (shortened, all)
    }
}

/// Rebuild a value with every shortened URL replaced by its original.
pub trait RestoreUrls: Sized {
    fn restore_urls(self, replacements: &UrlReplacements) -> Self;
}

impl RestoreUrls for String {
    fn restore_urls(self, replacements: &UrlReplacements) -> Self {
        replacements.restore_str(&self)
    }
}

impl<T: RestoreUrls> RestoreUrls for Option<T> {
    fn restore_urls(self, replacements: &UrlReplacements) -> Self {
        self.map(|inner| inner.restore_urls(replacements))
    }
}

impl<T: RestoreUrls> RestoreUrls for Vec<T> {
    fn restore_urls(self, replacements: &UrlReplacements) -> Self {
        self.into_iter()
            .map(|item| item.restore_urls(replacements))
            .collect()
    }
}

impl RestoreUrls for Value {
    fn restore_urls(self, replacements: &UrlReplacements) -> Self {
        match self {
            Value::String(text) => Value::String(text.restore_urls(replacements)),
            Value::Array(items) => Value::Array(items.restore_urls(replacements)),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, value.restore_urls(replacements)))
                    .collect::<Map<String, Value>>(),
            ),
            scalar => scalar,
        }
    }
}

impl RestoreUrls for Action {
    fn restore_urls(self, replacements: &UrlReplacements) -> Self {
        let params = self
            .params()
            .clone()
            .into_iter()
            .map(|(key, value)| (key, value.restore_urls(replacements)))
            .collect();
        Action::new(self.name(), params)
    }
}

impl RestoreUrls for DecisionOutput {
    fn restore_urls(self, replacements: &UrlReplacements) -> Self {
        if replacements.is_empty() {
            return self;
        }
        DecisionOutput {
            thinking: self.thinking.restore_urls(replacements),
            evaluation_previous_goal: self.evaluation_previous_goal.restore_urls(replacements),
            memory: self.memory.restore_urls(replacements),
            next_goal: self.next_goal.restore_urls(replacements),
            actions: self.actions.restore_urls(replacements),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LONG: &str = "https://shop.example.com/search?q=running+shoes&size=42&color=blue&sort=price";

    #[test]
    fn long_query_is_truncated_with_hash() {
        let shortener = UrlShortener::new(25);
        let (text, replacements) = shortener.shorten_text(&format!("open {LONG} now"));
        assert_eq!(replacements.len(), 1);

        let digest = hex::encode(Sha256::digest(
            "?q=running+shoes&size=42&color=blue&sort=price".as_bytes(),
        ));
        let expected = format!(
            "https://shop.example.com/search?q=running+shoes&size=42&...{}",
            &digest[..7]
        );
        assert_eq!(text, format!("open {expected} now"));
        assert_eq!(replacements.get(&expected), Some(LONG));
    }

    #[test]
    fn short_queries_and_plain_paths_are_kept() {
        let shortener = UrlShortener::new(25);
        for url in [
            "https://example.com/a/very/long/path/without/any/query/string/at/all",
            "https://example.com/?q=1",
        ] {
            let (text, replacements) = shortener.shorten_text(url);
            assert_eq!(text, url);
            assert!(replacements.is_empty());
        }
    }

    #[test]
    fn system_messages_are_not_shortened() {
        let shortener = UrlShortener::new(10);
        let messages = vec![Message::system(LONG), Message::user(LONG)];
        let (shortened, replacements) = shortener.shorten_messages(&messages);
        assert_eq!(shortened[0].text(), LONG);
        assert_ne!(shortened[1].text(), LONG);
        assert_eq!(replacements.len(), 1);
    }

    #[test]
    fn restores_nested_action_params() {
        let shortener = UrlShortener::new(10);
        let (short_text, replacements) = shortener.shorten_text(LONG);

        let output = DecisionOutput::new(vec![Action::from_value(
            "navigate",
            json!({"url": short_text, "extra": {"links": [short_text, 3]}}),
        )
        .unwrap()])
        .with_memory(format!("visited {short_text}"));

        let restored = output.restore_urls(&replacements);
        let action = &restored.actions[0];
        assert_eq!(action.param("url"), Some(&json!(LONG)));
        assert_eq!(action.param("extra"), Some(&json!({"links": [LONG, 3]})));
        assert_eq!(restored.memory.as_deref(), Some(format!("visited {LONG}").as_str()));
    }
}
