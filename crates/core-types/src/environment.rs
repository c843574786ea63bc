//! Environment snapshots and the stable element identity used to re-find
//! elements across observations.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Content hash identifying an element independently of its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementIdentity(String);

impl ElementIdentity {
    /// Hash of the ancestor tag path, the attribute set and the xpath.
    pub fn compute(
        ancestor_path: &[String],
        attributes: &BTreeMap<String, String>,
        x_path: &str,
    ) -> Self {
        let path_hash = sha256_hex(&ancestor_path.join("/"));
        // JSON escaping keeps distinct attribute sets from encoding alike.
        let attributes_str = serde_json::to_string(attributes).unwrap_or_default();
        let attributes_hash = sha256_hex(&attributes_str);
        let xpath_hash = sha256_hex(x_path);
        Self(sha256_hex(&format!(
            "{path_hash}-{attributes_hash}-{xpath_hash}"
        )))
    }

    /// Identity recovered for records written before identities were stored.
    pub fn from_legacy(x_path: &str, tag_name: &str) -> Self {
        Self(sha256_hex(&format!("{x_path}{tag_name}")))
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An interactive element as seen in one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    #[serde(default)]
    pub node_id: i64,
    #[serde(default)]
    pub backend_node_id: i64,
    #[serde(default)]
    pub frame_id: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Tag names from the root down to this element.
    #[serde(default)]
    pub ancestor_path: Vec<String>,
    pub x_path: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl ElementDescriptor {
    pub fn new(tag_name: impl Into<String>, x_path: impl Into<String>) -> Self {
        Self {
            node_id: 0,
            backend_node_id: 0,
            frame_id: None,
            tag_name: tag_name.into(),
            attributes: BTreeMap::new(),
            ancestor_path: Vec::new(),
            x_path: x_path.into(),
            text: None,
            bounds: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_ancestors<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ancestor_path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn identity(&self) -> ElementIdentity {
        ElementIdentity::compute(&self.ancestor_path, &self.attributes, &self.x_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabInfo {
    pub tab_id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub parent_tab_id: Option<String>,
}

impl TabInfo {
    pub fn new(tab_id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            tab_id: tab_id.into(),
            url: url.into(),
            title: title.into(),
            parent_tab_id: None,
        }
    }
}

/// What to collect during an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserveOptions {
    pub include_screenshot: bool,
    /// Remember element identities so later observations can diff them.
    pub cache_element_hashes: bool,
}

impl ObserveOptions {
    /// Observation used at the start of a step.
    pub fn full(include_screenshot: bool) -> Self {
        Self {
            include_screenshot,
            cache_element_hashes: true,
        }
    }

    /// Quick re-observation between actions.
    pub fn cheap() -> Self {
        Self {
            include_screenshot: false,
            cache_element_hashes: false,
        }
    }
}

/// One observation of the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub tabs: Vec<TabInfo>,
    /// Interactive elements keyed by the index the oracle refers to.
    #[serde(default)]
    pub elements: BTreeMap<u32, ElementDescriptor>,
    /// Base64-encoded image.
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl EnvironmentSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_element(mut self, index: u32, element: ElementDescriptor) -> Self {
        self.elements.insert(index, element);
        self
    }

    pub fn with_tab(mut self, tab: TabInfo) -> Self {
        self.tabs.push(tab);
        self
    }

    pub fn element(&self, index: u32) -> Option<&ElementDescriptor> {
        self.elements.get(&index)
    }

    pub fn identity_at(&self, index: u32) -> Option<ElementIdentity> {
        self.element(index).map(ElementDescriptor::identity)
    }

    pub fn identities(&self) -> HashSet<ElementIdentity> {
        self.elements.values().map(ElementDescriptor::identity).collect()
    }

    /// Index of the element whose identity matches, if any.
    pub fn find_by_identity(&self, identity: &ElementIdentity) -> Option<(u32, &ElementDescriptor)> {
        self.elements
            .iter()
            .find(|(_, element)| &element.identity() == identity)
            .map(|(index, element)| (*index, element))
    }
}

/// Element an action acted on, as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractedElement {
    pub node_id: i64,
    pub backend_node_id: i64,
    pub frame_id: Option<String>,
    pub node_type: u32,
    pub node_value: String,
    pub node_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub x_path: String,
    pub bounds: Option<Bounds>,
    pub element_hash: ElementIdentity,
}

impl InteractedElement {
    pub fn from_descriptor(element: &ElementDescriptor) -> Self {
        Self {
            node_id: element.node_id,
            backend_node_id: element.backend_node_id,
            frame_id: element.frame_id.clone(),
            node_type: 1,
            node_value: String::new(),
            node_name: element.tag_name.to_uppercase(),
            attributes: element.attributes.clone(),
            x_path: element.x_path.clone(),
            bounds: element.bounds,
            element_hash: element.identity(),
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Environment summary stored with each step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentStateHistory {
    pub url: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tabs: Vec<TabInfo>,
    /// One entry per requested action, `None` when it targeted no element.
    /// Empty when nothing was recorded.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interacted_element: Vec<Option<InteractedElement>>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
    /// Inline screenshot, only present when explicitly serialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl EnvironmentStateHistory {
    pub fn from_snapshot(
        snapshot: &EnvironmentSnapshot,
        interacted_element: Vec<Option<InteractedElement>>,
        screenshot_path: Option<String>,
    ) -> Self {
        Self {
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            tabs: snapshot.tabs.clone(),
            interacted_element,
            screenshot_path,
            screenshot: None,
        }
    }
}
