//! Action catalog and the decision schema derived from it.
//!
//! The catalog is the set of actions the oracle may request. From it a
//! [`DecisionSchema`] is built per step: it restricts actions to the ones
//! available on the current page (or to the terminal action only), renders
//! a JSON schema to hand to the oracle, and validates what comes back.

use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;

use crate::action::{Action, DONE_ACTION};
use crate::decision::DecisionOutput;
use crate::errors::CoreError;

/// Parameters of the built-in terminal action.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DoneParams {
    /// Whether the task was completed successfully.
    pub success: bool,
    /// Final answer or summary for the user.
    pub text: String,
    /// Files to surface to the user alongside the answer.
    #[serde(default)]
    pub files_to_display: Option<Vec<String>>,
}

/// Compiled parameter schema, shared between clones of a spec.
#[derive(Clone)]
struct ParamValidator(Arc<Result<JSONSchema, String>>);

impl ParamValidator {
    fn compile(schema: &Value) -> Self {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&closed_object(schema))
            .map_err(|err| err.to_string());
        Self(Arc::new(compiled))
    }

    fn error(&self) -> Option<&str> {
        match &*self.0 {
            Ok(_) => None,
            Err(err) => Some(err.as_str()),
        }
    }
}

impl fmt::Debug for ParamValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            None => f.write_str("ParamValidator(compiled)"),
            Some(err) => write!(f, "ParamValidator(invalid: {err})"),
        }
    }
}

/// Description of one registered action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the parameter object.
    param_schema: Value,
    /// Whether requesting this action ends the run.
    pub terminal: bool,
    /// Domain patterns this action is limited to; `None` means everywhere.
    pub domains: Option<Vec<String>>,
    #[serde(skip)]
    validator: ParamValidator,
}

impl PartialEq for ActionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.param_schema == other.param_schema
            && self.terminal == other.terminal
            && self.domains == other.domains
    }
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, param_schema: Value) -> Self {
        let validator = ParamValidator::compile(&param_schema);
        Self {
            name: name.into(),
            description: description.into(),
            param_schema,
            terminal: false,
            domains: None,
            validator,
        }
    }

    /// Spec whose parameter schema is derived from `P`.
    pub fn typed<P: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, schema_of::<P>())
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    pub fn param_schema(&self) -> &Value {
        &self.param_schema
    }

    /// Whether this action is offered on a page at `url`.
    ///
    /// Without a page URL only unrestricted actions are offered.
    pub fn available_on(&self, url: Option<&str>) -> bool {
        let Some(domains) = &self.domains else {
            return true;
        };
        let Some(parsed) = url.and_then(|u| Url::parse(u).ok()) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        domains.iter().any(|pattern| domain_matches(pattern, host))
    }

    fn properties(&self) -> Option<&Map<String, Value>> {
        self.param_schema.get("properties").and_then(Value::as_object)
    }

    /// Check an action's parameters against this spec.
    pub fn validate_params(&self, params: &Map<String, Value>) -> Result<(), CoreError> {
        let compiled = match &*self.validator.0 {
            Ok(compiled) => compiled,
            Err(err) => return Err(CoreError::invalid_schema(&self.name, err.clone())),
        };
        let instance = Value::Object(params.clone());
        if let Err(errors) = compiled.validate(&instance) {
            let first = errors
                .into_iter()
                .next()
                .map(|err| err.to_string())
                .unwrap_or_else(|| "schema validation failed".to_string());
            return Err(CoreError::invalid_params(&self.name, first));
        }
        Ok(())
    }
}

/// Options that shape the decision schema for one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaOptions {
    /// Current page URL, used for domain filtering.
    pub page_url: Option<String>,
    /// Allow only terminal actions.
    pub terminal_only: bool,
    /// Include the free-form `thinking` field.
    pub use_thinking: bool,
    /// Reduce the output to `memory` and `action`.
    pub flash_mode: bool,
}

impl SchemaOptions {
    pub fn for_page(url: impl Into<String>) -> Self {
        Self {
            page_url: Some(url.into()),
            use_thinking: true,
            ..Default::default()
        }
    }

    pub fn terminal_only(mut self) -> Self {
        self.terminal_only = true;
        self
    }
}

/// Ordered registry of the actions the oracle may request.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    specs: Vec<ActionSpec>,
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionCatalog {
    /// Catalog holding only the terminal `done` action.
    pub fn new() -> Self {
        Self {
            specs: vec![ActionSpec::typed::<DoneParams>(
                DONE_ACTION,
                "Complete the task. Set success to false if the task could not be fully finished.",
            )
            .terminal()],
        }
    }

    pub fn register(&mut self, spec: ActionSpec) -> Result<&mut Self, CoreError> {
        if let Some(err) = spec.validator.error() {
            return Err(CoreError::invalid_schema(&spec.name, err));
        }
        if self.get(&spec.name).is_some() {
            return Err(CoreError::DuplicateAction(spec.name));
        }
        self.specs.push(spec);
        Ok(self)
    }

    /// Replace the terminal action with one whose `data` parameter follows
    /// `schema`, so the final answer comes back as structured JSON.
    pub fn bind_output_schema(&mut self, schema: &Value) -> Result<&mut Self, CoreError> {
        let spec = ActionSpec::new(
            DONE_ACTION,
            "Complete the task. Put the final answer in data, following its schema. \
             Set success to false if the task could not be fully finished.",
            structured_done_schema(schema),
        )
        .terminal();
        if let Some(err) = spec.validator.error() {
            return Err(CoreError::invalid_schema(DONE_ACTION, err));
        }
        match self.specs.iter_mut().find(|existing| existing.name == DONE_ACTION) {
            Some(existing) => *existing = spec,
            None => self.specs.insert(0, spec),
        }
        Ok(self)
    }

    pub fn bind_output_type<T: JsonSchema>(&mut self) -> Result<&mut Self, CoreError> {
        self.bind_output_schema(&schema_of::<T>())
    }

    pub fn register_typed<P: JsonSchema>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&mut Self, CoreError> {
        self.register(ActionSpec::typed::<P>(name, description))
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_action(mut self, spec: ActionSpec) -> Result<Self, CoreError> {
        self.register(spec)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn is_terminal(&self, action: &Action) -> bool {
        self.get(action.name()).map(|spec| spec.terminal).unwrap_or(false)
    }

    /// Validate a (non-empty) action against the full catalog.
    pub fn validate(&self, action: &Action) -> Result<(), CoreError> {
        let spec = self
            .get(action.name())
            .ok_or_else(|| CoreError::UnknownAction(action.name().to_string()))?;
        spec.validate_params(action.params())
    }

    /// Human-readable action list for the system prompt.
    pub fn prompt_description(&self, page_url: Option<&str>) -> String {
        self.specs
            .iter()
            .filter(|spec| spec.available_on(page_url))
            .map(|spec| {
                let params = spec
                    .properties()
                    .map(|props| Value::Object(props.clone()))
                    .unwrap_or_else(|| json!({}));
                format!("{}: {}\n{{{}: {}}}", spec.name, spec.description, spec.name, params)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Descriptions of the domain-restricted actions offered on `page_url`.
    pub fn page_actions_description(&self, page_url: &str) -> Option<String> {
        let restricted = ActionCatalog {
            specs: self
                .specs
                .iter()
                .filter(|spec| spec.domains.is_some() && spec.available_on(Some(page_url)))
                .cloned()
                .collect(),
        };
        (!restricted.specs.is_empty()).then(|| restricted.prompt_description(Some(page_url)))
    }

    pub fn decision_schema(&self, options: &SchemaOptions) -> DecisionSchema {
        let actions: Vec<ActionSpec> = self
            .specs
            .iter()
            .filter(|spec| !options.terminal_only || spec.terminal)
            .filter(|spec| spec.available_on(options.page_url.as_deref()))
            .cloned()
            .collect();
        DecisionSchema::new(actions, options.clone())
    }
}

/// Per-step output schema handed to the oracle.
#[derive(Debug, Clone)]
pub struct DecisionSchema {
    actions: Vec<ActionSpec>,
    options: SchemaOptions,
    json_schema: Value,
}

const TEXT_FIELDS: [&str; 4] = ["thinking", "evaluation_previous_goal", "memory", "next_goal"];

impl DecisionSchema {
    fn new(actions: Vec<ActionSpec>, options: SchemaOptions) -> Self {
        let json_schema = render_schema(&actions, &options);
        Self {
            actions,
            options,
            json_schema,
        }
    }

    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn is_terminal_only(&self) -> bool {
        self.options.terminal_only
    }

    pub fn allowed_actions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|spec| spec.name.as_str())
    }

    pub fn validate_action(&self, action: &Action) -> Result<(), CoreError> {
        let spec = self
            .actions
            .iter()
            .find(|spec| spec.name == action.name())
            .ok_or_else(|| CoreError::UnknownAction(action.name().to_string()))?;
        spec.validate_params(action.params())
    }

    /// Validate a raw completion and turn it into a decision.
    ///
    /// Empty actions are accepted here; deciding what to do about them is
    /// the caller's business.
    pub fn parse(&self, completion: Value) -> Result<DecisionOutput, CoreError> {
        let Value::Object(mut fields) = completion else {
            return Err(CoreError::invalid_decision("expected a JSON object"));
        };

        if let Some(key) = fields
            .keys()
            .find(|key| key.as_str() != "action" && !TEXT_FIELDS.contains(&key.as_str()))
        {
            return Err(CoreError::invalid_decision(format!("unexpected field '{key}'")));
        }

        let mut text = |key: &str| -> Result<Option<String>, CoreError> {
            match fields.remove(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s)),
                Some(_) => Err(CoreError::invalid_decision(format!("field '{key}' must be a string"))),
            }
        };
        let thinking = text("thinking")?;
        let evaluation_previous_goal = text("evaluation_previous_goal")?;
        let memory = text("memory")?;
        let next_goal = text("next_goal")?;

        let raw_actions = match fields.remove("action") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(CoreError::invalid_decision("field 'action' must be a list")),
            None => return Err(CoreError::invalid_decision("missing field 'action'")),
        };

        let mut actions = Vec::with_capacity(raw_actions.len());
        for raw in raw_actions {
            let action: Action = serde_json::from_value(raw)
                .map_err(|err| CoreError::MalformedAction(err.to_string()))?;
            if !action.is_empty() {
                self.validate_action(&action)?;
            }
            actions.push(action);
        }

        Ok(DecisionOutput {
            thinking,
            evaluation_previous_goal,
            memory,
            next_goal,
            actions,
        })
    }
}

fn render_schema(actions: &[ActionSpec], options: &SchemaOptions) -> Value {
    let mut definitions = Map::new();
    let variants: Vec<Value> = actions
        .iter()
        .map(|spec| {
            let (params, defs) = split_definitions(spec.param_schema.clone());
            definitions.extend(defs);
            json!({
                "type": "object",
                "description": spec.description,
                "properties": { spec.name.clone(): params },
                "required": [spec.name],
                "additionalProperties": false,
            })
        })
        .collect();

    let action_list = json!({
        "type": "array",
        "items": { "anyOf": variants },
        "minItems": 1,
    });

    let mut properties = Map::new();
    let required: Vec<&str> = if options.flash_mode {
        properties.insert("memory".into(), json!({"type": "string"}));
        vec!["memory", "action"]
    } else {
        if options.use_thinking {
            properties.insert("thinking".into(), json!({"type": "string"}));
        }
        for key in ["evaluation_previous_goal", "memory", "next_goal"] {
            properties.insert(key.into(), json!({"type": "string"}));
        }
        vec!["evaluation_previous_goal", "memory", "next_goal", "action"]
    };
    properties.insert("action".into(), action_list);

    let mut root = json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    });
    if !definitions.is_empty() {
        root["definitions"] = Value::Object(definitions);
    }
    root
}

/// Detach the `definitions` block so nested schemas can be embedded while
/// their `#/definitions/...` references resolve against the root.
fn split_definitions(mut schema: Value) -> (Value, Map<String, Value>) {
    let definitions = match &mut schema {
        Value::Object(map) => match map.remove("definitions") {
            Some(Value::Object(defs)) => defs,
            _ => Map::new(),
        },
        _ => Map::new(),
    };
    (schema, definitions)
}

fn structured_done_schema(data: &Value) -> Value {
    let (data, definitions) = split_definitions(data.clone());
    let mut schema = json!({
        "type": "object",
        "properties": {
            "success": { "type": "boolean" },
            "data": data,
        },
        "required": ["success", "data"],
    });
    if !definitions.is_empty() {
        schema["definitions"] = Value::Object(definitions);
    }
    schema
}

/// JSON schema of `P` as handed to the oracle.
pub fn schema_of<P: JsonSchema>() -> Value {
    let root = schemars::schema_for!(P);
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| json!({"type": "object"}));
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
    }
    value
}

/// Parameter objects with declared properties reject unknown keys unless
/// the schema says otherwise.
fn closed_object(schema: &Value) -> Value {
    let mut schema = schema.clone();
    if let Value::Object(map) = &mut schema {
        if map.contains_key("properties") && !map.contains_key("additionalProperties") {
            map.insert("additionalProperties".into(), Value::Bool(false));
        }
    }
    schema
}

/// `host` comes from [`Url::host_str`] and is already lowercase.
fn domain_matches(pattern: &str, host: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let pattern = pattern
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(pattern)
        .to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || host
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => host == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct ClickParams {
        index: u32,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct NavigateParams {
        url: String,
        new_tab: Option<bool>,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    enum Direction {
        Up,
        Down,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct ScrollParams {
        direction: Direction,
    }

    fn catalog() -> ActionCatalog {
        let mut catalog = ActionCatalog::new();
        catalog
            .register_typed::<ClickParams>("click", "Click an element")
            .unwrap();
        catalog
            .register_typed::<NavigateParams>("navigate", "Open a URL")
            .unwrap();
        catalog
            .register_typed::<ScrollParams>("scroll", "Scroll the page")
            .unwrap();
        catalog
            .register(
                ActionSpec::new("export_sheet", "Export the sheet", json!({"type": "object"}))
                    .with_domains(["*.sheets.example.com"]),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn page_actions_only_list_restricted_specs() {
        let catalog = catalog();
        let text = catalog
            .page_actions_description("https://docs.sheets.example.com/d/1")
            .unwrap();
        assert!(text.starts_with("export_sheet: Export the sheet"));
        assert!(!text.contains("navigate"));
        assert!(catalog.page_actions_description("https://example.org").is_none());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut catalog = catalog();
        let err = catalog.register_typed::<ClickParams>("click", "again").unwrap_err();
        assert_eq!(err, CoreError::DuplicateAction("click".into()));
    }

    #[test]
    fn validates_required_and_types() {
        let catalog = catalog();
        assert!(catalog
            .validate(&Action::from_value("click", json!({"index": 1})).unwrap())
            .is_ok());
        assert!(catalog
            .validate(&Action::from_value("click", json!({})).unwrap())
            .is_err());
        assert!(catalog
            .validate(&Action::from_value("click", json!({"index": "one"})).unwrap())
            .is_err());
        assert!(catalog
            .validate(&Action::from_value("navigate", json!({"url": "https://a.com", "new_tab": null})).unwrap())
            .is_ok());
        assert!(matches!(
            catalog.validate(&Action::from_value("hover", json!({})).unwrap()),
            Err(CoreError::UnknownAction(_))
        ));
    }

    #[test]
    fn domain_filter_limits_actions() {
        let catalog = catalog();
        let off_site = catalog.decision_schema(&SchemaOptions::for_page("https://example.org/x"));
        assert!(!off_site.allowed_actions().any(|name| name == "export_sheet"));

        let on_site =
            catalog.decision_schema(&SchemaOptions::for_page("https://docs.sheets.example.com/d/1"));
        assert!(on_site.allowed_actions().any(|name| name == "export_sheet"));
    }

    #[test]
    fn terminal_only_schema_rejects_other_actions() {
        let schema = catalog().decision_schema(&SchemaOptions::default().terminal_only());
        assert_eq!(schema.allowed_actions().collect::<Vec<_>>(), vec!["done"]);

        let err = schema
            .parse(json!({"action": [{"click": {"index": 1}}]}))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAction(_)));

        let ok = schema
            .parse(json!({"memory": "m", "action": [{"done": {"success": true, "text": "ok"}}]}))
            .unwrap();
        assert!(ok.actions[0].is_done());
    }

    #[test]
    fn parse_keeps_empty_actions_and_rejects_unknown_fields() {
        let schema = catalog().decision_schema(&SchemaOptions::for_page("https://a.com"));
        let output = schema.parse(json!({"next_goal": "g", "action": [{}]})).unwrap();
        assert!(output.actions[0].is_empty());

        assert!(schema.parse(json!({"action": [], "mood": "happy"})).is_err());
        assert!(schema.parse(json!({"memory": "no actions"})).is_err());
        assert!(schema.parse(json!("not an object")).is_err());
    }

    #[test]
    fn flash_mode_schema_drops_reasoning_fields() {
        let options = SchemaOptions {
            flash_mode: true,
            ..Default::default()
        };
        let schema = catalog().decision_schema(&options);
        let props = schema.json_schema()["properties"].as_object().unwrap();
        assert!(props.contains_key("memory"));
        assert!(!props.contains_key("next_goal"));
        assert!(!props.contains_key("thinking"));
        assert_eq!(schema.json_schema()["required"], json!(["memory", "action"]));
    }

    #[test]
    fn thinking_field_follows_option() {
        let mut options = SchemaOptions::for_page("https://a.com");
        let with = catalog().decision_schema(&options);
        assert!(with.json_schema()["properties"].get("thinking").is_some());
        options.use_thinking = false;
        let without = catalog().decision_schema(&options);
        assert!(without.json_schema()["properties"].get("thinking").is_none());
    }

    #[test]
    fn prompt_description_lists_available_actions() {
        let text = catalog().prompt_description(Some("https://example.org"));
        assert!(text.contains("click: Click an element"));
        assert!(text.contains("done:"));
        assert!(!text.contains("export_sheet"));
    }

    #[test]
    fn schema_constraints_are_enforced() {
        let catalog = catalog();
        let negative = catalog
            .validate(&Action::from_value("click", json!({"index": -1})).unwrap())
            .unwrap_err();
        assert!(matches!(negative, CoreError::InvalidParams { .. }));

        assert!(catalog
            .validate(&Action::from_value("scroll", json!({"direction": "Down"})).unwrap())
            .is_ok());
        let sideways = catalog
            .validate(&Action::from_value("scroll", json!({"direction": "sideways"})).unwrap())
            .unwrap_err();
        assert!(matches!(sideways, CoreError::InvalidParams { ref action, .. } if action == "scroll"));

        assert!(catalog
            .validate(&Action::from_value("click", json!({"index": 1, "force": true})).unwrap())
            .is_err());
    }

    #[test]
    fn decision_with_negative_index_is_rejected() {
        let schema = catalog().decision_schema(&SchemaOptions::for_page("https://a.com"));
        let err = schema
            .parse(json!({"action": [{"click": {"index": -1}}]}))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidParams { .. }));
    }

    #[test]
    fn uncompilable_schema_is_refused_at_registration() {
        let mut catalog = ActionCatalog::new();
        let err = catalog
            .register(ActionSpec::new("broken", "Bad schema", json!({"type": 12})))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSchema { .. }));
    }

    #[test]
    fn domain_patterns_ignore_host_case() {
        let spec = ActionSpec::new("export_sheet", "Export", json!({"type": "object"}))
            .with_domains(["*.sheets.example.com"]);
        assert!(spec.available_on(Some("https://docs.sheets.example.com/d")));
        assert!(spec.available_on(Some("https://Docs.Sheets.Example.com/d")));
        assert!(spec.available_on(Some("https://user@sheets.example.com:8443/x?y#z")));
        assert!(!spec.available_on(Some("https://evilsheets.example.com/")));
        assert!(!spec.available_on(Some("about:blank")));
        assert!(!spec.available_on(None));

        let upper = ActionSpec::new("a", "A", json!({"type": "object"})).with_domains(["Example.COM"]);
        assert!(upper.available_on(Some("https://example.com")));
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Report {
        direction: Direction,
        pages: u32,
    }

    #[test]
    fn output_schema_replaces_done() {
        let mut catalog = catalog();
        catalog.bind_output_type::<Report>().unwrap();
        assert_eq!(catalog.names().iter().filter(|n| **n == "done").count(), 1);

        let schema = catalog.decision_schema(&SchemaOptions::default().terminal_only());
        assert!(schema.json_schema()["definitions"].get("Direction").is_some());

        let ok = schema
            .parse(json!({"action": [{"done": {"success": true, "data": {"direction": "Up", "pages": 3}}}]}))
            .unwrap();
        assert_eq!(ok.actions[0].done_text().as_deref(), Some(r#"{"direction":"Up","pages":3}"#));

        let plain = schema.parse(json!({"action": [{"done": {"success": true, "text": "3 pages"}}]}));
        assert!(plain.is_err());
        let wrong = schema.parse(
            json!({"action": [{"done": {"success": true, "data": {"direction": "Left", "pages": 3}}}]}),
        );
        assert!(matches!(wrong, Err(CoreError::InvalidParams { .. })));
    }

    #[test]
    fn ipv6_hosts_are_matched_whole() {
        let spec = ActionSpec::new("local", "Local only", json!({"type": "object"}))
            .with_domains(["[::1]"]);
        assert!(spec.available_on(Some("http://[::1]:8080/admin")));
        assert!(!spec.available_on(Some("http://127.0.0.1:8080/admin")));
    }
}
