//! Connector definitions: connection authorization, base URI and named actions.

use crate::auth::{Authorization, Settings};
use crate::engine::Step;
use crate::errors::EngineError;
use crate::http::request::RequestBuilder;
use crate::schema::Primitive;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use url::Url;

pub type ExecuteFn = Arc<dyn Fn(&ActionContext<'_>) -> Result<Step, EngineError> + Send + Sync>;
pub type BaseUriFn = Arc<dyn Fn(&Settings) -> String + Send + Sync>;

pub struct ActionContext<'a> {
    connection: &'a Settings,
    input: &'a Value,
    base: Option<&'a Url>,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(connection: &'a Settings, input: &'a Value, base: Option<&'a Url>) -> Self {
        Self {
            connection,
            input,
            base,
        }
    }

    pub fn connection(&self) -> &Settings {
        self.connection
    }

    pub fn input(&self) -> &Value {
        self.input
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.connection.get(key)
    }

    pub fn base_uri(&self) -> Option<&Url> {
        self.base
    }

    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url).default_base(self.base)
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::user(message)
    }
}

#[derive(Clone)]
pub struct Action {
    name: String,
    title: Option<String>,
    execute: ExecuteFn,
    output_fields: Vec<(String, Primitive)>,
}

impl Action {
    pub fn new<F>(name: impl Into<String>, execute: F) -> Self
    where
        F: Fn(&ActionContext<'_>) -> Result<Step, EngineError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            title: None,
            execute: Arc::new(execute),
            output_fields: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn output_field(mut self, name: impl Into<String>, primitive: Primitive) -> Self {
        self.output_fields.push((name.into(), primitive));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn output_fields(&self) -> &[(String, Primitive)] {
        &self.output_fields
    }

    pub(crate) fn execute(&self, ctx: &ActionContext<'_>) -> Result<Step, EngineError> {
        (self.execute)(ctx)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// A connector and the source file it was defined in.
///
/// The source file bounds which frames survive in reported failure traces, so
/// construct the connector in the same file as its actions and continuations.
#[derive(Clone)]
pub struct Connector {
    title: String,
    source_file: &'static str,
    authorization: Authorization,
    base_uri: Option<BaseUriFn>,
    actions: BTreeMap<String, Action>,
}

impl Connector {
    #[track_caller]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_file: Location::caller().file(),
            authorization: Authorization::None,
            base_uri: None,
            actions: BTreeMap::new(),
        }
    }

    pub fn authorization(mut self, authorization: impl Into<Authorization>) -> Self {
        self.authorization = authorization.into();
        self
    }

    pub fn base_uri<F>(mut self, base_uri: F) -> Self
    where
        F: Fn(&Settings) -> String + Send + Sync + 'static,
    {
        self.base_uri = Some(Arc::new(base_uri));
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_file(&self) -> &'static str {
        self.source_file
    }

    pub fn get_authorization(&self) -> &Authorization {
        &self.authorization
    }

    pub fn get_action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn resolve_base_uri(&self, settings: &Settings) -> Result<Option<Url>, EngineError> {
        let Some(base_uri) = &self.base_uri else {
            return Ok(None);
        };
        let mut raw = base_uri(settings);
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
            .map(Some)
            .map_err(|_| EngineError::invalid_request(format!("Invalid base_uri: {}", raw)))
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("title", &self.title)
            .field("source_file", &self.source_file)
            .field("authorization", &self.authorization)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_file_is_where_the_connector_is_defined() {
        let connector = Connector::new("Demo");
        assert_eq!(connector.source_file(), file!());
    }

    #[test]
    fn base_uri_gets_a_trailing_slash() {
        let connector = Connector::new("Demo")
            .base_uri(|settings| {
                format!(
                    "https://{}.example.com/api",
                    settings.get("subdomain").and_then(|v| v.as_str()).unwrap_or("www")
                )
            });
        let settings = json!({"subdomain": "acme"}).as_object().cloned().unwrap_or_default();
        let base = connector.resolve_base_uri(&settings).expect("base").expect("some base");
        assert_eq!(base.join("users").expect("join").as_str(), "https://acme.example.com/api/users");
    }

    #[test]
    fn context_helpers_resolve_against_base() {
        let settings = Settings::new();
        let input = json!({});
        let base = Url::parse("https://api.example.com/v1/").expect("url");
        let ctx = ActionContext::new(&settings, &input, Some(&base));
        let request = ctx.get("items/1").build().expect("request");
        assert_eq!(request.url().as_str(), "https://api.example.com/v1/items/1");
        assert!(ctx.error("nope").is_user());
    }
}
