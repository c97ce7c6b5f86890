use super::{Engine, ErrorReporter, Step};
use crate::auth::{AuthContext, Settings, TokenPersistence};
use crate::connector::{ActionContext, Connector};
use crate::constants::limits::MAX_SUGGESTIONS;
use crate::errors::EngineError;
use crate::http::transport::{ReqwestTransport, Transport};
use crate::schema::coerce_fields;
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug)]
pub struct Runner {
    connector: Arc<Connector>,
    engine: Engine,
    auth: AuthContext,
    reporter: ErrorReporter,
    logger: Logger,
}

impl Runner {
    pub fn new(connector: Connector, settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let logger = Logger::new("connector");
        Self::assemble(connector, settings, transport, logger)
    }

    pub fn from_env(connector: Connector, settings: Settings) -> Result<Self, EngineError> {
        let transport = Arc::new(ReqwestTransport::from_env()?);
        Ok(Self::new(connector, settings, transport))
    }

    fn assemble(
        connector: Connector,
        settings: Settings,
        transport: Arc<dyn Transport>,
        logger: Logger,
    ) -> Self {
        let logger = logger.child(connector.title());
        let engine = Engine::new(transport, connector.get_authorization().clone())
            .with_logger(logger.child("engine"));
        let reporter = ErrorReporter::new(connector.source_file(), logger.child("report"));
        Self {
            connector: Arc::new(connector),
            engine,
            auth: AuthContext::new(settings),
            reporter,
            logger,
        }
    }

    pub fn with_logger(self, logger: Logger) -> Self {
        let Self {
            connector,
            engine,
            auth,
            ..
        } = self;
        let logger = logger.child(connector.title());
        Self {
            engine: engine.with_logger(logger.child("engine")),
            reporter: ErrorReporter::new(connector.source_file(), logger.child("report")),
            connector,
            auth,
            logger,
        }
    }

    /// Called synchronously with the full settings whenever tokens are refreshed.
    pub fn with_persistence(self, persistence: Arc<dyn TokenPersistence>) -> Self {
        Self {
            auth: self.auth.with_persistence(persistence),
            ..self
        }
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn settings(&self) -> &Settings {
        self.auth.settings()
    }

    pub async fn invoke(&mut self, action: &str, input: Value) -> Result<Value, EngineError> {
        match self.run(action, input).await {
            Ok(value) => {
                self.logger.debug("action finished", Some(&json!({ "action": action })));
                Ok(value)
            }
            Err(err) => Err(self.reporter.report(action, err)),
        }
    }

    async fn run(&mut self, name: &str, input: Value) -> Result<Value, EngineError> {
        let connector = Arc::clone(&self.connector);
        let Some(action) = connector.get_action(name) else {
            return Err(unknown_action(&connector, name));
        };
        self.logger.info(
            "invoking action",
            Some(&json!({ "action": name, "title": action.display_title() })),
        );
        let base = connector.resolve_base_uri(self.auth.settings())?;

        let step = {
            let ctx = ActionContext::new(self.auth.settings(), &input, base.as_ref());
            action.execute(&ctx)?
        };
        let output = match step {
            Step::Done(value) => value,
            Step::Request(builder) => {
                let request = builder.default_base(base.as_ref()).build()?;
                self.engine
                    .run_chain(&mut self.auth, request, base.as_ref())
                    .await?
            }
        };
        coerce_fields(output, action.output_fields())
    }
}

fn unknown_action(connector: &Connector, name: &str) -> EngineError {
    let available: Vec<&str> = connector.action_names().collect();
    let suggestions = suggest(name, available.iter().copied(), MAX_SUGGESTIONS);
    let mut err = EngineError::not_found(format!("Unknown action: {}", name)).with_details(json!({
        "action": name,
        "available": available,
        "did_you_mean": suggestions,
    }));
    if let Some(best) = suggestions.first() {
        err = err.with_hint(format!("Did you mean '{}'?", best));
    }
    err
}
