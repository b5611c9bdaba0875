//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind configuration and create the process-wide telemetry publisher
//! - Build the authorization policy, select the filter, register
//!   authentication and documentation
//! - Attach the pipeline layers in their fixed order
//!
//! # Design Decisions
//! - Fail fast: a fault while configuring services is published once, then
//!   returned; a partially configured pipeline never reaches `Running`
//! - Steps run in order on the calling task, never concurrently, never retried
//! - Every phase change goes through `transition`, which rejects illegal moves

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::schema::{
    DOCUMENTATION_SECTION, HOST_SECTION, SERVICE_SECTION, TELEMETRY_SECTION,
};
use crate::config::validation::{validate_host, validate_service_options};
use crate::config::{
    ConfigError, ConfigurationSource, DocumentationConfig, HostConfig,
    ServiceConfigurationOptions, TelemetrySettings,
};
use crate::docs::{
    default_artifact_path, DocumentationActivationState, DocumentationError,
    DocumentationGenerator, DocumentationRegistrar,
};
use crate::http::{probe_router, server_error_events, PanicTranslator};
use crate::observability::{metrics, TelemetryEvent, TelemetryPublisher, TelemetrySink, TracingSink};
use crate::security::authentication::{authentication_middleware, AuthSetupError};
use crate::security::gate::authorization_middleware;
use crate::security::{
    AuthenticationOptions, EnvironmentGate, Filter, RuntimeEnvironmentContext,
    ScopePolicyBuilder, TokenValidator,
};

/// Phases of the startup state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Created,
    ConfiguringServices,
    ConfiguringPipeline,
    Running,
    FailedStartup,
}

impl StartupPhase {
    pub fn can_transition_to(self, next: StartupPhase) -> bool {
        use StartupPhase::*;
        matches!(
            (self, next),
            (Created, ConfiguringServices)
                | (ConfiguringServices, ConfiguringPipeline)
                | (ConfiguringServices, FailedStartup)
                | (ConfiguringPipeline, Running)
                | (ConfiguringPipeline, FailedStartup)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StartupPhase::Running | StartupPhase::FailedStartup)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StartupPhase::Created => "Created",
            StartupPhase::ConfiguringServices => "ConfiguringServices",
            StartupPhase::ConfiguringPipeline => "ConfiguringPipeline",
            StartupPhase::Running => "Running",
            StartupPhase::FailedStartup => "FailedStartup",
        }
    }
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a startup fault stops the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Degradable,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Degradable => "degradable",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("authentication setup failed: {0}")]
    Authentication(#[from] AuthSetupError),

    #[error("documentation setup failed: {0}")]
    Documentation(#[from] DocumentationError),

    #[error("invalid startup transition from {from} to {to}")]
    InvalidTransition { from: StartupPhase, to: StartupPhase },
}

impl StartupError {
    /// Only a missing documentation artifact is degradable.
    pub fn severity(&self) -> Severity {
        match self {
            StartupError::Documentation(DocumentationError::MissingArtifact { .. }) => {
                Severity::Degradable
            }
            _ => Severity::Fatal,
        }
    }

    /// Short machine-readable kind, used as a telemetry property.
    pub fn kind(&self) -> &'static str {
        match self {
            StartupError::Config(e) => e.kind(),
            StartupError::Authentication(AuthSetupError::InvalidAuthority { .. }) => {
                "invalid_authority"
            }
            StartupError::Authentication(AuthSetupError::InsecureAuthority { .. }) => {
                "insecure_authority"
            }
            StartupError::Documentation(DocumentationError::MissingArtifact { .. }) => {
                "documentation_missing"
            }
            StartupError::Documentation(DocumentationError::Read { .. }) => "documentation_read",
            StartupError::Documentation(DocumentationError::Parse { .. }) => "documentation_parse",
            StartupError::Documentation(DocumentationError::UnsupportedMethod { .. }) => {
                "documentation_method"
            }
            StartupError::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

/// Startup ended in `FailedStartup`.
#[derive(Debug, thiserror::Error)]
#[error("startup failed during {failed_during}: {error}")]
pub struct StartupFailure {
    #[source]
    pub error: StartupError,
    pub failed_during: StartupPhase,
    /// Every phase entered, ending with `FailedStartup`.
    pub phases: Vec<StartupPhase>,
    /// Id of the published exception event, if a publisher existed.
    pub event_id: Option<Uuid>,
}

/// Diagnostics describing how startup went.
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub phase: StartupPhase,
    pub phases: Vec<StartupPhase>,
    pub documentation: DocumentationActivationState,
    pub filter: &'static str,
    pub required_scopes: usize,
    pub is_in_fabric: bool,
}

/// Result of a successful startup, ready to be served.
#[derive(Debug)]
pub struct AssembledPipeline {
    pub router: Router,
    pub telemetry: TelemetryPublisher,
    pub host: HostConfig,
    pub report: StartupReport,
}

/// Everything built while configuring services.
struct ConfiguredServices {
    host: HostConfig,
    environment: RuntimeEnvironmentContext,
    filter: Arc<Filter>,
    validator: TokenValidator,
    documentation: DocumentationActivationState,
    generator: Option<DocumentationGenerator>,
    required_scopes: usize,
}

enum Fault {
    /// Raised before any publisher could be built.
    Unpublished(StartupError),
    Published(StartupError, Uuid),
}

/// Orders configuration, telemetry, security and documentation into the
/// request pipeline.
pub struct PipelineAssembler {
    config: Option<ConfigurationSource>,
    load_error: Option<ConfigError>,
    environment: RuntimeEnvironmentContext,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    routes: Option<Router>,
    phase: StartupPhase,
    phases: Vec<StartupPhase>,
}

impl PipelineAssembler {
    pub fn new(config: ConfigurationSource, environment: RuntimeEnvironmentContext) -> Self {
        Self::from_load_result(Ok(config), environment)
    }

    /// Start from the outcome of [`ConfigurationSource::load`].
    ///
    /// A load error is not raised here: it surfaces as the first fault of
    /// `ConfiguringServices`, so it is published and ends in `FailedStartup`
    /// like any other configuration fault.
    pub fn from_load_result(
        loaded: Result<ConfigurationSource, ConfigError>,
        environment: RuntimeEnvironmentContext,
    ) -> Self {
        let (config, load_error) = match loaded {
            Ok(config) => (Some(config), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            config,
            load_error,
            environment,
            sinks: vec![Arc::new(TracingSink)],
            routes: None,
            phase: StartupPhase::Created,
            phases: vec![StartupPhase::Created],
        }
    }

    /// Replace the telemetry sinks used by the publisher.
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// Request routes placed behind the authorization filter.
    ///
    /// The router must contain at least one route.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    fn transition(&mut self, next: StartupPhase) -> Result<(), StartupError> {
        if !self.phase.can_transition_to(next) {
            return Err(StartupError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "Startup phase transition");
        self.phase = next;
        self.phases.push(next);
        Ok(())
    }

    /// Run the startup sequence to `Running` or `FailedStartup`.
    pub fn assemble(mut self) -> Result<AssembledPipeline, StartupFailure> {
        match self.run() {
            Ok(pipeline) => Ok(pipeline),
            Err(fault) => Err(self.fail(fault)),
        }
    }

    fn run(&mut self) -> Result<AssembledPipeline, Fault> {
        self.transition(StartupPhase::ConfiguringServices)
            .map_err(Fault::Unpublished)?;

        let telemetry = match self.start_telemetry() {
            Ok(telemetry) => telemetry,
            Err(error) => {
                // The configured publisher could not be built; report through
                // the same sinks with default settings.
                let fallback =
                    TelemetryPublisher::with_sinks(TelemetrySettings::default(), self.sinks.clone());
                let id = publish_fatal(&fallback, &error, self.phase);
                return Err(Fault::Published(error, id));
            }
        };

        let services = match self.configure_services(&telemetry) {
            Ok(services) => services,
            Err(error) => {
                let id = publish_fatal(&telemetry, &error, self.phase);
                return Err(Fault::Published(error, id));
            }
        };

        if let Err(error) = self.transition(StartupPhase::ConfiguringPipeline) {
            let id = publish_fatal(&telemetry, &error, self.phase);
            return Err(Fault::Published(error, id));
        }

        let router = self.configure_pipeline(&services, &telemetry);

        if let Err(error) = self.transition(StartupPhase::Running) {
            let id = publish_fatal(&telemetry, &error, self.phase);
            return Err(Fault::Published(error, id));
        }

        let report = StartupReport {
            phase: self.phase,
            phases: self.phases.clone(),
            documentation: services.documentation,
            filter: services.filter.name(),
            required_scopes: services.required_scopes,
            is_in_fabric: services.environment.is_in_fabric(),
        };

        let environment_name = self
            .config
            .as_ref()
            .map(|c| c.environment().to_string())
            .unwrap_or_default();
        telemetry.publish(
            TelemetryEvent::lifecycle("StartupCompleted", "service pipeline is running")
                .with_property("environment", environment_name.as_str())
                .with_property("filter", report.filter)
                .with_property("documentation", report.documentation.as_str()),
        );
        tracing::info!(
            environment = %environment_name,
            filter = report.filter,
            required_scopes = report.required_scopes,
            documentation = report.documentation.as_str(),
            "Startup complete"
        );

        Ok(AssembledPipeline {
            router,
            telemetry,
            host: services.host,
            report,
        })
    }

    fn fail(&mut self, fault: Fault) -> StartupFailure {
        let failed_during = self.phase;
        let (error, event_id) = match fault {
            Fault::Unpublished(error) => (error, None),
            Fault::Published(error, id) => (error, Some(id)),
        };

        if self.phase.can_transition_to(StartupPhase::FailedStartup) {
            self.phase = StartupPhase::FailedStartup;
            self.phases.push(StartupPhase::FailedStartup);
        }
        metrics::record_startup_fault(error.severity().as_str());
        tracing::error!(
            phase = %failed_during,
            kind = error.kind(),
            error = %error,
            "Startup failed"
        );

        StartupFailure {
            error,
            failed_during,
            phases: self.phases.clone(),
            event_id,
        }
    }

    fn configuration(&self) -> Result<&ConfigurationSource, ConfigError> {
        self.config
            .as_ref()
            .ok_or(ConfigError::MissingSection(SERVICE_SECTION))
    }

    /// Surface any load error, bind `Telemetry` and create the process-wide
    /// publisher.
    fn start_telemetry(&mut self) -> Result<TelemetryPublisher, StartupError> {
        if let Some(error) = self.load_error.take() {
            return Err(error.into());
        }
        let settings: TelemetrySettings = self.configuration()?.section_or_default(TELEMETRY_SECTION)?;
        let telemetry = TelemetryPublisher::with_sinks(settings, self.sinks.clone());
        tracing::debug!(local_only = telemetry.is_local_only(), "Telemetry publisher created");
        Ok(telemetry)
    }

    fn configure_services(
        &self,
        telemetry: &TelemetryPublisher,
    ) -> Result<ConfiguredServices, StartupError> {
        let config = self.configuration()?;
        let options: ServiceConfigurationOptions = config.section(SERVICE_SECTION)?;
        validate_service_options(&options).map_err(ConfigError::Validation)?;

        let host: HostConfig = config.section_or_default(HOST_SECTION)?;
        validate_host(&host).map_err(ConfigError::Validation)?;

        let documentation: DocumentationConfig = config.section_or_default(DOCUMENTATION_SECTION)?;

        let policy = ScopePolicyBuilder::build(options.required_scopes.iter().cloned());
        let required_scopes = policy.required_scopes().len();

        let environment = self.environment;
        let filter = EnvironmentGate::select(environment.is_in_fabric(), policy);
        tracing::info!(
            filter = filter.name(),
            enforced = filter.is_enforced(),
            source = ?environment.source(),
            "Authorization filter selected"
        );

        let validator = TokenValidator::new(&AuthenticationOptions::from(&options))?;
        tracing::info!(
            authority = %validator.authority(),
            api_name = %options.api_name,
            "Bearer authentication registered"
        );

        let mut registrar = DocumentationRegistrar::new(telemetry.clone());
        let state = if documentation.enabled {
            registrar.register(&artifact_path_for(&documentation))?
        } else {
            tracing::info!("API documentation disabled by configuration");
            DocumentationActivationState::NotAttempted
        };

        Ok(ConfiguredServices {
            host,
            environment,
            filter: Arc::new(filter),
            validator,
            documentation: state,
            generator: registrar.into_generator(),
            required_scopes,
        })
    }

    /// Attach the pipeline layers. Listed innermost first; the exception
    /// translator ends up wrapping everything.
    fn configure_pipeline(
        &mut self,
        services: &ConfiguredServices,
        telemetry: &TelemetryPublisher,
    ) -> Router {
        let mut app = probe_router();
        if let Some(routes) = self.routes.take() {
            let gated = routes.route_layer(from_fn_with_state(
                services.filter.clone(),
                authorization_middleware,
            ));
            app = app.merge(gated);
        }
        let mut app = app.layer(from_fn_with_state(
            services.validator.clone(),
            authentication_middleware,
        ));

        if let Some(generator) = &services.generator {
            app = generator.router().merge(app);
        }

        app.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(services.host.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(from_fn_with_state(telemetry.clone(), server_error_events))
        .layer(CatchPanicLayer::custom(PanicTranslator::new(telemetry.clone())))
    }
}

fn publish_fatal(telemetry: &TelemetryPublisher, error: &StartupError, phase: StartupPhase) -> Uuid {
    let event = TelemetryEvent::exception(error)
        .with_property("severity", error.severity().as_str())
        .with_property("error_kind", error.kind())
        .with_property("phase", phase.as_str());
    let id = event.id;
    telemetry.publish(event);
    telemetry.flush();
    id
}

/// Configured artifact location, or the file next to the executable.
pub fn artifact_path_for(config: &DocumentationConfig) -> PathBuf {
    config
        .artifact_path
        .clone()
        .unwrap_or_else(default_artifact_path)
}
