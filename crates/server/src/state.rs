use std::sync::Arc;

use stillreel_core::orchestrator::StatusCallback;
use stillreel_core::registry::JobListener;
use stillreel_core::{
    BatchOrchestrator, BatchStatus, Config, ConversionParams, EngineAdapter, EngineFactory,
    ImageIntake, JobEvent, ResultAccess, SanitizedConfig, Session,
};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    session: Arc<Session>,
    engine: Arc<EngineAdapter>,
    orchestrator: Arc<BatchOrchestrator>,
    intake: ImageIntake,
    results: ResultAccess,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    /// Builds one session around the given engine factory and forwards its
    /// job events and batch status to the WebSocket broadcaster.
    pub fn new(
        config: Config,
        engine_factory: Arc<dyn EngineFactory>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        let duration_secs = config.batch.initial_duration_secs();
        let session = Arc::new(Session::new(duration_secs));

        let broadcaster_for_jobs = ws_broadcaster.clone();
        let job_listener: JobListener = Arc::new(move |event: &JobEvent| {
            broadcaster_for_jobs.job_event(event);
        });
        session.registry().subscribe(job_listener);

        let engine = Arc::new(EngineAdapter::new(
            engine_factory,
            ConversionParams::from_config(&config.engine, duration_secs),
        ));

        let broadcaster_for_batch = ws_broadcaster.clone();
        let status_callback: StatusCallback = Arc::new(move |status: &BatchStatus| {
            broadcaster_for_batch.batch_status(status);
        });
        let orchestrator = Arc::new(
            BatchOrchestrator::new(Arc::clone(&session), Arc::clone(&engine))
                .with_status_callback(status_callback),
        );

        Self {
            intake: ImageIntake::new(Arc::clone(&session), config.intake.clone()),
            results: ResultAccess::new(Arc::clone(&session)),
            config,
            session,
            engine,
            orchestrator,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Engine shared by batch runs and the single-shot endpoint.
    pub fn engine(&self) -> &Arc<EngineAdapter> {
        &self.engine
    }

    pub fn orchestrator(&self) -> &Arc<BatchOrchestrator> {
        &self.orchestrator
    }

    pub fn intake(&self) -> &ImageIntake {
        &self.intake
    }

    pub fn results(&self) -> &ResultAccess {
        &self.results
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
