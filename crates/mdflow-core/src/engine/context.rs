use super::error::EngineError;
use super::progress::ProgressReporter;
use super::session::{DynamicsEngine, EngineRegistry};

/// The live dynamics session installed by `dynamics.init`, together with
/// the per-particle types the engine does not track itself.
pub struct ActiveSession {
    pub session: Box<dyn DynamicsEngine>,
    pub types: Vec<u32>,
}

/// Per-run context threaded explicitly through every plugin entry
/// invocation. There is no ambient global state: anything a stage needs
/// beyond its argument bundle lives here.
pub struct RunContext<'a> {
    reporter: &'a ProgressReporter<'a>,
    engines: EngineRegistry,
    session: Option<ActiveSession>,
}

impl<'a> RunContext<'a> {
    /// A context with the built-in engine registry.
    pub fn new(reporter: &'a ProgressReporter<'a>) -> Self {
        Self::with_engines(reporter, EngineRegistry::builtin())
    }

    pub fn with_engines(reporter: &'a ProgressReporter<'a>, engines: EngineRegistry) -> Self {
        Self {
            reporter,
            engines,
            session: None,
        }
    }

    pub fn reporter(&self) -> &ProgressReporter<'a> {
        self.reporter
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Installs a freshly created session, replacing any previous one.
    pub fn install_session(&mut self, session: ActiveSession) {
        self.session = Some(session);
    }

    /// Transfers the active session out of the context. The caller owns it
    /// from here on; a second take without an intervening install fails.
    pub fn take_session(&mut self) -> Result<ActiveSession, EngineError> {
        self.session.take().ok_or_else(|| {
            EngineError::Session(
                "no active dynamics session (did the workflow run dynamics.init?)".to_string(),
            )
        })
    }
}
