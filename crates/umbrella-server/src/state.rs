use std::sync::Arc;
use umbrella_hardware::mock::MockNfcHandle;
use umbrella_reader::ReaderController;
use umbrella_storage::UmbrellaService;

/// Shared handler state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ReaderController>,

    /// Control handle of the simulated reader, when one is attached.
    pub simulator: Option<MockNfcHandle>,
}

impl AppState {
    pub fn new(controller: Arc<ReaderController>) -> Self {
        Self {
            controller,
            simulator: None,
        }
    }

    pub fn with_simulator(mut self, simulator: MockNfcHandle) -> Self {
        self.simulator = Some(simulator);
        self
    }

    pub fn service(&self) -> &UmbrellaService {
        self.controller.service()
    }
}
