use metrics_exporter_prometheus::PrometheusHandle;
use recruitment::applications::ApplicationStatus;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_status(raw: &str) -> Result<ApplicationStatus, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    ApplicationStatus::from_label(&normalized).ok_or_else(|| {
        format!("'{raw}' is not an application status (expected unhandled, accepted or rejected)")
    })
}
