//! Dashboard demo.
//!
//! Three components share one runtime. `Chart` waits for `DataSource` to be
//! opened, `Toolbar` waits for `Chart` to have started; all three are started
//! at once and the state engine sequences them.

use organa_core::Result;
use organa_runtime::{Component, ComponentInfo, Runtime, handler};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};

/// Order in which the dashboard components reached `opened`.
pub type OpenLog = Arc<Mutex<Vec<String>>>;

fn log_opened(component: &Component, log: &OpenLog) {
    let log = Arc::clone(log);
    component.on(
        "afterOpen",
        handler(move |component, _| {
            let log = Arc::clone(&log);
            async move {
                tracing::info!(component = component.name(), "opened");
                log.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(component.name().to_string());
                Ok(())
            }
        }),
    );
}

/// Start the dashboard on `runtime` and return the order components opened in.
///
/// # Errors
///
/// Fails if any component fails to start, including a `waitFor` timeout.
pub async fn run_dashboard(runtime: &Arc<Runtime>) -> Result<Vec<String>> {
    let log: OpenLog = Arc::default();

    let toolbar = runtime.component("Toolbar");
    let chart = runtime.component("Chart");
    let source = runtime.component("DataSource");
    for component in [&toolbar, &chart, &source] {
        log_opened(component, &log);
    }

    tokio::try_join!(
        toolbar.start(json!({"waitFor": [{"name": "Chart", "state": "started"}]})),
        chart.start(json!({"waitFor": [{"name": "DataSource"}]})),
        source.start(json!({"autoRefresh": false})),
    )?;

    let opened = log.lock().unwrap_or_else(PoisonError::into_inner).clone();
    Ok(opened)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use organa_runtime::RuntimeConfig;

    #[tokio::test]
    async fn dependencies_open_first() {
        organa_testing::init_test_tracing();
        let runtime = Runtime::new(RuntimeConfig::default());
        let opened = run_dashboard(&runtime).await.unwrap();
        assert_eq!(opened, vec!["DataSource", "Chart", "Toolbar"]);
        assert_eq!(runtime.engine().pending_waits(), 0);
    }
}
