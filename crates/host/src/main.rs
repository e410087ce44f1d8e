mod app;

use std::process::ExitCode;

use tracing::{error, info};

fn main() -> ExitCode {
    app::init_tracing();
    info!("=== modrun startup ===");

    let result = app::build_host().and_then(app::run_host);
    match result {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                sim_time_ms = summary.sim_time_ms,
                frames_presented = summary.frames_presented,
                reason = ?summary.stop_reason,
                "shutdown"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "host_failed");
            ExitCode::FAILURE
        }
    }
}
