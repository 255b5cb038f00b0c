//! `gatelinkd`: supervises one gate operator on an RS-485 line.
//!
//! Opens the serial port, starts the controller and status poller, and logs
//! every published status, fault and poll error until Ctrl-C. A port that
//! cannot be opened, or a link that dies, ends the process with an error.

mod config;
mod logging;

use anyhow::Context;
use config::GatelinkConfig;
use gatelink_control::{GateController, available_ports, open_serial};
use gatelink_service::GateService;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = GatelinkConfig::path_from_env();
    let config = GatelinkConfig::load(path.as_deref()).context("loading configuration")?;
    logging::init(&config.log_filter);
    config.validate().context("invalid configuration")?;

    info!(
        version = gatelink_core::VERSION,
        config = ?path,
        serial = %config.serial.path,
        address = %config.service.address,
        "Starting gatelinkd"
    );

    let port = match open_serial(&config.serial).await {
        Ok(port) => port,
        Err(e) => {
            if let Ok(ports) = available_ports() {
                warn!(?ports, "Serial ports present on this host");
            }
            return Err(e).context("opening serial port");
        }
    };

    let controller = Arc::new(GateController::spawn(
        port,
        &config.link,
        config.controller.clone(),
    ));
    let service = GateService::new(controller.clone(), config.service.clone());

    match service.version().await {
        Ok(v) => info!(firmware = %v.version, "Gate operator responding"),
        Err(e) => warn!(error = %e, "Gate operator did not report its version"),
    }

    let mut subscription = service.subscribe().await;
    service.start().await.context("starting status poller")?;

    let link_down = controller.cancellation_token();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let outcome = loop {
        tokio::select! {
            result = &mut interrupt => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutting down");
                break Ok(());
            }
            _ = link_down.cancelled() => {
                error!("Gate link closed");
                break Err(anyhow::anyhow!("gate link closed"));
            }
            Some(status) = subscription.statuses.recv() => {
                info!(
                    last_command = %status.last_command_status,
                    operator_state = %status.current_operator_state,
                    battery = %status.battery_state,
                    open_limit = status.open_limit,
                    close_limit = status.close_limit,
                    partial_open_limit = status.partial_open_limit,
                    "Gate status"
                );
            }
            Some(fault) = subscription.faults.recv() => {
                if fault.has_faults() {
                    let codes: Vec<String> =
                        fault.fault_codes.iter().map(ToString::to_string).collect();
                    warn!(count = fault.number_of_faults, ?codes, "Gate faults");
                } else {
                    info!("Gate faults cleared");
                }
            }
            Some(e) = subscription.errors.recv() => {
                warn!(error = %e, "Status poll failed");
            }
        }
    };

    service.shutdown().await;
    controller.close();

    info!(
        controller = ?controller.stats(),
        service = ?service.stats(),
        "Stopped"
    );

    outcome
}
