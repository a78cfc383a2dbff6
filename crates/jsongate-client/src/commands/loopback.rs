//! `loopback` command: a full exchange against an in-process device.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use jsongate_core::{DeviceConfig, SensorSlot};
use jsongate_device::{DeviceEndpoint, DeviceHandler, EndpointConfig};
use jsongate_protocol::{ChannelTransport, ReassemblyStats};

use crate::config::LinkSettings;
use crate::error::{ClientError, ClientResult};
use crate::link::Session;
use crate::router::MessageRouter;

/// What the loopback exchange observed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackReport {
    /// Configuration before the save.
    pub before: DeviceConfig,
    /// Configuration read back after the save.
    pub after: DeviceConfig,
    /// Whether `save_ok` arrived in time.
    pub acknowledged: bool,
    /// `config_data` updates seen by the router.
    pub updates: usize,
    /// Device-side reassembly counters.
    pub device_stats: ReassemblyStats,
}

/// Runs the exchange and prints a summary.
pub async fn run(settings: &LinkSettings, ssid: &str) -> ClientResult<()> {
    let report = exchange(settings, ssid).await?;

    println!(
        "before: ssid={:?} sensors={}",
        report.before.ssid,
        report.before.configured_sensors()
    );
    println!(
        "save:   {}",
        if report.acknowledged { "acknowledged" } else { "no acknowledgement" }
    );
    println!(
        "after:  ssid={:?} sensors={}",
        report.after.ssid,
        report.after.configured_sensors()
    );
    println!(
        "device: {} frame(s), {} resync(s)",
        report.device_stats.frames, report.device_stats.resyncs
    );
    Ok(())
}

/// Fetches the device configuration, saves a modified copy and reads it
/// back, all over channel transports with the given settings.
pub async fn exchange(settings: &LinkSettings, ssid: &str) -> ClientResult<LoopbackReport> {
    let (host_transport, device_writes) = ChannelTransport::pair(settings.channel_capacity);
    let (device_transport, host_notifications) = ChannelTransport::pair(settings.channel_capacity);

    let handler = Arc::new(DeviceHandler::default());
    let endpoint_config = EndpointConfig::default().with_mtu(settings.mtu);
    let endpoint = DeviceEndpoint::new(device_transport, &endpoint_config, handler)?;
    let device = tokio::spawn(endpoint.run(device_writes));

    let updates = Arc::new(AtomicUsize::new(0));
    let router = {
        let updates = Arc::clone(&updates);
        MessageRouter::new()
            .on_update(move |fields| {
                updates.fetch_add(1, Ordering::SeqCst);
                debug!(fields = fields.len(), "config_data received");
            })
            .on_ack(|| debug!("save_ok received"))
    };

    let session = Session::establish(host_transport, host_notifications, settings, router).await?;
    let link = Arc::clone(session.link());

    let before = link
        .fetch_device_config()
        .await?
        .ok_or_else(|| ClientError::Task("device did not answer get_config".to_string()))?;

    let mut desired = before.clone();
    desired.ssid = ssid.to_string();
    desired.sensors[0] = SensorSlot {
        label: "Loopback".to_string(),
        unit: "°C".to_string(),
        enabled: true,
        ..SensorSlot::default()
    };
    let acknowledged = link.save_config_confirmed(&desired).await?;

    let after = link
        .fetch_device_config()
        .await?
        .ok_or_else(|| ClientError::Task("device did not answer get_config".to_string()))?;

    drop(link);
    session.disconnect();

    let device_stats = match device.await {
        Ok(Ok(stats)) => stats,
        Ok(Err(err)) => {
            warn!(error = %err, "device endpoint failed");
            ReassemblyStats::default()
        }
        Err(err) => return Err(ClientError::Task(err.to_string())),
    };

    Ok(LoopbackReport {
        before,
        after,
        acknowledged,
        updates: updates.load(Ordering::SeqCst),
        device_stats,
    })
}
