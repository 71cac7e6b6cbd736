mod socket;

use std::sync::Arc;

use fmtx_proto::config::Config;
use fmtx_session::controller::SessionController;
use fmtx_session::events::{SessionEvent, SessionMessage};
use fmtx_session::sim::{SimLauncher, SimTransmitter};
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// A custom tracing layer that forwards log messages to the broadcast channel
struct BroadcastLayer {
    sender: broadcast::Sender<SessionMessage>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<SessionMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        // Only forward WARN and ERROR to clients to avoid clogging the channel
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = String::new();

        let now = chrono::Local::now();
        message.push_str(&format!("{} ", now.format("%H:%M:%S")));
        message.push_str(&format!("[{}] ", level));

        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // Send to broadcast channel (ignore errors - no receivers is OK)
        let _ = self.sender.send(SessionMessage::Log(message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup broadcast channel first so we can use it for logging
    let (broadcast_tx, _) = broadcast::channel::<SessionMessage>(100);

    // Setup file logging + broadcast layer
    let data_dir = fmtx_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    let broadcast_layer = BroadcastLayer::new(broadcast_tx.clone());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(broadcast_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fmtx_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    // Event channel: all external inputs funnel into the session controller
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();

    // TODO: bind the real hardware service here once a platform backend
    // exists; the simulator stands in for it meanwhile.
    let launcher = Arc::new(SimLauncher::new(Arc::new(SimTransmitter::new())));

    let controller = SessionController::new(
        config.clone(),
        launcher,
        broadcast_tx.clone(),
        event_tx.clone(),
        None,
    );
    let states = controller.states();

    // Start TCP socket server
    let _socket_handle = socket::start_server(
        config.daemon.bind_address.clone(),
        config.daemon.port,
        states,
        event_tx.clone(),
        broadcast_tx.clone(),
    );

    info!("Daemon initialised, running session loop");
    controller.run(event_rx).await?;

    Ok(())
}
