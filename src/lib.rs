#[macro_use]
pub mod logging;

pub mod actions;
pub mod checksums;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod settings;

pub use actions::{ButtonAction, ButtonDefinition};
pub use error::{RelayError, Result};
pub use io::{
    CommandCode, Frame, RelayCardClient, RelayFlags, SerialTransport, TransportOptions,
};
pub use logging::Logger;
pub use pipeline::{PendingRequest, PipelineConfig, RelayPipeline, Subscriber};
pub use settings::AppSettings;

/// Client with a fresh transport built from `settings`, connected to `port`.
pub fn connect_client(settings: &AppSettings, port: &str, log: &Logger) -> Result<RelayCardClient> {
    let transport = SerialTransport::new(settings.transport_options(), log.clone());
    let mut client = RelayCardClient::new(transport, log.clone());
    client.connect(port)?;
    Ok(client)
}
