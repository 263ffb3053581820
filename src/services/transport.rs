use async_trait::async_trait;

use crate::errors::DeliveryError;
use crate::models::{DeliveryRecord, DeliveryResult};

/// A delivery channel towards commerce instances.
///
/// Handlers are constructed explicitly by the host with the registry they
/// resolve instances from. They never retry; a returned error is final for
/// that delivery and retry policy belongs to the caller.
#[async_trait]
pub trait TransportHandler: Send + Sync {
    /// API family the handler speaks, e.g. `webdav`
    fn api_type(&self) -> &'static str;

    /// Kind of content the handler delivers
    fn content_type(&self) -> &'static str;

    /// Executes one delivery against the instance addressed by `transport_uri`
    /// (`demandware://<instanceId>` or a bare instance id)
    async fn deliver(
        &self,
        transport_uri: &str,
        record: &DeliveryRecord,
    ) -> Result<DeliveryResult, DeliveryError>;
}
