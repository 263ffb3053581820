use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use tracing::{debug, error, info, warn};

use crate::connection::registry::instance_id_from_uri;
use crate::connection::{ClientHandle, ClientRegistry};
use crate::errors::DeliveryError;
use crate::models::{ActionType, DeliveryRecord, DeliveryResult, Payload, SkipReason};
use crate::services::transport::TransportHandler;

use super::connection::{DeleteOutcome, WebDavSession};
use super::url_management::WebDavUrlManager;

pub const API_TYPE: &str = "webdav";
pub const CONTENT_TYPE: &str = "static-asset";

/// Delivers static assets to the WebDAV shares of registered instances.
///
/// A PUBLISH ensures the folder hierarchy (existence check first, MKCOL only
/// for missing folders) and uploads the asset. An UNPUBLISH deletes the
/// resource, where a missing resource counts as deleted.
#[derive(Clone)]
pub struct WebDavTransport {
    registry: Arc<ClientRegistry>,
}

enum Asset {
    Ready { data: Vec<u8>, content_type: String },
    Skip(SkipReason),
}

impl WebDavTransport {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Runs one delivery with an already resolved client handle
    pub async fn deliver_to(
        &self,
        handle: &ClientHandle,
        record: &DeliveryRecord,
    ) -> Result<DeliveryResult, DeliveryError> {
        let (urls, target) = Self::resolve_endpoint(handle, record).inspect_err(|e| {
            error!("Can not create endpoint URI for {}: {}", record.path, e);
        })?;
        info!("Deliver {} to {} ({})", record.path, target, record.action_type);

        let session = WebDavSession::open(handle);
        let result = match record.action_type {
            ActionType::Publish => Self::publish(&session, &urls, &target, record).await,
            ActionType::Unpublish => Self::unpublish(&session, &target).await,
        };
        session.close();

        match &result {
            Ok(outcome) if outcome.is_success() => {
                info!("✅ Delivered {} to {} ({})", record.path, target, record.action_type)
            }
            Ok(_) => {}
            Err(e) => error!(
                "❌ Delivery of {} to {} ({}) failed: {}",
                record.path, target, record.action_type, e
            ),
        }
        result
    }

    fn resolve_endpoint(
        handle: &ClientHandle,
        record: &DeliveryRecord,
    ) -> Result<(WebDavUrlManager, Url), DeliveryError> {
        let urls = WebDavUrlManager::for_handle(handle, &record.share)?;
        let target = urls.target_uri(&record.path)?;
        Ok((urls, target))
    }

    async fn publish(
        session: &WebDavSession,
        urls: &WebDavUrlManager,
        target: &Url,
        record: &DeliveryRecord,
    ) -> Result<DeliveryResult, DeliveryError> {
        let (data, content_type) = match extract_asset(record)? {
            Asset::Ready { data, content_type } => (data, content_type),
            Asset::Skip(reason) => {
                warn!("No asset data to send for {}: {}", record.path, reason);
                return Ok(DeliveryResult::Skipped {
                    target_uri: target.to_string(),
                    reason,
                });
            }
        };

        let folders = urls.folder_uris(&record.path)?;
        let folders_created = session.ensure_folders(&folders).await?;

        debug!("Upload {} ({} bytes, {}) ...", record.path, data.len(), content_type);
        session.put(target, data, &content_type).await?;
        debug!("Upload done.");

        Ok(DeliveryResult::Published {
            target_uri: target.to_string(),
            folders_created,
        })
    }

    async fn unpublish(session: &WebDavSession, target: &Url) -> Result<DeliveryResult, DeliveryError> {
        info!("Delete {}", target);
        match session.delete(target).await? {
            DeleteOutcome::Deleted => Ok(DeliveryResult::Unpublished {
                target_uri: target.to_string(),
            }),
            DeleteOutcome::NotFound => {
                debug!("{} does not exist, nothing to delete", target);
                Ok(DeliveryResult::AlreadyAbsent {
                    target_uri: target.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl TransportHandler for WebDavTransport {
    fn api_type(&self) -> &'static str {
        API_TYPE
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    async fn deliver(
        &self,
        transport_uri: &str,
        record: &DeliveryRecord,
    ) -> Result<DeliveryResult, DeliveryError> {
        let handle = self
            .registry
            .lookup_transport_uri(transport_uri)
            .ok_or_else(|| DeliveryError::UnknownInstance {
                instance_id: instance_id_from_uri(transport_uri).to_string(),
            })?;
        self.deliver_to(&handle, record).await
    }
}

/// Payload bytes and content type of a PUBLISH record, or why it is skipped
fn extract_asset(record: &DeliveryRecord) -> Result<Asset, DeliveryError> {
    let Some(payload) = record.payload.as_ref() else {
        return Ok(Asset::Skip(SkipReason::MissingPayload));
    };
    let Some(content_type) = payload.content_type() else {
        return Ok(Asset::Skip(SkipReason::MissingContentType));
    };

    let data = decode_payload(payload).map_err(|source| DeliveryError::InvalidPayload {
        path: record.path.clone(),
        source,
    })?;

    match data {
        Some(data) if !data.is_empty() => Ok(Asset::Ready {
            data,
            content_type: content_type.to_string(),
        }),
        _ => Ok(Asset::Skip(SkipReason::EmptyPayload)),
    }
}

fn decode_payload(payload: &Payload) -> Result<Option<Vec<u8>>, base64::DecodeError> {
    let Some(data) = payload.data.as_deref() else {
        return Ok(None);
    };
    if payload.base64 {
        STANDARD.decode(data.trim()).map(Some)
    } else {
        Ok(Some(data.as_bytes().to_vec()))
    }
}
