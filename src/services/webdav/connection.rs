use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use tracing::{debug, warn};

use crate::connection::ClientHandle;
use crate::errors::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// One WebDAV session over the shared client of an instance.
///
/// The session carries the Basic credentials of the instance and is counted
/// on the handle while open. It is released when closed or dropped, so every
/// exit path of a delivery gives it back.
pub struct WebDavSession {
    client: Client,
    credentials: Option<(String, Option<String>)>,
    instance_id: String,
    open_sessions: Arc<AtomicUsize>,
}

impl WebDavSession {
    pub fn open(handle: &ClientHandle) -> Self {
        let credentials = handle.webdav_user().map(|user| {
            debug!("WebDAV auth user: {}", user);
            (user.to_string(), handle.webdav_password().map(str::to_string))
        });
        if credentials.is_none() {
            debug!("No WebDAV user configured for {}, sending unauthenticated requests", handle.instance_id());
        }

        let open_sessions = handle.session_counter();
        open_sessions.fetch_add(1, Ordering::SeqCst);

        Self {
            client: handle.http_client().clone(),
            credentials,
            instance_id: handle.instance_id().to_string(),
            open_sessions,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let request = self.client.request(method, url.clone());
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<StatusCode, DeliveryError> {
        let response = request.send().await.map_err(|source| DeliveryError::Transport {
            operation,
            url: url.to_string(),
            source,
        })?;
        Ok(response.status())
    }

    /// Existence check; 404 means absent, any other non-2xx is an error
    pub async fn exists(&self, url: &Url) -> Result<bool, DeliveryError> {
        let status = self.send("HEAD", self.request(Method::HEAD, url), url).await?;
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(DeliveryError::UnexpectedStatus {
                operation: "HEAD",
                url: url.to_string(),
                status,
            }),
        }
    }

    /// MKCOL; a 405 means the collection appeared meanwhile and is accepted
    pub async fn create_directory(&self, url: &Url) -> Result<(), DeliveryError> {
        let mkcol = Method::from_bytes(b"MKCOL")
            .map_err(|_| DeliveryError::UnsupportedMethod { method: "MKCOL" })?;
        let status = self.send("MKCOL", self.request(mkcol, url), url).await?;
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::METHOD_NOT_ALLOWED => {
                debug!("WebDAV folder {} already exists", url);
                Ok(())
            }
            status => Err(DeliveryError::UnexpectedStatus {
                operation: "MKCOL",
                url: url.to_string(),
                status,
            }),
        }
    }

    /// Walks `folders` parent first and creates the missing ones.
    /// Returns the number of folders created.
    pub async fn ensure_folders(&self, folders: &[Url]) -> Result<usize, DeliveryError> {
        let mut created = 0;
        for folder in folders {
            if self.exists(folder).await? {
                continue;
            }
            debug!("Create missing WebDAV folder {}", folder);
            self.create_directory(folder).await?;
            created += 1;
        }
        Ok(created)
    }

    pub async fn put(&self, url: &Url, data: Vec<u8>, content_type: &str) -> Result<(), DeliveryError> {
        let request = self
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, content_type)
            .body(data);
        let status = self.send("PUT", request, url).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::UnexpectedStatus {
                operation: "PUT",
                url: url.to_string(),
                status,
            })
        }
    }

    pub async fn delete(&self, url: &Url) -> Result<DeleteOutcome, DeliveryError> {
        let status = self.send("DELETE", self.request(Method::DELETE, url), url).await?;
        match status {
            s if s.is_success() => Ok(DeleteOutcome::Deleted),
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            status => Err(DeliveryError::UnexpectedStatus {
                operation: "DELETE",
                url: url.to_string(),
                status,
            }),
        }
    }

    pub fn close(self) {
        debug!("Closing WebDAV session for {}", self.instance_id);
    }
}

impl Drop for WebDavSession {
    fn drop(&mut self) {
        let previous = self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        if previous == 0 {
            warn!("Error shut down WebDAV session for {}: session counter underflow", self.instance_id);
            self.open_sessions.store(0, Ordering::SeqCst);
        }
    }
}
