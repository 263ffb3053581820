// WebDAV delivery organized by functionality

pub mod connection;
pub mod service;
pub mod url_management;

// Re-export main types for convenience
pub use connection::{DeleteOutcome, WebDavSession};
pub use service::{WebDavTransport, API_TYPE, CONTENT_TYPE};
pub use url_management::{encode_segment, WebDavUrlManager, WEBDAV_SITES_PATH};
