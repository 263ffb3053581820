pub mod transport;
pub mod webdav;

pub use transport::TransportHandler;
