//! # FilingWatch Core
//! Shared configuration, error types, data model and the two seams every
//! other crate plugs into: [`traits::FilingStore`] and [`traits::Transport`].

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FilingWatchConfig;
pub use error::{FilingWatchError, Result, TransportError, TransportErrorKind};
pub use traits::{FilingStore, Transport};
pub use types::{DeliveryId, Filing, FilingQuery, ImageDescriptor, ImageSource, OutgoingMail, ScreenshotPayload};
