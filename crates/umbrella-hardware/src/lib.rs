//! NFC reader abstraction for the umbrella lending desk.
//!
//! The card reader is an opaque capability: it can be opened, it blocks
//! until a tag enters the field (or its wait policy gives up), and it can
//! render a detected tag's memory as dump text. This crate defines that
//! contract and a mock implementation that can be driven programmatically.
//!
//! Trait methods are native `async fn`, which makes them unusable as trait
//! objects. Callers that pick a driver at runtime hold an [`AnyNfcDriver`]
//! instead. [`NfcDriver::open`] hands out an exclusive [`NfcSession`] and the
//! holder must close it before the reader can be opened again.
//!
//! # Reading a Tag
//!
//! ```no_run
//! use umbrella_hardware::traits::{NfcDriver, NfcSession};
//! use umbrella_hardware::error::Result;
//!
//! async fn read_dump<D: NfcDriver>(driver: &D) -> Result<Option<Vec<String>>> {
//!     let mut session = driver.open().await?;
//!
//!     let dump = match session.wait_for_tag().await? {
//!         Some(tag) => Some(session.dump(&tag).await?),
//!         None => None,
//!     };
//!
//!     session.close().await?;
//!     Ok(dump)
//! }
//! ```
//!
//! See [`HardwareError`] for how failures are grouped.

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use devices::{AnyNfcDriver, AnyNfcSession};
pub use error::{HardwareError, Result};
pub use traits::{DetectedTag, MAX_UID_LENGTH, MIN_UID_LENGTH, NfcDriver, NfcSession};
pub use types::{ReaderInfo, TagType};
