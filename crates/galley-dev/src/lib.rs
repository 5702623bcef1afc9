//! # galley-dev
//!
//! Dev sessions for the galley engine.
//!
//! A [`DevSession`] cooks urls on request through a dev-mode kitchen and
//! turns file events into reload decisions. Events are debounced into
//! batches; each batch is one [`Propagation`] pass deciding between a full
//! reload and hot instructions, which connected clients receive as JSON
//! [`ServerEvent`]s.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use galley_config::GalleyConfig;
//! use galley_dev::{DevSession, FileEvent, FileEventKind};
//! use galley_kitchen::NativeRuntime;
//! use galley_kitchen::processors::{PatternScanner, default_processors};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), galley_dev::DevError> {
//! let mut registry = default_processors();
//! registry.add(PatternScanner::html());
//! registry.add(PatternScanner::css());
//! registry.add(PatternScanner::js());
//!
//! let config = GalleyConfig::default();
//! let session = DevSession::from_config(&config, Arc::new(NativeRuntime::new()), registry)?;
//! session.add_entry_point("./index.html").await?;
//! let (_client, mut events) = session.subscribe();
//!
//! let page = session.serve("./index.html").await?;
//! println!("{} ({})", page.url, page.etag);
//!
//! session.file_event(FileEvent::new("file:///project/b.css", FileEventKind::Modified));
//! while let Some(event) = events.recv().await {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod clients;
pub mod declarations;
pub mod error;
pub mod hot;
pub mod session;

pub use batch::{Change, UpdateBatcher};
pub use clients::{ClientRegistry, ServerEvent};
pub use declarations::HotDeclarationScanner;
pub use error::{DevError, Result};
pub use hot::{HotInstruction, InstructionKind, Propagation, ReloadDecision};
pub use session::{DevSession, FileEvent, FileEventKind, Served};
