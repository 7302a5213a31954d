// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # dds-connector
//!
//! Rust binding over a DDS "connector" native library: an XML application
//! model describes participants, readers, writers and types, and this crate
//! exposes them through a small handle API with field access by name.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dds_connector::{Connector, Result};
//!
//! fn main() -> Result<()> {
//!     let connector = Connector::new("MyParticipantLibrary::Zero", "ShapeExample.xml")?;
//!
//!     let output = connector.get_output("MyPublisher::MySquareWriter")?;
//!     output.instance().set_number("x", 10.0)?;
//!     output.instance().set_string("color", "BLUE")?;
//!     output.write()?;
//!
//!     let input = connector.get_input("MySubscriber::MySquareReader")?;
//!     connector.wait(1000)?;
//!     input.take()?;
//!     for i in 0..input.samples().len()? {
//!         if input.infos().is_valid(i)? {
//!             println!("x = {}", input.samples().get_i32(i, "x")?);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  Connector -> Input  -> Samples / Infos                             |
//! |            -> Output -> Instance                                    |
//! +---------------------------------------------------------------------+
//! |  status::check   (return code -> Error, last-error text)            |
//! +---------------------------------------------------------------------+
//! |  dyn NativeApi                                                      |
//! |    ConnectorLibrary (vendor library via libloading)                 |
//! |    LoopbackApi      (in-process, feature "loopback")                |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connector`] | Root handle over one participant profile |
//! | [`Input`] | Named data reader: read, take, wait for matches |
//! | [`Output`] | Named data writer: write, clear, wait for matches |
//! | [`Samples`] | Field access on the samples of the last read/take |
//! | [`Infos`] | Per-sample metadata (validity, timestamps, identities, states) |
//! | [`Instance`] | Staging record published by the next write |
//!
//! ## Lifecycle
//!
//! Closing a connector (explicitly or on drop) releases the native
//! participant once. Every handle obtained from it then fails with
//! [`Error::Deleted`] instead of touching released memory.

pub mod config;
pub mod connector;
pub mod error;
pub mod identity;
pub mod info;
pub mod input;
pub mod instance;
pub mod logging;
pub mod native;
pub mod output;
pub mod params;
pub mod sample;
pub mod status;
pub mod value;

pub use config::{ConfigSource, LibraryConfig};
pub use connector::Connector;
pub use error::{EntityKind, Error, Result};
pub use identity::Identity;
pub use info::Infos;
pub use input::Input;
pub use instance::Instance;
pub use logging::{init_logging, init_logging_from_env, init_logging_with_filter};
pub use native::ffi::ConnectorLibrary;
#[cfg(feature = "loopback")]
pub use native::loopback::LoopbackApi;
pub use native::NativeApi;
pub use output::Output;
pub use params::{InstanceState, MatchedEndpoint, SampleState, ViewState, WriteAction, WriteParams};
pub use sample::Samples;
pub use status::ReturnCode;
pub use value::{FieldValue, Narrow, SampleIndex};
