//! # tessera-core
//!
//! Core library for exercising an iOS application's text fields and for
//! wiring a UI test target into an Xcode project.
//!
//! ## Modules
//!
//! - [`driver`] - The [`AutomationDriver`](driver::AutomationDriver) trait every backend implements
//! - [`agent_driver`] - Backend talking to an on-simulator accessibility agent over TCP
//! - [`agent_client`] / [`protocol`] - The agent's connection and binary wire format
//! - [`element`] - UI elements as reported by the agent
//! - [`simctl`] - Wrapper around `xcrun simctl` for launching a fresh app instance
//! - [`exerciser`] - Taps each text field and types into it, stopping at the first failure
//! - [`action`] - Per-step action log for exerciser runs
//! - [`project`] - Project descriptor model, storage, dependency registry and configurator
//! - [`config`] - Persistent settings in `~/.tessera/config.json`
//!
//! ## External Dependencies
//!
//! Exercising an app requires Xcode (for `xcrun simctl`) and an accessibility
//! agent running inside the simulator. Configuring a project only touches the
//! file system.
//!
//! ## Example
//!
//! ```no_run
//! use tessera_core::project::{ConfigureSettings, ProjectConfigurator, ProjectStore, StaticRegistry};
//!
//! let configurator = ProjectConfigurator::new(ProjectStore::new("."), StaticRegistry::builtin());
//! let outcome = configurator.configure(&ConfigureSettings::default()).unwrap();
//! for change in &outcome.changes {
//!     println!("{change}");
//! }
//! ```

pub mod action;
pub mod agent_client;
pub mod agent_driver;
pub mod config;
pub mod driver;
pub mod element;
pub mod exerciser;
pub mod project;
pub mod protocol;
pub mod simctl;
