//! Ogent: agent tool orchestration with dual-channel streamed responses.
//!
//! A session merges the local vault tools with remotely discovered
//! toolsets, resolves a model backend from a declarative config, and runs a
//! step-bounded tool-calling loop. Each turn's events are folded into a
//! Markdown display channel and a plain transcript channel.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use ogent::prelude::*;
//!
//! # async fn example() -> ogent::error::Result<()> {
//! let config = SessionConfig::new(ModelConfig::new("openai", "gpt-4o"), "sk-...");
//! let session = AgentSession::new(config, ProviderRegistry::new(), Arc::new(FsVault::new("vault")));
//!
//! let mut turn = session.send("What notes mention Rust?").await?;
//! while let Some(update) = turn.next().await {
//!     println!("{}", update.display);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod reducer;
pub mod session;
pub mod tools;
pub mod toolset;
pub mod types;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "cli")]
pub mod cli;
