// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # browserk - Browser-driven DAST engine
//!
//! Crawls a target with instrumented Chromium tabs, records every action
//! it takes as a navigation graph, and lets plugins observe and fuzz the
//! traffic the browser produced.
//!
//! ## Features
//!
//! - Navigation graph: content-addressed nodes persisted in SQLite, resumable
//! - Browser pool: one tab per lease over the DevTools protocol
//! - Injection AST: typed injection sites in paths, queries, bodies, headers
//! - Plugins: passive listeners and active injectors with uniqueness gating
//! - Reports: deduplicated findings, JSON export, Graphviz crawl maps
//!
//! ## Example
//!
//! ```rust,no_run
//! use browserk::{Config, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("http://localhost:8080/").num_browsers(2);
//!     let scanner = Scanner::from_config(config, false)?;
//!     let summary = scanner.run().await?;
//!     println!("visited {} paths", summary.paths);
//!     scanner.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod config;
pub mod context;
pub mod crawler;
pub mod error;
pub mod injast;
pub mod model;
pub mod network;
pub mod plugin;
pub mod replay;
pub mod report;
pub mod scanner;
pub mod scope;
pub mod store;

// Re-exports for convenience

// Configuration and context
pub use config::{AuthConfig, AuthKind, BrowserSettings, Config, PluginSettings, Timeouts};
pub use context::Context;

// Errors
pub use error::{Error, ErrorContext, Result};

// Scope
pub use scope::{Scope, ScopeService};

// Injection
pub use injast::{InjectKind, InjectionLocation, InjectionRequest, Site};

// Model
pub use model::{
    Action, ActionType, Cookie, Evidence, HtmlElement, HtmlForm, HttpMessage, HttpRequest,
    HttpResponse, Id, Navigation, NavigationResult, NavigationState, Report, Severity,
    TriggeredBy,
};

// Browser
pub use browser::{Browser, BrowserPool, ChromePool, ChromeTab, Launcher, LeaseToken, PoolStats};

// Crawl
pub use crawler::{Crawler, FormFiller, StepOutcome};
pub use scanner::{PathOutcome, ScanSummary, Scanner, Worker};
pub use replay::{render_navigations, ReplayStep, Replayer};

// Storage
pub use store::{render_dot, render_summary, CrawlGraph, PluginStore};

// Plugins
pub use plugin::{EventType, Injector, Plugin, PluginEvent, PluginManager, PluginOpts};

// Reporting
pub use report::{MemoryReporter, Reporter, ScanReport};

/// browserk version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
