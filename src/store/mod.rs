// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Persistent stores
//!
//! Two key-value databases live under the data directory: `crawl` holds
//! the navigation graph, `plugin` holds reports and plugin bookkeeping.

pub mod crawl;
pub mod dot;
pub mod kv;
pub mod plugin;

pub use crawl::{CrawlGraph, MAX_FIND_LIMIT, MAX_PATH_HOPS};
pub use dot::{render_dot, render_summary};
pub use kv::{KvStore, KvTxn};
pub use plugin::{PluginStore, UniqueKeys, Uniqueness};
