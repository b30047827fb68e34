// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Crawl graph
//!
//! Navigations and results are stored one predicate per key
//! (`<predicate>:<binary id>`). Nodes only point backwards through
//! `origin`; a path is rebuilt by walking origins up to the root.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::kv::{KvStore, KvTxn};
use crate::error::{Error, Result};
use crate::model::{
    Action, ConsoleEvent, Cookie, HttpMessage, Id, Navigation, NavigationResult,
    NavigationState, StorageEvent, TriggeredBy,
};
use crate::scope::Scope;

/// Hard bound on the origin walk
pub const MAX_PATH_HOPS: usize = 100;

/// Upper bound for `find` limits
pub const MAX_FIND_LIMIT: usize = 1000;

mod pred {
    pub const ID: &str = "id";
    pub const ORIGIN: &str = "origin";
    pub const TRIG_BY: &str = "trig_by";
    pub const STATE: &str = "state";
    pub const STATE_UPDATED: &str = "state_updated";
    pub const ACTION: &str = "action";
    pub const SCOPE: &str = "scope";
    pub const DIST: &str = "dist";

    pub const R_ID: &str = "r_id";
    pub const R_NAV_ID: &str = "r_nav_id";
    pub const R_DOM: &str = "r_dom";
    pub const R_START_URL: &str = "r_start_url";
    pub const R_END_URL: &str = "r_end_url";
    pub const R_MESSAGE_COUNT: &str = "r_message_count";
    pub const R_MESSAGES: &str = "r_messages";
    pub const R_COOKIES: &str = "r_cookies";
    pub const R_CONSOLE: &str = "r_console";
    pub const R_STORAGE: &str = "r_storage";
    pub const R_CAUSED_LOAD: &str = "r_caused_load";
    pub const R_WAS_ERROR: &str = "r_was_error";
    pub const R_ERRORS: &str = "r_errors";
}

fn key(predicate: &str, id: &Id) -> Vec<u8> {
    let mut k = Vec::with_capacity(predicate.len() + 1 + id.as_bytes().len());
    k.extend_from_slice(predicate.as_bytes());
    k.push(b':');
    k.extend_from_slice(id.as_bytes());
    k
}

fn prefix(predicate: &str) -> Vec<u8> {
    let mut k = predicate.as_bytes().to_vec();
    k.push(b':');
    k
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn read<T: DeserializeOwned>(txn: &KvTxn<'_>, predicate: &str, id: &Id) -> Result<Option<T>> {
    match txn.get(&key(predicate, id))? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn require<T: DeserializeOwned>(txn: &KvTxn<'_>, predicate: &str, id: &Id) -> Result<T> {
    read(txn, predicate, id)?
        .ok_or_else(|| Error::NotFound(format!("{}:{}", predicate, id.short())))
}

/// Persistent navigation graph
pub struct CrawlGraph {
    kv: KvStore,
    max_depth: usize,
}

impl CrawlGraph {
    /// Open the graph and recover navigations abandoned by a prior crash
    pub fn open(path: &Path, max_depth: usize) -> Result<Self> {
        let graph = Self {
            kv: KvStore::open(path)?,
            max_depth,
        };
        graph.recover()?;
        Ok(graph)
    }

    /// Open an existing graph for inspection. Nothing is recovered or
    /// truncated, and writes through the handle fail
    pub fn open_read_only(path: &Path, max_depth: usize) -> Result<Self> {
        Ok(Self {
            kv: KvStore::open_read_only(path)?,
            max_depth,
        })
    }

    /// In-memory graph for tests and replays
    pub fn in_memory(max_depth: usize) -> Result<Self> {
        Ok(Self {
            kv: KvStore::in_memory()?,
            max_depth,
        })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn recover(&self) -> Result<()> {
        let recovered = self.kv.update(|txn| {
            let ids = select_by_state(txn, NavigationState::InProcess, usize::MAX)?;
            for id in &ids {
                write_state(txn, id, NavigationState::Unvisited)?;
            }
            Ok(ids.len())
        })?;
        if recovered > 0 {
            warn!(count = recovered, "reset in-process navigations from previous run");
        }
        Ok(())
    }

    /// Insert a navigation; returns false when it was dropped
    pub fn add_navigation(&self, nav: &Navigation) -> Result<bool> {
        self.kv.update(|txn| self.insert_navigation(txn, nav))
    }

    /// Insert several navigations in one transaction
    pub fn add_navigations(&self, navs: &[Navigation]) -> Result<usize> {
        self.kv.update(|txn| {
            let mut added = 0;
            for nav in navs {
                if self.insert_navigation(txn, nav)? {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    fn insert_navigation(&self, txn: &KvTxn<'_>, nav: &Navigation) -> Result<bool> {
        if nav.distance > self.max_depth {
            debug!(nav = %nav.id.short(), distance = nav.distance, "navigation beyond max depth");
            return Ok(false);
        }
        if txn.exists(&key(pred::ID, &nav.id))? {
            return Ok(false);
        }
        if !nav.origin_id.is_root() {
            match read::<usize>(txn, pred::DIST, &nav.origin_id)? {
                Some(origin_dist) if origin_dist < nav.distance => {}
                other => {
                    warn!(
                        nav = %nav.id.short(),
                        origin = %nav.origin_id.short(),
                        origin_distance = ?other,
                        "rejecting navigation with invalid origin"
                    );
                    return Ok(false);
                }
            }
        } else if nav.distance != 0 {
            return Ok(false);
        }

        txn.put(&key(pred::ID, &nav.id), &encode(&nav.id)?)?;
        txn.put(&key(pred::ORIGIN, &nav.id), &encode(&nav.origin_id)?)?;
        txn.put(&key(pred::TRIG_BY, &nav.id), &encode(&nav.triggered_by)?)?;
        txn.put(&key(pred::STATE, &nav.id), &[nav.state.as_u8()])?;
        txn.put(&key(pred::STATE_UPDATED, &nav.id), &encode(&nav.state_updated)?)?;
        txn.put(&key(pred::ACTION, &nav.id), &encode(&nav.action)?)?;
        txn.put(&key(pred::SCOPE, &nav.id), &encode(&nav.scope)?)?;
        txn.put(&key(pred::DIST, &nav.id), &encode(&nav.distance)?)?;
        Ok(true)
    }

    /// True if the navigation has a valid state
    pub fn nav_exists(&self, nav: &Navigation) -> Result<bool> {
        self.kv.view(|txn| {
            Ok(txn
                .get(&key(pred::STATE, &nav.id))?
                .and_then(|v| v.first().copied())
                .map(|s| NavigationState::from_u8(s) != NavigationState::Invalid)
                .unwrap_or(false))
        })
    }

    /// Store a result and mark its navigation visited, or failed when the
    /// result carries an error
    pub fn add_result(&self, result: &NavigationResult) -> Result<()> {
        self.kv.update(|txn| {
            let nav_id = &result.navigation_id;
            if !txn.exists(&key(pred::ID, nav_id))? {
                return Err(Error::NotFound(format!("navigation {}", nav_id.short())));
            }
            let rid = &result.id;
            txn.put(&key(pred::R_ID, rid), &encode(rid)?)?;
            txn.put(&key(pred::R_NAV_ID, nav_id), &encode(rid)?)?;
            txn.put(&key(pred::R_DOM, rid), &encode(&result.dom)?)?;
            txn.put(&key(pred::R_START_URL, rid), &encode(&result.start_url)?)?;
            txn.put(&key(pred::R_END_URL, rid), &encode(&result.end_url)?)?;
            txn.put(&key(pred::R_MESSAGE_COUNT, rid), &encode(&result.messages.len())?)?;
            txn.put(&key(pred::R_MESSAGES, rid), &encode(&result.messages)?)?;
            txn.put(&key(pred::R_COOKIES, rid), &encode(&result.cookies)?)?;
            txn.put(&key(pred::R_CONSOLE, rid), &encode(&result.console_events)?)?;
            txn.put(&key(pred::R_STORAGE, rid), &encode(&result.storage_events)?)?;
            txn.put(&key(pred::R_CAUSED_LOAD, rid), &encode(&result.caused_load)?)?;
            txn.put(&key(pred::R_WAS_ERROR, rid), &encode(&result.was_error)?)?;
            txn.put(&key(pred::R_ERRORS, rid), &encode(&result.errors)?)?;
            let state = if result.was_error {
                NavigationState::Failed
            } else {
                NavigationState::Visited
            };
            write_state(txn, nav_id, state)
        })
    }

    #[cfg(test)]
    pub(crate) fn set_origin(&self, nav_id: &Id, origin: &Id) -> Result<()> {
        self.kv.update(|txn| txn.put(&key(pred::ORIGIN, nav_id), &encode(origin)?))
    }

    pub fn fail_navigation(&self, nav_id: &Id) -> Result<()> {
        self.set_navigation_state(nav_id, NavigationState::Failed)
    }

    pub fn set_navigation_state(&self, nav_id: &Id, state: NavigationState) -> Result<()> {
        self.kv.update(|txn| write_state(txn, nav_id, state))
    }

    /// Select up to `limit` navigations in `by` state, move them to `set`
    /// and return the path from the root to each
    pub fn find(
        &self,
        by: NavigationState,
        set: NavigationState,
        limit: usize,
    ) -> Result<Vec<Vec<Navigation>>> {
        let limit = limit.clamp(1, MAX_FIND_LIMIT);
        self.kv.update(|txn| {
            let ids = select_by_state(txn, by, limit)?;
            let mut paths = Vec::with_capacity(ids.len());
            for id in &ids {
                if set != by {
                    write_state(txn, id, set)?;
                }
                match read_path(txn, id) {
                    Ok(path) => paths.push(path),
                    Err(e) => {
                        warn!(nav = %id.short(), error = %e, "unable to rebuild path, failing navigation");
                        write_state(txn, id, NavigationState::Failed)?;
                    }
                }
            }
            Ok(paths)
        })
    }

    /// Path from the root to a single navigation
    pub fn find_path_by_nav_id(&self, nav_id: &Id) -> Result<Vec<Navigation>> {
        self.kv.view(|txn| read_path(txn, nav_id))
    }

    pub fn get_navigation(&self, nav_id: &Id) -> Result<Option<Navigation>> {
        self.kv.view(|txn| read_navigation(txn, nav_id))
    }

    /// Result recorded for a navigation
    pub fn get_navigation_result(&self, nav_id: &Id) -> Result<Option<NavigationResult>> {
        self.kv.view(|txn| read_result(txn, nav_id))
    }

    pub fn get_navigation_results(&self) -> Result<Vec<NavigationResult>> {
        self.kv.view(|txn| {
            let p = prefix(pred::R_NAV_ID);
            let mut out = Vec::new();
            for (k, _) in txn.scan_prefix(&p)? {
                let nav_id = Id::from_bytes(k[p.len()..].to_vec());
                if let Some(result) = read_result(txn, &nav_id)? {
                    out.push(result);
                }
            }
            Ok(out)
        })
    }

    /// Every navigation in key order
    pub fn navigations(&self) -> Result<Vec<Navigation>> {
        self.kv.view(|txn| {
            let p = prefix(pred::ID);
            let mut out = Vec::new();
            for (k, _) in txn.scan_prefix(&p)? {
                let id = Id::from_bytes(k[p.len()..].to_vec());
                if let Some(nav) = read_navigation(txn, &id)? {
                    out.push(nav);
                }
            }
            Ok(out)
        })
    }

    /// Count of navigations per state
    pub fn state_counts(&self) -> Result<BTreeMap<NavigationState, usize>> {
        self.kv.view(|txn| {
            let mut counts = BTreeMap::new();
            for (_, v) in txn.scan_prefix(&prefix(pred::STATE))? {
                let state = NavigationState::from_u8(v.first().copied().unwrap_or(0));
                *counts.entry(state).or_insert(0) += 1;
            }
            Ok(counts)
        })
    }

    /// Reset in-process navigations last touched before now - `budget`
    pub fn reset_stale(&self, budget: std::time::Duration) -> Result<usize> {
        let budget = ChronoDuration::from_std(budget)
            .map_err(|e| Error::other(format!("invalid stale budget: {}", e)))?;
        let cutoff = Utc::now() - budget;
        self.kv.update(|txn| {
            let mut reset = 0;
            for id in select_by_state(txn, NavigationState::InProcess, usize::MAX)? {
                let updated: Option<DateTime<Utc>> = read(txn, pred::STATE_UPDATED, &id)?;
                if updated.map(|u| u < cutoff).unwrap_or(true) {
                    write_state(txn, &id, NavigationState::Unvisited)?;
                    reset += 1;
                }
            }
            Ok(reset)
        })
    }
}

fn write_state(txn: &KvTxn<'_>, id: &Id, state: NavigationState) -> Result<()> {
    txn.put(&key(pred::STATE, id), &[state.as_u8()])?;
    txn.put(&key(pred::STATE_UPDATED, id), &encode(&Utc::now())?)?;
    Ok(())
}

fn select_by_state(txn: &KvTxn<'_>, state: NavigationState, limit: usize) -> Result<Vec<Id>> {
    let p = prefix(pred::STATE);
    let mut ids = Vec::new();
    for (k, v) in txn.scan_prefix(&p)? {
        if ids.len() >= limit {
            break;
        }
        if v.first().copied() == Some(state.as_u8()) {
            ids.push(Id::from_bytes(k[p.len()..].to_vec()));
        }
    }
    Ok(ids)
}

fn read_navigation(txn: &KvTxn<'_>, id: &Id) -> Result<Option<Navigation>> {
    if !txn.exists(&key(pred::ID, id))? {
        return Ok(None);
    }
    let state = txn
        .get(&key(pred::STATE, id))?
        .and_then(|v| v.first().copied())
        .map(NavigationState::from_u8)
        .unwrap_or(NavigationState::Invalid);

    Ok(Some(Navigation {
        id: id.clone(),
        origin_id: require(txn, pred::ORIGIN, id)?,
        triggered_by: read(txn, pred::TRIG_BY, id)?.unwrap_or(TriggeredBy::Crawler),
        state,
        state_updated: read(txn, pred::STATE_UPDATED, id)?.unwrap_or_else(Utc::now),
        action: require::<Action>(txn, pred::ACTION, id)?,
        scope: read(txn, pred::SCOPE, id)?.unwrap_or(Scope::InScope),
        distance: require(txn, pred::DIST, id)?,
    }))
}

fn read_path(txn: &KvTxn<'_>, id: &Id) -> Result<Vec<Navigation>> {
    let mut path = Vec::new();
    let mut current = id.clone();
    loop {
        if path.len() >= MAX_PATH_HOPS {
            return Err(Error::PathTooLong {
                id: id.to_hex(),
                hops: MAX_PATH_HOPS,
            });
        }
        let nav = read_navigation(txn, &current)?
            .ok_or_else(|| Error::NotFound(format!("navigation {}", current.short())))?;
        let origin = nav.origin_id.clone();
        path.push(nav);
        if origin.is_root() {
            break;
        }
        current = origin;
    }
    path.reverse();
    Ok(path)
}

fn read_result(txn: &KvTxn<'_>, nav_id: &Id) -> Result<Option<NavigationResult>> {
    let rid: Id = match read(txn, pred::R_NAV_ID, nav_id)? {
        Some(rid) => rid,
        None => return Ok(None),
    };
    Ok(Some(NavigationResult {
        id: rid.clone(),
        navigation_id: nav_id.clone(),
        start_url: read(txn, pred::R_START_URL, &rid)?.unwrap_or_default(),
        end_url: read(txn, pred::R_END_URL, &rid)?.unwrap_or_default(),
        dom: read(txn, pred::R_DOM, &rid)?.unwrap_or_default(),
        messages: read::<Vec<HttpMessage>>(txn, pred::R_MESSAGES, &rid)?.unwrap_or_default(),
        cookies: read::<Vec<Cookie>>(txn, pred::R_COOKIES, &rid)?.unwrap_or_default(),
        console_events: read::<Vec<ConsoleEvent>>(txn, pred::R_CONSOLE, &rid)?.unwrap_or_default(),
        storage_events: read::<Vec<StorageEvent>>(txn, pred::R_STORAGE, &rid)?.unwrap_or_default(),
        caused_load: read(txn, pred::R_CAUSED_LOAD, &rid)?.unwrap_or(false),
        was_error: read(txn, pred::R_WAS_ERROR, &rid)?.unwrap_or(false),
        errors: read(txn, pred::R_ERRORS, &rid)?.unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionType, HtmlElement, HttpRequest};
    use std::sync::Arc;

    fn seed() -> Navigation {
        Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://host/"))
    }

    fn click(origin: &Navigation, href: &str) -> Navigation {
        Navigation::new(
            Some(origin),
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, HtmlElement::new("a").attr("href", href)),
        )
    }

    #[test]
    fn test_duplicate_suppression() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let nav = seed();
        assert!(graph.add_navigation(&nav).unwrap());
        assert!(!graph.add_navigation(&nav).unwrap());
        assert!(graph.nav_exists(&nav).unwrap());
        assert_eq!(graph.navigations().unwrap().len(), 1);
    }

    #[test]
    fn test_max_depth_zero_accepts_only_seed() {
        let graph = CrawlGraph::in_memory(0).unwrap();
        let root = seed();
        assert!(graph.add_navigation(&root).unwrap());
        assert!(!graph.add_navigation(&click(&root, "/b")).unwrap());
        assert_eq!(graph.navigations().unwrap().len(), 1);
    }

    #[test]
    fn test_origin_must_exist_with_smaller_distance() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let root = seed();
        let orphan = click(&root, "/b");
        assert!(!graph.add_navigation(&orphan).unwrap());

        graph.add_navigation(&root).unwrap();
        let mut bad = click(&root, "/c");
        bad.distance = 0;
        assert!(!graph.add_navigation(&bad).unwrap());
        assert!(graph.add_navigation(&orphan).unwrap());
    }

    #[test]
    fn test_find_transitions_and_paths() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let root = seed();
        let b = click(&root, "/b");
        let c = click(&b, "/c");
        graph.add_navigations(&[root.clone(), b.clone(), c.clone()]).unwrap();

        let paths = graph
            .find(NavigationState::Unvisited, NavigationState::InProcess, 10)
            .unwrap();
        assert_eq!(paths.len(), 3);
        let deepest = paths.iter().find(|p| p.len() == 3).unwrap();
        assert_eq!(deepest[0].id, root.id);
        assert_eq!(deepest[2].id, c.id);
        assert!(deepest.iter().all(|n| n.state == NavigationState::InProcess));

        // nothing left to claim
        let again = graph
            .find(NavigationState::Unvisited, NavigationState::InProcess, 10)
            .unwrap();
        assert!(again.is_empty());

        let path = graph.find_path_by_nav_id(&b.id).unwrap();
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_find_limit_is_clamped() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let root = seed();
        graph.add_navigation(&root).unwrap();
        graph.add_navigation(&click(&root, "/x")).unwrap();
        let paths = graph
            .find(NavigationState::Unvisited, NavigationState::InProcess, 0)
            .unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn test_add_result_marks_visited() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let root = seed();
        graph.add_navigation(&root).unwrap();

        let mut result = NavigationResult::new(root.id.clone(), "about:blank");
        result.end_url = "http://host/".into();
        result.messages.push(HttpMessage::new(HttpRequest::new("GET", "http://host/")));
        result.hash();
        graph.add_result(&result).unwrap();

        let nav = graph.get_navigation(&root.id).unwrap().unwrap();
        assert_eq!(nav.state, NavigationState::Visited);
        let stored = graph.get_navigation_result(&root.id).unwrap().unwrap();
        assert_eq!(stored.id, result.id);
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(graph.get_navigation_results().unwrap().len(), 1);

        let counts = graph.state_counts().unwrap();
        assert_eq!(counts.get(&NavigationState::Visited), Some(&1));
    }

    #[test]
    fn test_result_for_unknown_navigation_is_rejected() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let mut result = NavigationResult::new(Id::from_bytes(vec![9]), "x");
        result.hash();
        assert!(graph.add_result(&result).is_err());
    }

    #[test]
    fn test_concurrent_find_claims_each_node_once() {
        let graph = Arc::new(CrawlGraph::in_memory(5).unwrap());
        let root = seed();
        graph.add_navigation(&root).unwrap();
        let children: Vec<Navigation> = (0..40).map(|i| click(&root, &format!("/{}", i))).collect();
        graph.add_navigations(&children).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = Arc::clone(&graph);
                std::thread::spawn(move || {
                    g.find(NavigationState::Unvisited, NavigationState::InProcess, 7)
                        .unwrap()
                        .into_iter()
                        .map(|p| p.last().unwrap().id.clone())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut claimed: Vec<Id> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = claimed.len();
        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), total);
    }

    #[test]
    fn test_reopen_recovers_in_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl");
        let root = seed();
        {
            let graph = CrawlGraph::open(&path, 5).unwrap();
            graph.add_navigation(&root).unwrap();
            graph
                .find(NavigationState::Unvisited, NavigationState::InProcess, 1)
                .unwrap();
        }
        let graph = CrawlGraph::open(&path, 5).unwrap();
        let nav = graph.get_navigation(&root.id).unwrap().unwrap();
        assert_eq!(nav.state, NavigationState::Unvisited);
    }

    #[test]
    fn test_reset_stale() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let root = seed();
        graph.add_navigation(&root).unwrap();
        graph
            .find(NavigationState::Unvisited, NavigationState::InProcess, 1)
            .unwrap();
        assert_eq!(graph.reset_stale(std::time::Duration::from_secs(3600)).unwrap(), 0);
        assert_eq!(graph.reset_stale(std::time::Duration::ZERO).unwrap(), 1);
    }

    #[test]
    fn test_read_only_open_skips_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl");
        let root = seed();
        let live = CrawlGraph::open(&path, 5).unwrap();
        live.add_navigation(&root).unwrap();
        live.find(NavigationState::Unvisited, NavigationState::InProcess, 1)
            .unwrap();

        let ro = CrawlGraph::open_read_only(&path, 5).unwrap();
        let nav = ro.get_navigation(&root.id).unwrap().unwrap();
        assert_eq!(nav.state, NavigationState::InProcess);
        assert!(ro.fail_navigation(&root.id).is_err());

        let nav = live.get_navigation(&root.id).unwrap().unwrap();
        assert_eq!(nav.state, NavigationState::InProcess);
    }

    #[test]
    fn test_origin_cycle_is_bounded() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let root = seed();
        let child = click(&root, "/b");
        graph.add_navigations(&[root.clone(), child.clone()]).unwrap();
        graph.set_origin(&root.id, &child.id).unwrap();

        let err = graph.find_path_by_nav_id(&child.id).unwrap_err();
        assert!(matches!(err, Error::PathTooLong { hops: MAX_PATH_HOPS, .. }));

        let paths = graph
            .find(NavigationState::Unvisited, NavigationState::InProcess, 10)
            .unwrap();
        assert!(paths.is_empty());
        for id in [&root.id, &child.id] {
            let nav = graph.get_navigation(id).unwrap().unwrap();
            assert_eq!(nav.state, NavigationState::Failed);
        }
    }

    #[test]
    fn test_path_longer_than_hop_bound() {
        let graph = CrawlGraph::in_memory(MAX_PATH_HOPS * 2).unwrap();
        let mut chain = vec![seed()];
        for i in 1..=MAX_PATH_HOPS {
            let next = click(&chain[i - 1], &format!("/n{}", i));
            chain.push(next);
        }
        assert_eq!(graph.add_navigations(&chain).unwrap(), chain.len());

        let at_bound = &chain[MAX_PATH_HOPS - 1];
        assert_eq!(graph.find_path_by_nav_id(&at_bound.id).unwrap().len(), MAX_PATH_HOPS);
        let past_bound = &chain[MAX_PATH_HOPS];
        assert!(matches!(
            graph.find_path_by_nav_id(&past_bound.id),
            Err(Error::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_errored_result_fails_navigation() {
        let graph = CrawlGraph::in_memory(5).unwrap();
        let root = seed();
        graph.add_navigation(&root).unwrap();

        let mut result = NavigationResult::new(root.id.clone(), "about:blank");
        result.was_error = true;
        result.errors.push("element not found".into());
        result.hash();
        graph.add_result(&result).unwrap();

        let nav = graph.get_navigation(&root.id).unwrap().unwrap();
        assert_eq!(nav.state, NavigationState::Failed);
        assert!(graph.get_navigation_result(&root.id).unwrap().unwrap().was_error);
    }
}
