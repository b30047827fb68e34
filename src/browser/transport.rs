// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! DevTools transport
//!
//! Tabs speak raw CDP JSON through [`CdpTransport`]. The Chromium
//! implementation drives a `chromiumoxide` connection from a single loop
//! task; commands go in over a channel and events come out over another.

use std::collections::HashMap;
use std::convert::TryInto;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// An event received from the browser
#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    /// Send a command to the browser (`session = None`) or a flattened session
    async fn send_command(&self, session: Option<&str>, method: &str, params: Value)
        -> Result<Value>;

    /// Next event; `None` once the connection is gone
    async fn next_event(&self) -> Option<TransportEvent>;

    /// Close the connection and stop any owned browser process
    async fn shutdown(&self) -> Result<()>;
}

struct ControlMessage {
    session: Option<String>,
    method: String,
    params: Value,
    responder: oneshot::Sender<Result<Value>>,
}

/// Transport over a Chromium DevTools websocket
pub struct ChromiumTransport {
    command_tx: mpsc::Sender<ControlMessage>,
    events_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    loop_task: JoinHandle<()>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
    command_timeout: Duration,
    // removed when the transport is dropped
    _profile: Option<TempDir>,
}

impl ChromiumTransport {
    /// Connect to `ws_url`. `child` and `profile` are owned for the
    /// transport's lifetime when the browser was launched locally
    pub async fn connect(
        ws_url: &str,
        child: Option<Child>,
        profile: Option<TempDir>,
        command_timeout: Duration,
    ) -> Result<Self> {
        let conn = Connection::<CdpEventMessage>::connect(ws_url)
            .await
            .map_err(|e| Error::BrowserLaunch(format!("connecting to {}: {}", ws_url, e)))?;

        let (command_tx, command_rx) = mpsc::channel(128);
        let (events_tx, events_rx) = mpsc::channel(1024);
        let alive = Arc::new(AtomicBool::new(true));
        let loop_alive = Arc::clone(&alive);

        let loop_task = tokio::spawn(async move {
            if let Err(e) = run_loop(conn, command_rx, events_tx).await {
                error!(error = %e, "transport loop terminated");
            }
            loop_alive.store(false, Ordering::Relaxed);
        });

        info!(url = %ws_url, "devtools connection established");
        Ok(Self {
            command_tx,
            events_rx: Mutex::new(events_rx),
            loop_task,
            child: Mutex::new(child),
            alive,
            command_timeout,
            _profile: profile,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn send_command(
        &self,
        session: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        if !self.is_alive() {
            return Err(Error::TabCrashed("devtools connection closed".into()));
        }
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(ControlMessage {
                session: session.map(str::to_string),
                method: method.to_string(),
                params,
                responder: tx,
            })
            .await
            .map_err(|_| Error::TabCrashed("devtools connection closed".into()))?;

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => Err(Error::cdp(method, "response channel closed")),
            Err(_) => Err(Error::timeout(
                format!("cdp {}", method),
                self.command_timeout.as_millis() as u64,
            )),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events_rx.lock().await.recv().await
    }

    async fn shutdown(&self) -> Result<()> {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill browser process");
            }
        }
        Ok(())
    }
}

impl Drop for ChromiumTransport {
    fn drop(&mut self) {
        self.loop_task.abort();
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(mut child) = guard.take() {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        let _ = child.kill().await;
                    });
                }
            }
        }
    }
}

async fn run_loop(
    mut conn: Connection<CdpEventMessage>,
    mut command_rx: mpsc::Receiver<ControlMessage>,
    events_tx: mpsc::Sender<TransportEvent>,
) -> Result<()> {
    let mut inflight: HashMap<CallId, (String, oneshot::Sender<Result<Value>>)> = HashMap::new();

    loop {
        tokio::select! {
            Some(cmd) = command_rx.recv() => {
                let session = cmd.session.map(CdpSessionId::from);
                let method_id: MethodId = cmd.method.clone().into();
                match conn.submit_command(method_id, session, cmd.params) {
                    Ok(call_id) => {
                        inflight.insert(call_id, (cmd.method, cmd.responder));
                    }
                    Err(e) => {
                        let _ = cmd.responder.send(Err(Error::cdp(&cmd.method, e.to_string())));
                    }
                }
            }
            message = conn.next() => match message {
                Some(Ok(Message::Response(resp))) => {
                    if let Some((method, tx)) = inflight.remove(&resp.id) {
                        let _ = tx.send(extract_payload(&method, resp));
                    }
                }
                Some(Ok(Message::Event(event))) => {
                    let raw: CdpJsonEventMessage = match event.try_into() {
                        Ok(raw) => raw,
                        Err(e) => {
                            debug!(error = %e, "undecodable cdp event");
                            continue;
                        }
                    };
                    let event = TransportEvent {
                        method: raw.method.into_owned(),
                        params: raw.params,
                        session_id: raw.session_id,
                    };
                    if events_tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Some(Err(e)) => {
                    for (_, (method, tx)) in inflight.drain() {
                        let _ = tx.send(Err(Error::cdp(method, e.to_string())));
                    }
                    return Err(Error::TabCrashed(e.to_string()));
                }
                None => {
                    for (_, (_, tx)) in inflight.drain() {
                        let _ = tx.send(Err(Error::TabCrashed("devtools connection closed".into())));
                    }
                    return Ok(());
                }
            }
        }
    }
}

fn extract_payload(method: &str, resp: Response) -> Result<Value> {
    if let Some(result) = resp.result {
        Ok(result)
    } else if let Some(err) = resp.error {
        Err(Error::cdp(method, format!("{}: {}", err.code, err.message)))
    } else {
        Ok(Value::Null)
    }
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedTransport;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_transport_records_commands() {
        let t = ScriptedTransport::new(|method, _| match method {
            "Target.createTarget" => Some(Ok(json!({"targetId": "T1"}))),
            "Page.navigate" => Some(Err(Error::cdp("Page.navigate", "net::ERR_NAME_NOT_RESOLVED"))),
            _ => None,
        });
        let res = t
            .send_command(None, "Target.createTarget", json!({"url": "about:blank"}))
            .await
            .unwrap();
        assert_eq!(res["targetId"], "T1");
        assert!(t.send_command(Some("S1"), "Page.navigate", json!({})).await.is_err());
        assert_eq!(t.sent("Target.createTarget").len(), 1);

        t.push_event("Page.loadEventFired", json!({})).await;
        let ev = t.next_event().await.unwrap();
        assert_eq!(ev.method, "Page.loadEventFired");
    }
}
