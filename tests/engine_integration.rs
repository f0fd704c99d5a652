//! Integration tests for the session engine (§4.D) against a mock CDP
//! WebSocket server.
//!
//! Each test spins up a small WebSocket server that plays the debuggee's
//! part of the protocol, connects a `Session` to it, and drives the engine's
//! public operations, checking the round-trip laws and end-to-end scenarios
//! from §8, using per-test mock-server helpers in the
//! `start_echo_server`/`start_event_server` style, scripted to the concrete
//! scenarios a `debugger;`-statement program actually produces.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsts_debugger::cdp::ResultItem;
use jsts_debugger::engine::{EngineError, Session, SessionState};
use jsts_debugger::sandbox::DebuggeeHandle;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// A debuggee handle for tests: no real process to kill.
struct NoopDebuggee;

impl DebuggeeHandle for NoopDebuggee {
    fn terminate(&mut self) {}
}

fn noop_debuggee() -> Box<dyn DebuggeeHandle> {
    Box::new(NoopDebuggee)
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 64;

async fn connect_session(addr: SocketAddr, id: &str) -> std::sync::Arc<Session> {
    let url = format!("ws://{addr}");
    Session::connect(
        id.to_string(),
        &url,
        noop_debuggee(),
        DEFAULT_TIMEOUT,
        CONNECT_TIMEOUT,
        CHANNEL_CAPACITY,
    )
    .await
    .expect("session should connect")
}

/// Start a mock debuggee server driven by a per-message handler.
///
/// `handler(method, params) -> (result, events)` is invoked for every
/// command; `result` becomes the response's `result` payload and `events`
/// are emitted (in order) immediately after the response is sent.
fn start_scripted_server<F>(handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: Fn(&str, &Value) -> (Value, Vec<(&'static str, Value)>) + Send + Sync + 'static,
{
    start_scripted_server_listening(handler)
}

fn start_scripted_server_listening<F>(handler: F) -> (SocketAddr, JoinHandle<()>)
where
    F: Fn(&str, &Value) -> (Value, Vec<(&'static str, Value)>) + Send + Sync + 'static,
{
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let addr = std_listener.local_addr().unwrap();
    let listener = TcpListener::from_std(std_listener).unwrap();
    let handler = std::sync::Arc::new(handler);

    let join = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut sink, mut source) = ws.split();
        while let Some(Ok(msg)) = source.next().await {
            let Message::Text(text) = msg else { continue };
            let cmd: Value = serde_json::from_str(&text).unwrap();
            let id = cmd["id"].clone();
            let method = cmd["method"].as_str().unwrap_or_default().to_string();
            let params = cmd.get("params").cloned().unwrap_or(Value::Null);
            let (result, events) = handler(&method, &params);

            let response = json!({"id": id, "result": result});
            if sink
                .send(Message::Text(response.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
            for (event_method, event_params) in events {
                let event = json!({"method": event_method, "params": event_params});
                if sink
                    .send(Message::Text(event.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    });

    (addr, join)
}

/// Plays out a single `debugger;`-statement script: domain enables are
/// no-ops, `runIfWaitingForDebugger` immediately pauses, a single
/// `Debugger.resume` terminates.
fn single_pause_handler(method: &str, _params: &Value) -> (Value, Vec<(&'static str, Value)>) {
    match method {
        "Runtime.runIfWaitingForDebugger" => (
            json!({}),
            vec![("Debugger.paused", json!({"reason": "other", "callFrames": []}))],
        ),
        "Debugger.resume" => (
            json!({}),
            vec![("Inspector.detached", json!({"reason": "target_closed"}))],
        ),
        _ => (json!({}), Vec::new()),
    }
}

// -- Round-trip law: initialize -> pause -> resume -> termination -----------

#[tokio::test]
async fn initialize_then_resume_reaches_termination() {
    let (addr, _server) = start_scripted_server(single_pause_handler);
    let session = connect_session(addr, "s1").await;

    let init_result = session.initialize().await.unwrap();
    assert!(matches!(
        init_result.last(),
        Some(ResultItem::Event(e)) if e.method == "Debugger.paused"
    ));
    assert_eq!(session.state().await, SessionState::Armed);

    let resume_result = session.execute("Debugger.resume", None, false).await.unwrap();
    assert!(matches!(
        resume_result.last(),
        Some(ResultItem::Event(e)) if e.method == "Inspector.detached"
    ));
}

// -- Scenario 2: evaluate on call frame ---------------------------------

#[tokio::test]
async fn evaluate_on_call_frame_returns_computed_value() {
    let handler = |method: &str, params: &Value| -> (Value, Vec<(&'static str, Value)>) {
        match method {
            "Runtime.runIfWaitingForDebugger" => (
                json!({}),
                vec![(
                    "Debugger.paused",
                    json!({"reason": "other", "callFrames": [{"callFrameId": "frame-0"}]}),
                )],
            ),
            "Debugger.evaluateOnCallFrame" => {
                let expr = params["expression"].as_str().unwrap_or_default();
                assert_eq!(expr, "a+b");
                (json!({"result": {"type": "number", "value": 3}}), Vec::new())
            }
            "Debugger.resume" => (
                json!({}),
                vec![("Inspector.detached", json!({"reason": "target_closed"}))],
            ),
            _ => (json!({}), Vec::new()),
        }
    };
    let (addr, _server) = start_scripted_server(handler);
    let session = connect_session(addr, "s2").await;
    session.initialize().await.unwrap();

    let items = session
        .execute(
            "Debugger.evaluateOnCallFrame",
            Some(json!({"expression": "a+b", "callFrameId": "frame-0"})),
            false,
        )
        .await
        .unwrap();

    let command_results: Vec<&Value> = items
        .iter()
        .filter_map(|item| match item {
            ResultItem::CommandResult(v) => Some(v),
            ResultItem::Event(_) => None,
        })
        .collect();
    assert_eq!(command_results.len(), 1);
    assert_eq!(command_results[0]["result"]["value"], 3);

    let resume_result = session.execute("Debugger.resume", None, false).await.unwrap();
    assert!(matches!(
        resume_result.last(),
        Some(ResultItem::Event(e)) if e.method == "Inspector.detached"
    ));
}

// -- Scenario 3: breakpoint hit -----------------------------------------

#[tokio::test]
async fn breakpoint_hit_reports_hit_breakpoints_then_terminates() {
    let resume_count = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let resume_count_clone = std::sync::Arc::clone(&resume_count);
    let handler = move |method: &str, params: &Value| -> (Value, Vec<(&'static str, Value)>) {
        match method {
            "Runtime.runIfWaitingForDebugger" => (
                json!({}),
                vec![("Debugger.paused", json!({"reason": "other", "callFrames": []}))],
            ),
            "Debugger.setBreakpointByUrl" => {
                assert_eq!(params["lineNumber"], 2);
                (json!({"breakpointId": "bp-1", "locations": []}), Vec::new())
            }
            "Debugger.resume" => {
                let n = resume_count_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    (
                        json!({}),
                        vec![(
                            "Debugger.paused",
                            json!({"reason": "other", "hitBreakpoints": ["bp-1"], "callFrames": []}),
                        )],
                    )
                } else {
                    (json!({}), vec![("Inspector.detached", json!({"reason": "target_closed"}))])
                }
            }
            _ => (json!({}), Vec::new()),
        }
    };
    let (addr, _server) = start_scripted_server(handler);
    let session = connect_session(addr, "s3").await;
    session.initialize().await.unwrap();

    let bp_result = session
        .execute(
            "Debugger.setBreakpointByUrl",
            Some(json!({"lineNumber": 2, "url": "file:///app/entrypoint.ts"})),
            false,
        )
        .await
        .unwrap();
    assert!(bp_result.iter().any(|item| matches!(
        item,
        ResultItem::CommandResult(v) if v.get("breakpointId").is_some()
    )));

    let first_resume = session.execute("Debugger.resume", None, false).await.unwrap();
    assert!(first_resume.iter().any(|item| matches!(
        item,
        ResultItem::Event(e) if e.method == "Debugger.paused" && !e.params["hitBreakpoints"].as_array().unwrap().is_empty()
    )));

    let second_resume = session.execute("Debugger.resume", None, false).await.unwrap();
    assert!(matches!(
        second_resume.last(),
        Some(ResultItem::Event(e)) if e.method == "Inspector.detached"
    ));
}

// -- Scenario 4: skip all pauses ----------------------------------------

#[tokio::test]
async fn skip_all_pauses_suppresses_pauses_and_terminates() {
    let handler = |method: &str, _params: &Value| -> (Value, Vec<(&'static str, Value)>) {
        match method {
            "Runtime.runIfWaitingForDebugger" => (
                json!({}),
                vec![("Debugger.paused", json!({"reason": "other", "callFrames": []}))],
            ),
            "Debugger.setSkipAllPauses" => (
                json!({}),
                vec![("Inspector.detached", json!({"reason": "target_closed"}))],
            ),
            _ => (json!({}), Vec::new()),
        }
    };
    let (addr, _server) = start_scripted_server(handler);
    let session = connect_session(addr, "s4").await;
    session.initialize().await.unwrap();

    let items = session
        .execute("Debugger.setSkipAllPauses", Some(json!({"skip": true})), false)
        .await
        .unwrap();

    assert!(!items.iter().any(|item| matches!(
        item,
        ResultItem::Event(e) if e.method == "Debugger.paused"
    )));
    assert!(matches!(
        items.last(),
        Some(ResultItem::Event(e)) if e.method == "Inspector.detached"
    ));
}

// -- Scenario 5: unknown command rejected pre-send -----------------------

#[tokio::test]
async fn unknown_command_is_rejected_without_consuming_an_id() {
    let (addr, _server) = start_scripted_server(single_pause_handler);
    let session = connect_session(addr, "s5").await;
    session.initialize().await.unwrap();

    let err = session.execute("Nonsense.foo", None, false).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownCommand(m) if m == "Nonsense.foo"));

    // The counter is unaffected: the next allowed command still succeeds.
    let items = session.execute("Debugger.resume", None, false).await.unwrap();
    assert!(matches!(
        items.last(),
        Some(ResultItem::Event(e)) if e.method == "Inspector.detached"
    ));
}

#[tokio::test]
async fn unknown_command_is_allowed_when_opted_in() {
    let handler = |method: &str, _params: &Value| -> (Value, Vec<(&'static str, Value)>) {
        if method == "Nonsense.foo" {
            (json!({"ok": true}), Vec::new())
        } else {
            (json!({}), Vec::new())
        }
    };
    let (addr, _server) = start_scripted_server(handler);
    let session = connect_session(addr, "s5b").await;
    session.initialize().await.unwrap();

    let items = session.execute("Nonsense.foo", None, true).await.unwrap();
    assert!(items.iter().any(|item| matches!(
        item,
        ResultItem::CommandResult(v) if v["ok"] == true
    )));
}

// -- Scenario 6: multi-session independence ------------------------------

#[tokio::test]
async fn two_concurrent_sessions_reach_termination_independently() {
    let (addr_a, _server_a) = start_scripted_server(single_pause_handler);
    let (addr_b, _server_b) = start_scripted_server(single_pause_handler);

    let session_a = connect_session(addr_a, "multi-a").await;
    let session_b = connect_session(addr_b, "multi-b").await;

    let (result_a, result_b) = tokio::join!(
        async {
            session_a.initialize().await.unwrap();
            session_a.execute("Debugger.resume", None, false).await.unwrap()
        },
        async {
            session_b.initialize().await.unwrap();
            session_b.execute("Debugger.resume", None, false).await.unwrap()
        }
    );

    assert!(matches!(
        result_a.last(),
        Some(ResultItem::Event(e)) if e.method == "Inspector.detached"
    ));
    assert!(matches!(
        result_b.last(),
        Some(ResultItem::Event(e)) if e.method == "Inspector.detached"
    ));
}

// -- Boundary: send_and_await timeout -------------------------------------

#[tokio::test]
async fn silent_server_causes_command_timeout() {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let addr = std_listener.local_addr().unwrap();
    let listener = TcpListener::from_std(std_listener).unwrap();

    let _server = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Accept the connection but never respond to anything.
            let (_sink, mut source) = ws.split();
            while source.next().await.is_some() {}
        }
    });

    let url = format!("ws://{addr}");
    let session = Session::connect(
        "silent".to_string(),
        &url,
        noop_debuggee(),
        Duration::from_millis(150),
        CONNECT_TIMEOUT,
        CHANNEL_CAPACITY,
    )
    .await
    .unwrap();

    let err = session
        .execute("Debugger.enable", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout { .. }));
}

// -- Closure idempotence ---------------------------------------------------

#[tokio::test]
async fn close_is_idempotent_and_rejects_further_commands() {
    let (addr, _server) = start_scripted_server(single_pause_handler);
    let session = connect_session(addr, "close-test").await;
    session.initialize().await.unwrap();

    session.close().await;
    assert!(session.is_done());
    session.close().await; // second call is a no-op

    let err = session.execute("Debugger.resume", None, false).await.unwrap_err();
    assert!(matches!(err, EngineError::SessionClosed));
}

// -- Ignorable purity -------------------------------------------------------

#[tokio::test]
async fn script_parsed_never_surfaces_in_results() {
    let handler = |method: &str, _params: &Value| -> (Value, Vec<(&'static str, Value)>) {
        match method {
            "Runtime.runIfWaitingForDebugger" => (
                json!({}),
                vec![
                    ("Debugger.scriptParsed", json!({"scriptId": "1"})),
                    ("Debugger.paused", json!({"reason": "other", "callFrames": []})),
                ],
            ),
            _ => (json!({}), Vec::new()),
        }
    };
    let (addr, _server) = start_scripted_server(handler);
    let session = connect_session(addr, "s-ignorable").await;

    let items = session.initialize().await.unwrap();
    assert!(!items.iter().any(|item| matches!(
        item,
        ResultItem::Event(e) if e.method == "Debugger.scriptParsed"
    )));
}
