//! In-process stand-in for the service's HTTP API.
//!
//! Serves the system endpoints the harness drives (init, seal status, unseal,
//! health, auth mounts) plus the LDAP auth configuration routes over plain
//! HTTP/1.1 with `Connection: close`. Requests are handled one at a time on a
//! background thread and recorded for assertions.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};

pub(crate) const ROOT_TOKEN: &str = "s.fake-root";
const ALREADY_INITIALIZED: &str = "Vault is already initialized";

/// One request as seen by the fake service.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub token: Option<String>,
    pub body: Value,
}

#[derive(Debug, Default)]
struct VaultState {
    initialized: bool,
    sealed: bool,
    shares: usize,
    threshold: usize,
    keys: Vec<String>,
    accepted: Vec<String>,
    auth_mounts: HashMap<String, String>,
    ldap_config: Option<Value>,
    ldap_groups: HashMap<String, Value>,
    requests: Vec<RecordedRequest>,
}

struct Reply {
    status: u16,
    body: Option<Value>,
}

impl Reply {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    fn no_content() -> Self {
        Self {
            status: 204,
            body: None,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "errors": [message] }))
    }
}

/// Fake service listening on an ephemeral loopback port.
pub(crate) struct FakeVault {
    address: SocketAddr,
    state: Arc<Mutex<VaultState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeVault {
    pub fn spawn() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake vault")?;
        listener
            .set_nonblocking(true)
            .context("fake vault nonblocking")?;
        let address = listener.local_addr().context("local addr")?;
        let state = Arc::new(Mutex::new(VaultState {
            sealed: true,
            ..VaultState::default()
        }));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve(&listener, &state, &stop))
        };
        Ok(Self {
            address,
            state,
            stop,
            handle: Some(handle),
        })
    }

    pub fn address(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    pub fn is_sealed(&self) -> bool {
        lock(&self.state).sealed
    }

    pub fn unseal_progress(&self) -> usize {
        lock(&self.state).accepted.len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn ldap_config(&self) -> Option<Value> {
        lock(&self.state).ldap_config.clone()
    }

    pub fn ldap_group(&self, name: &str) -> Option<Value> {
        lock(&self.state).ldap_groups.get(name).cloned()
    }

    pub fn auth_mount(&self, path: &str) -> Option<String> {
        lock(&self.state).auth_mounts.get(path).cloned()
    }
}

impl Drop for FakeVault {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn lock(state: &Mutex<VaultState>) -> MutexGuard<'_, VaultState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn serve(listener: &TcpListener, state: &Mutex<VaultState>, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                // Failures on one connection must not stop the listener.
                let _ = handle_connection(stream, state);
            }
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(_) => thread::sleep(Duration::from_millis(5)),
        }
    }
}

struct ParsedRequest {
    method: String,
    path: String,
    token: Option<String>,
    body: Value,
}

fn handle_connection(stream: TcpStream, state: &Mutex<VaultState>) -> Result<()> {
    stream.set_nonblocking(false).context("blocking stream")?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .context("read timeout")?;
    let request = read_request(&stream)?;
    let reply = {
        let mut guard = lock(state);
        guard.requests.push(RecordedRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            token: request.token.clone(),
            body: request.body.clone(),
        });
        route(&mut guard, &request)
    };
    write_reply(stream, &reply)
}

fn read_request(stream: &TcpStream) -> Result<ParsedRequest> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).context("read request line")?;
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        bail!("malformed request line {line:?}");
    };
    let method = method.to_owned();
    let path = target.split('?').next().unwrap_or(target).to_owned();

    let mut content_length = 0_usize;
    let mut token = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).context("read header")?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => {
                content_length = value.trim().parse().context("content length")?;
            }
            "x-vault-token" => token = Some(value.trim().to_owned()),
            _ => {}
        }
    }

    let mut raw = vec![0_u8; content_length];
    reader.read_exact(&mut raw).context("read body")?;
    let body = if raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&raw).context("decode body")?
    };
    Ok(ParsedRequest {
        method,
        path,
        token,
        body,
    })
}

fn write_reply(mut stream: TcpStream, reply: &Reply) -> Result<()> {
    let body = reply
        .body
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason(reply.status),
        body.len()
    );
    stream.write_all(head.as_bytes()).context("write head")?;
    stream.write_all(body.as_bytes()).context("write body")?;
    stream.flush().context("flush reply")
}

const fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn route(state: &mut VaultState, request: &ParsedRequest) -> Reply {
    let method = request.method.as_str();
    let path = request.path.as_str();
    match (method, path) {
        ("GET", "/v1/sys/init") => Reply::json(200, json!({ "initialized": state.initialized })),
        ("PUT" | "POST", "/v1/sys/init") => initialize(state, &request.body),
        ("GET", "/v1/sys/seal-status") => Reply::json(200, seal_status(state)),
        ("PUT" | "POST", "/v1/sys/unseal") => unseal(state, &request.body),
        ("GET", "/v1/sys/health") => health(state),
        _ => authenticated(state, request),
    }
}

fn authenticated(state: &mut VaultState, request: &ParsedRequest) -> Reply {
    if state.sealed {
        return Reply::error(503, "Vault is sealed");
    }
    if request.token.as_deref() != Some(ROOT_TOKEN) {
        return Reply::error(403, "permission denied");
    }
    let path = request.path.as_str();
    match request.method.as_str() {
        "POST" | "PUT" => {
            if let Some(mount) = path.strip_prefix("/v1/sys/auth/") {
                let kind = request.body["type"].as_str().unwrap_or_default().to_owned();
                if kind.is_empty() {
                    return Reply::error(400, "missing type");
                }
                state.auth_mounts.insert(mount.to_owned(), kind);
                return Reply::no_content();
            }
            if path == "/v1/auth/ldap/config" && state.auth_mounts.contains_key("ldap") {
                state.ldap_config = Some(request.body.clone());
                return Reply::no_content();
            }
            if let Some(group) = path.strip_prefix("/v1/auth/ldap/groups/") {
                if state.auth_mounts.contains_key("ldap") {
                    state
                        .ldap_groups
                        .insert(group.to_owned(), request.body.clone());
                    return Reply::no_content();
                }
            }
            Reply::error(404, "no handler for route")
        }
        _ => Reply::error(404, "no handler for route"),
    }
}

fn initialize(state: &mut VaultState, body: &Value) -> Reply {
    if state.initialized {
        return Reply::error(400, ALREADY_INITIALIZED);
    }
    let shares = body["secret_shares"].as_u64().unwrap_or(0);
    let threshold = body["secret_threshold"].as_u64().unwrap_or(0);
    if threshold == 0 || threshold > shares {
        return Reply::error(400, "invalid share parameters");
    }
    let (Ok(shares), Ok(threshold)) = (usize::try_from(shares), usize::try_from(threshold)) else {
        return Reply::error(400, "invalid share parameters");
    };
    state.initialized = true;
    state.sealed = true;
    state.shares = shares;
    state.threshold = threshold;
    state.keys = (0..shares).map(|index| format!("{index:02x}{}", "ab".repeat(31))).collect();
    state.accepted.clear();
    Reply::json(
        200,
        json!({
            "root_token": ROOT_TOKEN,
            "keys": state.keys,
            "keys_base64": state.keys,
        }),
    )
}

fn seal_status(state: &VaultState) -> Value {
    json!({
        "sealed": state.sealed,
        "initialized": state.initialized,
        "t": state.threshold,
        "n": state.shares,
        "progress": state.accepted.len(),
    })
}

fn unseal(state: &mut VaultState, body: &Value) -> Reply {
    if !state.initialized {
        return Reply::error(400, "Vault is not initialized");
    }
    if !state.sealed {
        return Reply::json(200, seal_status(state));
    }
    let Some(key) = body["key"].as_str() else {
        return Reply::error(400, "missing key");
    };
    if !state.keys.iter().any(|known| known == key) {
        return Reply::error(400, "invalid key");
    }
    if state.accepted.iter().any(|accepted| accepted == key) {
        return Reply::error(400, "key already submitted");
    }
    state.accepted.push(key.to_owned());
    if state.accepted.len() >= state.threshold {
        state.sealed = false;
        state.accepted.clear();
    }
    Reply::json(200, seal_status(state))
}

fn health(state: &VaultState) -> Reply {
    let status = if !state.initialized {
        501
    } else if state.sealed {
        503
    } else {
        200
    };
    Reply::json(
        status,
        json!({
            "initialized": state.initialized,
            "sealed": state.sealed,
            "standby": false,
        }),
    )
}
