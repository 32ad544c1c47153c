
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

/// What the test server answers on a route.
#[derive(Debug, Clone)]
pub enum Reply {
    /// `text/event-stream` body written chunk by chunk, then held open for
    /// `hold` before a graceful close.
    Events {
        chunks: Vec<String>,
        hold: Duration,
    },
    Json {
        status: u16,
        body: String,
    },
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct Route {
    pub method: &'static str,
    pub path: String,
    pub reply: Reply,
}

impl Route {
    pub fn get(path: impl Into<String>, reply: Reply) -> Self {
        Self {
            method: "GET",
            path: path.into(),
            reply,
        }
    }

    pub fn post(path: impl Into<String>, reply: Reply) -> Self {
        Self {
            method: "POST",
            path: path.into(),
            reply,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub method: String,
    /// Path including the query string.
    pub target: String,
    /// Lower-cased `name: value` pairs.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub type Requests = Arc<Mutex<Vec<Recorded>>>;

pub struct ServerHandle {
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
    requests: Requests,
}

impl ServerHandle {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a thread-per-connection HTTP server answering the given routes.
/// Unknown routes get a 404.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_server(routes: Vec<Route>) -> Result<(String, ServerHandle), String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);
    let recorded = Arc::clone(&requests);

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    let routes = Arc::clone(&routes);
                    let recorded = Arc::clone(&recorded);
                    thread::spawn(move || handle_client(stream, &routes, &recorded));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(_) => break,
            }
        }
    });

    Ok((
        format!("http://{}", addr),
        ServerHandle {
            shutdown: shutdown_tx,
            thread: Some(handle),
            requests,
        },
    ))
}

/// Like [`spawn_server`], but returns `None` where the sandbox forbids
/// binding a local socket.
///
/// # Errors
///
/// Returns any other setup error.
pub fn spawn_server_or_skip(routes: Vec<Route>) -> Result<Option<(String, ServerHandle)>, String> {
    match TcpListener::bind("127.0.0.1:0") {
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            eprintln!("Skipping: cannot bind local test server: {}", err);
            return Ok(None);
        }
        Err(err) => return Err(format!("bind test server failed: {}", err)),
        Ok(probe) => drop(probe),
    }
    spawn_server(routes).map(Some)
}

fn handle_client(mut stream: TcpStream, routes: &[Route], recorded: &Mutex<Vec<Recorded>>) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let Some(request) = read_request(&mut stream) else {
        return;
    };
    let path = request
        .target
        .split_once('?')
        .map_or(request.target.as_str(), |(path, _)| path)
        .to_owned();
    let method = request.method.clone();
    recorded
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(request);

    let reply = routes
        .iter()
        .find(|route| route.method == method && route.path == path)
        .map_or(Reply::Status(404), |route| route.reply.clone());
    drop(write_reply(&mut stream, &reply));
    drop(stream.shutdown(Shutdown::Both));
}

fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut raw = Vec::new();
    let mut buffer = [0u8; 1024];
    let header_end = loop {
        let read = stream.read(&mut buffer).ok()?;
        if read == 0 {
            return None;
        }
        raw.extend_from_slice(buffer.get(..read)?);
        if let Some(pos) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(raw.get(..header_end)?).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_owned();
    let target = request_line.next()?.to_owned();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_owned()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = raw.get(header_end.saturating_add(4)..)?.to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut buffer).ok()?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(buffer.get(..read)?);
    }

    Some(Recorded {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_reply(stream: &mut TcpStream, reply: &Reply) -> std::io::Result<()> {
    match reply {
        Reply::Events { chunks, hold } => {
            stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
            )?;
            stream.flush()?;
            for chunk in chunks {
                stream.write_all(chunk.as_bytes())?;
                stream.flush()?;
                thread::sleep(Duration::from_millis(5));
            }
            thread::sleep(*hold);
            Ok(())
        }
        Reply::Json { status, body } => {
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason(*status),
                body.len()
            );
            stream.write_all(head.as_bytes())?;
            stream.write_all(body.as_bytes())?;
            stream.flush()
        }
        Reply::Status(status) => {
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status,
                reason(*status)
            );
            stream.write_all(head.as_bytes())?;
            stream.flush()
        }
    }
}

const fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

pub fn data_frame(payload: &str) -> String {
    format!("data: {}\n\n", payload)
}

pub fn snapshot_json(test_id: &str, total: u64) -> String {
    format!(
        concat!(
            "{{\"test_id\":\"{}\",\"timestamp\":\"2026-03-01T12:00:00Z\",\"workers\":[],",
            "\"summary\":{{\"total_requests\":{},\"successful_requests\":{},",
            "\"failed_requests\":0,\"overall_error_rate\":0.0,\"avg_response_time\":0.015,",
            "\"requests_per_second\":2.5,\"status_code_breakdown\":{{\"200\":{}}},",
            "\"active_workers\":2}}}}"
        ),
        test_id, total, total, total
    )
}

/// Run the `loadwatch` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_loadwatch<I, S>(args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = loadwatch_bin()?;
    Command::new(bin)
        .args(args)
        .current_dir(std::env::temp_dir())
        .env("RUST_LOG", "error")
        .env_remove("LOADWATCH_LOG")
        .env_remove("LOADWATCH_TOKEN")
        .env_remove("LOADWATCH_BASE_URL")
        .output()
        .map_err(|err| format!("run loadwatch failed: {}", err))
}

fn loadwatch_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_loadwatch").map_or_else(
        || Err("CARGO_BIN_EXE_loadwatch missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}

pub fn load_test_json(id: &str, status: &str) -> String {
    format!(
        concat!(
            "{{\"id\":\"{}\",\"name\":\"checkout\",\"user_id\":\"u1\",",
            "\"target_url\":\"https://shop.example.com\",",
            "\"config\":{{\"duration\":60,\"requests_per_sec\":100,\"max_concurrency\":10,",
            "\"worker_count\":2,\"http_method\":\"GET\"}},",
            "\"status\":\"{}\",\"created_at\":\"2026-03-01T12:00:00Z\"}}"
        ),
        id, status
    )
}

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `cond` until it holds or [`WAIT_TIMEOUT`] elapses.
///
/// # Errors
///
/// Returns an error naming `what` on timeout.
pub async fn wait_until<F>(what: &str, mut cond: F) -> Result<(), String>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            return Err(format!("Timed out waiting for {}", what));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
