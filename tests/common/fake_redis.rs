//! A small RESP server speaking the subset of Redis the store uses.
//!
//! It runs on a local socket so `RedisStore` can be exercised end to end
//! without a Redis install: the handshake, plain commands, script loading,
//! stalls and restarts on the same port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

#[derive(Default)]
pub struct FakeState {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
    script_loaded: AtomicBool,
    stalled: AtomicBool,
    pub script_loads: AtomicUsize,
    pub script_runs: AtomicUsize,
}

pub struct FakeRedis {
    addr: SocketAddr,
    pub state: Arc<FakeState>,
    server: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap()).await
    }

    pub async fn start_on(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.expect("bind fake redis");
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(FakeState::default());
        let server = tokio::spawn(serve(listener, state.clone()));
        FakeRedis { addr, state, server }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// Keeps answering the connection handshake but leaves every other
    /// command unanswered.
    pub fn stall(&self) {
        self.state.stalled.store(true, Ordering::SeqCst);
    }

    /// Drops the listener and every open connection, returning the address so
    /// a new server can take it over.
    pub async fn stop(self) -> SocketAddr {
        self.server.abort();
        let _ = self.server.await;
        // Let the aborted connection tasks drop their sockets.
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.addr
    }
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn serve(listener: TcpListener, state: Arc<FakeState>) {
    // Dropping the set on abort tears down the open connections too.
    let mut connections = JoinSet::new();
    while let Ok((socket, _)) = listener.accept().await {
        connections.spawn(handle(socket, state.clone()));
    }
}

async fn handle(socket: TcpStream, state: Arc<FakeState>) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);
    while let Some(args) = read_command(&mut reader).await {
        let Some(name) = args.first().map(|name| name.to_ascii_uppercase()) else {
            continue;
        };
        if state.stalled.load(Ordering::SeqCst) && name != "CLIENT" {
            continue;
        }
        let reply = state.execute(&name, &args[1..]);
        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

async fn read_command<R>(reader: &mut R) -> Option<Vec<String>>
where
    R: AsyncBufReadExt + AsyncReadExt + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).ok()?);
    }
    Some(args)
}

fn integer(n: i64) -> String {
    format!(":{}\r\n", n)
}

fn bulk(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("${}\r\n{}\r\n", v.len(), v),
        None => "$-1\r\n".to_string(),
    }
}

const OK: &str = "+OK\r\n";
const NOT_AN_INTEGER: &str = "-ERR value is not an integer or out of range\r\n";

impl FakeState {
    fn execute(&self, name: &str, args: &[String]) -> String {
        match (name, args) {
            ("CLIENT", _) => OK.to_string(),
            ("PING", _) => "+PONG\r\n".to_string(),
            ("INCR", [key]) | ("INCRBY", [key, _]) => self.incr(key).map_or_else(|| NOT_AN_INTEGER.to_string(), integer),
            ("EXPIRE", [key, secs]) => integer(self.expire(key, secs.parse().unwrap_or(0)) as i64),
            ("TTL", [key]) => integer(self.ttl(key)),
            ("GET", [key]) => bulk(self.get(key).as_deref()),
            ("SETEX", [key, secs, value]) => {
                let expires = Instant::now() + Duration::from_secs(secs.parse().unwrap_or(0));
                self.entries.lock().insert(key.clone(), (value.clone(), Some(expires)));
                OK.to_string()
            }
            ("DEL", keys) => {
                let mut entries = self.entries.lock();
                integer(keys.iter().filter(|key| entries.remove(*key).is_some()).count() as i64)
            }
            ("SCRIPT", [sub, _source]) if sub.eq_ignore_ascii_case("LOAD") => {
                self.script_loaded.store(true, Ordering::SeqCst);
                self.script_loads.fetch_add(1, Ordering::SeqCst);
                bulk(Some("0000000000000000000000000000000000000000"))
            }
            ("EVALSHA", [_sha, _numkeys, key, ttl]) => {
                if !self.script_loaded.load(Ordering::SeqCst) {
                    return "-NOSCRIPT No matching script. Please use EVAL.\r\n".to_string();
                }
                self.script_runs.fetch_add(1, Ordering::SeqCst);
                match self.incr(key) {
                    Some(1) => {
                        self.expire(key, ttl.parse().unwrap_or(0));
                        integer(1)
                    }
                    Some(current) => integer(current),
                    None => NOT_AN_INTEGER.to_string(),
                }
            }
            _ => format!("-ERR unknown command '{}'\r\n", name),
        }
    }

    fn purge(&self, key: &str) {
        let mut entries = self.entries.lock();
        let expired = matches!(entries.get(key), Some((_, Some(at))) if *at <= Instant::now());
        if expired {
            entries.remove(key);
        }
    }

    fn incr(&self, key: &str) -> Option<i64> {
        self.purge(key);
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_insert_with(|| ("0".to_string(), None));
        let current = entry.0.parse::<i64>().ok()? + 1;
        entry.0 = current.to_string();
        Some(current)
    }

    fn expire(&self, key: &str, secs: u64) -> bool {
        self.purge(key);
        match self.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.1 = Some(Instant::now() + Duration::from_secs(secs));
                true
            }
            None => false,
        }
    }

    fn ttl(&self, key: &str) -> i64 {
        self.purge(key);
        match self.entries.lock().get(key) {
            None => -2,
            Some((_, None)) => -1,
            Some((_, Some(at))) => {
                let remaining = at.saturating_duration_since(Instant::now()).as_millis() as i64;
                (remaining + 500) / 1000
            }
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.purge(key);
        self.entries.lock().get(key).map(|(value, _)| value.clone())
    }
}
