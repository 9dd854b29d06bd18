//! Minimal HTTP/1.1 server that drops its first connections for integration tests.
//!
//! Every connection has its request (head plus `Content-Length` body) read in
//! full. The first `drop_first` connections are then closed without a
//! response; later ones get the configured reply.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// `200 OK` with the given body.
    Ok(&'static str),
    /// `500 Internal Server Error`, empty body.
    ServerError,
    /// `101 Switching Protocols`, then echo whatever the client sends.
    UpgradeEcho,
}

pub struct FlakyServer {
    pub base_url: String,
    connections: Arc<AtomicUsize>,
}

impl FlakyServer {
    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(drop_first: usize, reply: Reply) -> FlakyServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            thread::spawn(move || handle(stream, n < drop_first, reply));
        }
    });
    FlakyServer {
        base_url: format!("http://127.0.0.1:{}", port),
        connections,
    }
}

fn handle(stream: TcpStream, drop_it: bool, reply: Reply) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut reader = BufReader::new(stream);
    if read_request(&mut reader).is_none() {
        return;
    }
    if drop_it {
        return;
    }
    let mut stream = reader.get_ref().try_clone().expect("clone stream");
    match reply {
        Reply::Ok(body) => {
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
        Reply::ServerError => {
            let _ = stream.write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
        Reply::UpgradeEcho => {
            let _ = stream.write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: tcp\r\n\r\n");
            let mut buf = [0u8; 1024];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        if stream.write_all(&buf[..n]).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Reads the request head and a `Content-Length` body. Returns the head lines.
fn read_request(reader: &mut BufReader<TcpStream>) -> Option<Vec<String>> {
    let mut lines = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        let line = line.trim_end().to_string();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        lines.push(line);
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(lines)
}
