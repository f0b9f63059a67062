#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, TcpListener};
#[cfg(unix)]
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Reads a SOCKS5 greeting and CONNECT request and returns the target as
/// `host:port`.
pub fn read_request<S: Read + Write>(conn: &mut S) -> io::Result<String> {
    let mut greeting = [0u8; 3];
    conn.read_exact(&mut greeting)?;
    assert_eq!(greeting, [5, 1, 0]);
    conn.write_all(&[5, 0])?;

    let mut header = [0u8; 4];
    conn.read_exact(&mut header)?;
    assert_eq!(&header[..3], &[5, 1, 0]);

    let host = match header[3] {
        1 => {
            let mut octets = [0u8; 4];
            conn.read_exact(&mut octets)?;
            Ipv4Addr::from(octets).to_string()
        }
        4 => {
            let mut octets = [0u8; 16];
            conn.read_exact(&mut octets)?;
            format!("[{}]", Ipv6Addr::from(octets))
        }
        3 => {
            let mut len = [0u8; 1];
            conn.read_exact(&mut len)?;
            let mut name = vec![0u8; len[0] as usize];
            conn.read_exact(&mut name)?;
            String::from_utf8(name).expect("domain is utf-8")
        }
        other => panic!("unexpected address type {}", other),
    };

    let mut port = [0u8; 2];
    conn.read_exact(&mut port)?;
    Ok(format!("{}:{}", host, u16::from_be_bytes(port)))
}

/// Fake proxy: answers every CONNECT with `status`; on success it sends
/// the requested target back as the first tunnelled line. Returns the
/// proxy address.
pub fn spawn_proxy(status: u8, connections: usize) -> (String, thread::JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake proxy");
    let addr = listener.local_addr().unwrap().to_string();

    let handle = thread::spawn(move || {
        let mut workers = Vec::new();
        for _ in 0..connections {
            let (conn, _) = listener.accept().expect("accept");
            workers.push(thread::spawn(move || serve(conn, status)));
        }
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    (addr, handle)
}

/// Same as [`spawn_proxy`] for a single connection on a Unix socket.
#[cfg(unix)]
pub fn spawn_unix_proxy(status: u8) -> (PathBuf, thread::JoinHandle<Vec<u8>>) {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let path = std::env::temp_dir().join(format!(
        "socks5-dial-{}-{}.sock",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).expect("bind fake unix proxy");

    let handle = thread::spawn(move || {
        let (conn, _) = listener.accept().expect("accept");
        serve(conn, status)
    });

    (path, handle)
}

/// Serves one connection and returns whatever the client sent after the
/// proxy replied.
fn serve<S: Read + Write>(mut conn: S, status: u8) -> Vec<u8> {
    let target = match read_request(&mut conn) {
        Ok(target) => target,
        Err(_) => return Vec::new(),
    };
    conn.write_all(&[5, status, 0, 1, 127, 0, 0, 1, 0x04, 0x38])
        .unwrap();
    if status == 0 {
        conn.write_all(format!("{}\n", target).as_bytes()).unwrap();
    }

    let mut rest = Vec::new();
    let _ = conn.read_to_end(&mut rest);
    rest
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
