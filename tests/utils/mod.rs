// Integration test utilities

#![allow(dead_code)]

use std::net::TcpListener;

/// A loopback URL nothing is listening on
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback port");
    let addr = listener.local_addr().expect("local address");
    drop(listener);
    format!("http://{}/", addr)
}
