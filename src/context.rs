use std::{net::IpAddr, time::Instant};

use http::{HeaderMap, Method};

// Per-request locals threaded through the proxy pipeline; dropped once
// the response is written. `path` is the logical path, with the /proxy
// prefix and credential segment already stripped.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    pub credential: String,
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub client_ip: Option<IpAddr>,
    pub started_at: Instant,
}

impl ProxyContext {
    pub fn new(
        credential: String,
        method: Method,
        path: String,
        query: Option<String>,
        headers: HeaderMap,
        client_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            credential,
            method,
            path,
            query,
            headers,
            client_ip,
            started_at: Instant::now(),
        }
    }
}
