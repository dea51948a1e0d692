use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

// Minimal scripted HTTP/1.1 partner: answers one canned response per
// accepted connection, in order, and records what the client sent.

#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScriptedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.head.lines().find_map(|line| {
            line.to_ascii_lowercase()
                .starts_with(&prefix)
                .then(|| line[prefix.len()..].trim().to_string())
        })
    }

    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }
}

pub struct PartnerStub {
    pub base_url: String,
    handle: JoinHandle<Vec<RecordedRequest>>,
}

impl PartnerStub {
    pub fn finish(self) -> Vec<RecordedRequest> {
        self.handle.join().expect("partner stub thread must finish")
    }
}

pub fn spawn_partner_stub(responses: Vec<ScriptedResponse>) -> PartnerStub {
    let listener = TcpListener::bind("127.0.0.1:0").expect("stub listener must bind");
    let port = listener
        .local_addr()
        .expect("stub listener addr must be available")
        .port();

    let handle = std::thread::spawn(move || {
        let mut recorded = Vec::new();

        for response in responses {
            let (mut stream, _) = listener.accept().expect("stub must accept a connection");
            recorded.push(read_request(&mut stream));
            write_response(&mut stream, &response);
        }

        recorded
    });

    PartnerStub {
        base_url: format!("http://127.0.0.1:{port}"),
        handle,
    }
}

// An endpoint nothing listens on, for transport-failure tests.
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("probe listener must bind");
    let port = listener
        .local_addr()
        .expect("probe listener addr must be available")
        .port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let mut raw = Vec::new();
    let mut buffer = [0_u8; 1024];

    let head_end = loop {
        let read = stream.read(&mut buffer).expect("stub must read request");
        if read == 0 {
            break raw.len();
        }
        raw.extend_from_slice(&buffer[..read]);
        if let Some(position) = find_head_end(&raw) {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            line.to_ascii_lowercase()
                .strip_prefix("content-length:")
                .map(|value| value.trim().parse::<usize>().unwrap_or(0))
        })
        .unwrap_or(0);

    let mut body = raw[(head_end + 4).min(raw.len())..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut buffer).expect("stub must read request body");
        if read == 0 {
            break;
        }
        body.extend_from_slice(&buffer[..read]);
    }

    RecordedRequest {
        head,
        body: String::from_utf8_lossy(&body).to_string(),
    }
}

fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}

fn write_response(stream: &mut TcpStream, response: &ScriptedResponse) {
    let reason = match response.status {
        200 => "OK",
        503 => "Service Unavailable",
        _ => "Status",
    };

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");

    stream
        .write_all(head.as_bytes())
        .expect("stub must write response head");
    stream
        .write_all(response.body.as_bytes())
        .expect("stub must write response body");
    stream.flush().expect("stub must flush response");
}
