//! Scripted AniDB UDP server

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use shizou_core::Result;
use shizou_core::error::IoError;
use shizou_core::protocol::udp::DatagramTransport;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Server behavior for one request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with the request's tag
    Respond {
        code: u16,
        text: String,
        body: String,
    },
    /// Same as `Respond`, zlib-compressed behind two zero bytes
    Compressed {
        code: u16,
        text: String,
        body: String,
    },
    /// Answer with another tag; the next reply in the script follows it
    Mismatched {
        code: u16,
        text: String,
        body: String,
    },
    /// Send these bytes verbatim; the next reply in the script follows them
    Raw(Vec<u8>),
    /// Never answer
    Silent,
    /// Fail the receive
    RecvError,
    /// Fail the send
    SendError,
}

impl Reply {
    pub fn respond(code: u16, text: &str, body: &str) -> Self {
        Self::Respond {
            code,
            text: text.to_string(),
            body: body.to_string(),
        }
    }

    pub fn compressed(code: u16, text: &str, body: &str) -> Self {
        Self::Compressed {
            code,
            text: text.to_string(),
            body: body.to_string(),
        }
    }

    pub fn mismatched(code: u16, text: &str, body: &str) -> Self {
        Self::Mismatched {
            code,
            text: text.to_string(),
            body: body.to_string(),
        }
    }

    /// `200` login with the given session key
    pub fn login(session: &str) -> Self {
        Self::respond(200, &format!("{session} LOGIN ACCEPTED"), "")
    }
}

enum Pending {
    Datagram(Vec<u8>),
    Error,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    pending: VecDeque<Pending>,
    sent: Vec<String>,
}

/// In-memory transport answering from a script
///
/// Each send consumes one scripted reply (plus any `Mismatched` or `Raw`
/// replies in front of it). A receive with nothing queued reports a timeout at once.
#[derive(Default)]
pub struct ScriptedDatagramTransport {
    script: Mutex<Script>,
}

impl ScriptedDatagramTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(Script {
                replies: replies.into_iter().collect(),
                ..Default::default()
            }),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Append replies
    pub fn push(&self, reply: Reply) {
        self.script().replies.push_back(reply);
    }

    /// Every request sent so far, as text
    pub fn sent(&self) -> Vec<String> {
        self.script().sent.clone()
    }

    /// Command names of the requests sent so far
    pub fn commands(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|request| request.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.script().replies.len()
    }
}

/// Value of the `tag` parameter of an encoded request
pub fn request_tag(request: &str) -> Option<&str> {
    let (_, params) = request.split_once(' ')?;
    params
        .split('&')
        .find_map(|pair| pair.strip_prefix("tag="))
}

fn response_text(tag: &str, code: u16, text: &str, body: &str) -> String {
    let mut line = format!("{tag} {code}");
    if !text.is_empty() {
        line.push(' ');
        line.push_str(text);
    }
    if body.is_empty() {
        line
    } else {
        format!("{line}\n{body}")
    }
}

fn other_tag(tag: &str) -> &'static str {
    if tag == "ffffffff" { "00000000" } else { "ffffffff" }
}

#[async_trait]
impl DatagramTransport for ScriptedDatagramTransport {
    async fn send(&self, payload: &[u8]) -> Result<()> {
        let request = String::from_utf8_lossy(payload).into_owned();
        let tag = request_tag(&request).unwrap_or("00000000").to_string();
        let mut script = self.script();
        script.sent.push(request);

        loop {
            let Some(reply) = script.replies.pop_front() else {
                return Ok(());
            };
            match reply {
                Reply::Respond { code, text, body } => {
                    let datagram = response_text(&tag, code, &text, &body).into_bytes();
                    script.pending.push_back(Pending::Datagram(datagram));
                }
                Reply::Compressed { code, text, body } => {
                    let mut encoder = ZlibEncoder::new(vec![0, 0], Compression::default());
                    encoder.write_all(response_text(&tag, code, &text, &body).as_bytes())?;
                    script.pending.push_back(Pending::Datagram(encoder.finish()?));
                }
                Reply::Mismatched { code, text, body } => {
                    let datagram = response_text(other_tag(&tag), code, &text, &body).into_bytes();
                    script.pending.push_back(Pending::Datagram(datagram));
                    continue;
                }
                Reply::Raw(bytes) => {
                    script.pending.push_back(Pending::Datagram(bytes));
                    continue;
                }
                Reply::Silent => {}
                Reply::RecvError => script.pending.push_back(Pending::Error),
                Reply::SendError => {
                    return Err(IoError::network("scripted", None).into());
                }
            }
            return Ok(());
        }
    }

    async fn recv(&self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        match self.script().pending.pop_front() {
            Some(Pending::Datagram(datagram)) => Ok(Some(datagram)),
            Some(Pending::Error) => Err(IoError::network("scripted", None).into()),
            None => Ok(None),
        }
    }
}
