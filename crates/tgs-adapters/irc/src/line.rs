//! IRC line model and codec.
//!
//! ```text
//! [@tags ][:prefix ]COMMAND[ param...][ :trailing]\r\n
//! ```

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec};

use crate::error::IrcError;

/// Maximum accepted inbound line length, tags included.
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// One parsed IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcLine {
    /// Parses a line without its terminator. Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        // Message tags are not used.
        if rest.starts_with('@') {
            rest = rest.split_once(' ').map_or("", |(_, r)| r);
        }
        rest = rest.trim_start_matches(' ');

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, r) = stripped.split_once(' ')?;
                rest = r;
                Some(prefix.to_owned())
            }
            None => None,
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_owned).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_owned());
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nickname part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split_once('!').map_or(p, |(nick, _)| nick))
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, conventionally the free-text one.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

/// Whether `target` names a channel rather than a user.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Outbound command builders.
pub mod cmd {
    pub fn pass(password: &str) -> String {
        format!("PASS {password}")
    }

    pub fn nick(nickname: &str) -> String {
        format!("NICK {nickname}")
    }

    pub fn user(nickname: &str) -> String {
        format!("USER {nickname} 0 * :{nickname}")
    }

    pub fn pong(token: &str) -> String {
        format!("PONG :{token}")
    }

    pub fn join(channel: &str, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("JOIN {channel} {key}"),
            None => format!("JOIN {channel}"),
        }
    }

    pub fn part(channel: &str, reason: &str) -> String {
        format!("PART {channel} :{reason}")
    }

    pub fn privmsg(target: &str, text: &str) -> String {
        format!("PRIVMSG {target} :{text}")
    }

    pub fn notice(target: &str, text: &str) -> String {
        format!("NOTICE {target} :{text}")
    }

    pub fn quit(reason: &str) -> String {
        format!("QUIT :{reason}")
    }

    pub fn oper(name: &str, password: &str) -> String {
        format!("OPER {name} {password}")
    }
}

/// Frames IRC lines on a byte stream.
///
/// Decoding accepts `\n` or `\r\n` and skips blank or unparseable lines.
/// Encoding strips embedded line breaks and terminates with `\r\n`.
#[derive(Debug)]
pub struct IrcCodec {
    lines: LinesCodec,
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

impl Decoder for IrcCodec {
    type Item = IrcLine;
    type Error = IrcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<IrcLine>, IrcError> {
        while let Some(line) = self.lines.decode(src)? {
            if let Some(parsed) = IrcLine::parse(&line) {
                return Ok(Some(parsed));
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<IrcLine>, IrcError> {
        while let Some(line) = self.lines.decode_eof(src)? {
            if let Some(parsed) = IrcLine::parse(&line) {
                return Ok(Some(parsed));
            }
        }
        Ok(None)
    }
}

impl Encoder<String> for IrcCodec {
    type Error = IrcError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), IrcError> {
        let line: String = line.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
