//! Minimal passive-mode FTP retrieval
//!
//! Supports exactly what dataset mirrors need: login (anonymous unless the
//! URL carries credentials), binary mode, `PASV` and `RETR` of one file.

use percent_encoding::percent_decode_str;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use super::downloader::CONNECT_TIMEOUT;
use super::progress::ProgressObserver;
use crate::error::{TransferError, TransportErrorKind};

const DEFAULT_PORT: u16 = 21;
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug)]
struct Reply {
    code: u16,
    text: String,
}

struct Control {
    url: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Control {
    fn error(&self, kind: TransportErrorKind, message: impl Into<String>) -> TransferError {
        TransferError::Transport {
            url: self.url.clone(),
            kind,
            message: message.into(),
        }
    }

    fn io_error(&self, error: std::io::Error) -> TransferError {
        self.error(TransportErrorKind::Connection, error.to_string())
    }

    async fn read_reply(&mut self) -> Result<Reply, TransferError> {
        let mut first = String::new();
        let n = self
            .reader
            .read_line(&mut first)
            .await
            .map_err(|e| self.io_error(e))?;
        if n == 0 {
            return Err(self.error(
                TransportErrorKind::Connection,
                "Connection closed by server",
            ));
        }

        let code = parse_code(&first)
            .ok_or_else(|| self.error(TransportErrorKind::Protocol, first.trim_end().to_string()))?;
        let mut text = first.trim_end().to_string();

        // Multi-line replies start with `NNN-` and end with `NNN `
        if first.as_bytes().get(3) == Some(&b'-') {
            let terminator = format!("{code} ");
            loop {
                let mut line = String::new();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .map_err(|e| self.io_error(e))?;
                if n == 0 {
                    return Err(self.error(
                        TransportErrorKind::Connection,
                        "Connection closed by server",
                    ));
                }
                text.push('\n');
                text.push_str(line.trim_end());
                if line.starts_with(&terminator) {
                    break;
                }
            }
        }

        Ok(Reply { code, text })
    }

    async fn command(&mut self, command: &str) -> Result<Reply, TransferError> {
        let shown = if command.starts_with("PASS ") {
            "PASS ****"
        } else {
            command
        };
        debug!(url = %self.url, command = shown, "FTP command");

        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        self.read_reply().await
    }

    /// Send `command` and require one of the `expected` reply codes
    async fn expect(&mut self, command: &str, expected: &[u16]) -> Result<Reply, TransferError> {
        let reply = self.command(command).await?;
        self.check(reply, expected)
    }

    fn check(&self, reply: Reply, expected: &[u16]) -> Result<Reply, TransferError> {
        if expected.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(self.error(TransportErrorKind::Status(reply.code), reply.text))
        }
    }
}

fn parse_code(line: &str) -> Option<u16> {
    line.get(..3)?.parse().ok()
}

/// Data address from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply
fn parse_pasv(text: &str) -> Option<SocketAddr> {
    let start = text.find('(')?;
    let end = text[start..].find(')')? + start;
    let numbers: Vec<u8> = text[start + 1..end]
        .split(',')
        .map(|n| n.trim().parse())
        .collect::<Result<_, _>>()
        .ok()?;

    let [h1, h2, h3, h4, p1, p2] = numbers.as_slice() else {
        return None;
    };
    let ip = Ipv4Addr::new(*h1, *h2, *h3, *h4);
    let port = u16::from(*p1) << 8 | u16::from(*p2);
    Some(SocketAddr::from((ip, port)))
}

async fn connect(url: &str, host: &str, port: u16) -> Result<TcpStream, TransferError> {
    let connection_error = |message: String| TransferError::Transport {
        url: url.to_string(),
        kind: TransportErrorKind::Connection,
        message,
    };

    tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| connection_error(format!("Timed out connecting to {host}:{port}")))?
        .map_err(|e| connection_error(e.to_string()))
}

/// Retrieve `url` into `dest`, returning the number of bytes received
pub(crate) async fn fetch(
    url: &Url,
    dest: &Path,
    progress: &mut dyn ProgressObserver,
) -> Result<u64, TransferError> {
    let url_text = url.as_str();
    let host = url.host_str().ok_or_else(|| TransferError::InvalidUrl {
        url: url_text.to_string(),
    })?;
    let port = url.port().unwrap_or(DEFAULT_PORT);
    let path = percent_decode_str(url.path()).decode_utf8_lossy().into_owned();

    let user = match url.username() {
        "" => "anonymous".to_string(),
        name => percent_decode_str(name).decode_utf8_lossy().into_owned(),
    };
    let password = match url.password() {
        Some(pass) => percent_decode_str(pass).decode_utf8_lossy().into_owned(),
        None => "anonymous@".to_string(),
    };

    let stream = connect(url_text, host, port).await?;
    let (read_half, write_half) = stream.into_split();
    let mut control = Control {
        url: url_text.to_string(),
        reader: BufReader::new(read_half),
        writer: write_half,
    };

    let greeting = control.read_reply().await?;
    control.check(greeting, &[220])?;

    let login = control.command(&format!("USER {user}")).await?;
    if login.code == 331 {
        control.expect(&format!("PASS {password}"), &[230, 202]).await?;
    } else {
        control.check(login, &[230])?;
    }

    control.expect("TYPE I", &[200]).await?;

    let total = match control.command(&format!("SIZE {path}")).await? {
        reply if reply.code == 213 => reply.text.get(4..).and_then(|s| s.trim().parse().ok()),
        _ => None,
    };

    let pasv = control.expect("PASV", &[227]).await?;
    let data_addr = parse_pasv(&pasv.text)
        .ok_or_else(|| control.error(TransportErrorKind::Protocol, pasv.text.clone()))?;
    // Some servers answer with an unroutable address; reuse the control host
    let data_host = if data_addr.ip().is_unspecified() {
        host.to_string()
    } else {
        data_addr.ip().to_string()
    };
    let mut data = connect(url_text, &data_host, data_addr.port()).await?;

    control.expect(&format!("RETR {path}"), &[125, 150]).await?;

    let io_err = |source| TransferError::Io {
        path: dest.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut received = 0u64;
    progress.advanced(received, total);
    loop {
        let n = data
            .read(&mut buffer)
            .await
            .map_err(|e| control.io_error(e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n]).await.map_err(io_err)?;
        received += n as u64;
        progress.advanced(received, total);
    }
    file.flush().await.map_err(io_err)?;
    drop(data);

    let done = control.read_reply().await?;
    control.check(done, &[226, 250])?;

    if let Err(e) = control.command("QUIT").await {
        debug!(error = %e, "Ignoring failed FTP QUIT");
    }

    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::NoProgress;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_pasv() {
        let addr = parse_pasv("227 Entering Passive Mode (192,168,1,20,195,80).").unwrap();
        assert_eq!(addr, "192.168.1.20:50000".parse().unwrap());

        assert!(parse_pasv("227 Entering Passive Mode").is_none());
        assert!(parse_pasv("227 (1,2,3,4,5)").is_none());
        assert!(parse_pasv("227 (1,2,3,4,5,300)").is_none());
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code("220 Welcome\r\n"), Some(220));
        assert_eq!(parse_code("22"), None);
        assert_eq!(parse_code("abc def"), None);
    }

    /// Serve one RETR of `payload` the way a typical anonymous mirror does
    async fn serve_once(control: TcpListener, payload: &'static [u8]) {
        let (socket, _) = control.accept().await.unwrap();
        let (read_half, mut writer) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        writer
            .write_all(b"220-Welcome\r\n220 Ready\r\n")
            .await
            .unwrap();

        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data_listener.local_addr().unwrap().port();

        let mut line = String::new();
        while reader.read_line(&mut line).await.unwrap() > 0 {
            let command = line.trim_end().to_string();
            line.clear();
            let reply = match command.split(' ').next().unwrap() {
                "USER" => "331 Password required\r\n".to_string(),
                "PASS" => "230 Logged in\r\n".to_string(),
                "TYPE" => "200 Binary\r\n".to_string(),
                "SIZE" => format!("213 {}\r\n", payload.len()),
                "PASV" => format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                    data_port >> 8,
                    data_port & 0xff
                ),
                "RETR" => {
                    assert_eq!(command, "RETR /pub/data file.bin");
                    writer.write_all(b"150 Opening\r\n").await.unwrap();
                    let (mut data, _) = data_listener.accept().await.unwrap();
                    data.write_all(payload).await.unwrap();
                    drop(data);
                    "226 Transfer complete\r\n".to_string()
                }
                "QUIT" => {
                    writer.write_all(b"221 Bye\r\n").await.unwrap();
                    return;
                }
                other => format!("502 {other} not implemented\r\n"),
            };
            writer.write_all(reply.as_bytes()).await.unwrap();
        }
    }

    #[derive(Default)]
    struct Recorder {
        updates: Vec<(u64, Option<u64>)>,
    }

    impl ProgressObserver for Recorder {
        fn advanced(&mut self, bytes: u64, total: Option<u64>) {
            self.updates.push((bytes, total));
        }
    }

    #[tokio::test]
    async fn test_fetch_from_passive_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, b"hello dataset"));

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.bin");
        let url = Url::parse(&format!("ftp://127.0.0.1:{port}/pub/data%20file.bin")).unwrap();

        let mut recorder = Recorder::default();
        let received = fetch(&url, &dest, &mut recorder).await.unwrap();
        server.await.unwrap();

        assert_eq!(received, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello dataset");
        assert_eq!(recorder.updates.first(), Some(&(0, Some(13))));
        assert_eq!(recorder.updates.last(), Some(&(13, Some(13))));
    }

    #[tokio::test]
    async fn test_rejected_greeting_reports_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"530 Not logged in\r\n").await.unwrap();
        });

        let temp = TempDir::new().unwrap();
        let url = Url::parse(&format!("ftp://127.0.0.1:{port}/a.bin")).unwrap();
        let err = fetch(&url, &temp.path().join("a.bin"), &mut NoProgress)
            .await
            .unwrap_err();
        server.await.unwrap();

        assert_eq!(err.transport_kind(), Some(TransportErrorKind::Status(530)));
    }
}
