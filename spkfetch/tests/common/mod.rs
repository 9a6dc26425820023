//! Scripted fake peers for end-to-end tests: a Horizons-like prompt
//! service and a minimal FTP server, both on loopback.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use spkfetch::{Config, Endpoint};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One turn of a fake dialogue.
#[derive(Debug, Clone)]
pub enum Turn {
    /// Write text to the client.
    Say(String),

    /// Read this many lines from the client.
    Hear(usize),

    /// Stay silent for a while, so the next text arrives separately.
    Pause(Duration),
}

pub fn say(text: impl Into<String>) -> Turn {
    Turn::Say(text.into())
}

/// A fake prompt service that runs its turns for one client, then
/// records everything else the client sends until it disconnects.
pub struct FakeService {
    pub addr: SocketAddr,
    handle: JoinHandle<Vec<String>>,
}

impl FakeService {
    pub async fn spawn(turns: Vec<Turn>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut reader = BufReader::new(read);
            let mut heard = Vec::new();

            for turn in turns {
                match turn {
                    Turn::Say(text) => {
                        if write.write_all(text.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Turn::Pause(delay) => tokio::time::sleep(delay).await,
                    Turn::Hear(lines) => {
                        for _ in 0..lines {
                            match read_line(&mut reader).await {
                                Some(line) => heard.push(line),
                                None => return heard,
                            }
                        }
                    }
                }
            }

            while let Some(line) = read_line(&mut reader).await {
                heard.push(line);
            }
            heard
        });
        Self { addr, handle }
    }

    /// Lines the client sent, once it has disconnected.
    pub async fn heard(self) -> Vec<String> {
        self.handle.await.unwrap()
    }
}

async fn read_line<R>(reader: &mut R) -> Option<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    match reader.read_until(b'\n', &mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(
            String::from_utf8_lossy(&line)
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        ),
    }
}

/// Object identifiers the fake service assigns to user elements. Distinct
/// across calls, like the random identifiers of the real service.
pub fn assign_id() -> String {
    static NEXT: AtomicU32 = AtomicU32::new(0);
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let offset = (u64::from(seed % 1000) + u64::from(n) * 104_729) % 1_000_000;
    (3_000_000 + offset).to_string()
}

pub const BANNER: &str = "\r\n JPL Horizons, version 4.70\r\n Type `?' for brief intro\r\n\r\nHorizons> ";
pub const MENU: &str =
    "\r\n Select ... [A]pproaches, [E]phemeris, [F]tp, [M]ail, [R]edisplay, [S]PK,?, <cr>: ";
pub const CONTACT: &str = "\r\n Confirm e-mail address [Yes(<cr>),No,?] : ";
pub const FORMAT: &str = "\r\n SPK text transfer format  [YES,NO,?] : ";
pub const START: &str = "\r\n SPK object START [ t >= 1900-Jan-01, t < 2100-Jan-01 ] : ";
pub const STOP: &str = "\r\n SPK object STOP  [ t > 2020-Jan-01, t <= 2100-Jan-01 ] : ";
pub const MORE: &str = "\r\n Add more objects to file  [YES,NO,?] : ";

pub fn generated(id: &str, file: &str) -> String {
    format!(
        "\r\n Integrating ...\r\n   SPK ID : {id}\r\n File type : binary\r\n File name : {file}\r\n\r\n [R]edisplay, ? : "
    )
}

/// The complete catalogue-lookup dialogue, ending in a produced file.
pub fn catalogue_dialogue(label: &str, file: &str) -> Vec<Turn> {
    let mut turns = catalogue_prompts(label);
    turns.extend([say(generated(label, file)), Turn::Hear(1)]);
    turns
}

/// The catalogue dialogue up to and including the answer to the
/// "more objects" question.
pub fn catalogue_prompts(label: &str) -> Vec<Turn> {
    vec![
        say(BANNER),
        Turn::Hear(1),
        say(format!("\r\n Target body name: {label}\r\n{MENU}")),
        Turn::Hear(1),
        say(CONTACT),
        Turn::Hear(1),
        say(FORMAT),
        Turn::Hear(1),
        say(START),
        Turn::Hear(1),
        say(STOP),
        Turn::Hear(1),
        say(MORE),
        Turn::Hear(1),
    ]
}

/// The user-elements dialogue; the service assigns `id`.
pub fn elements_dialogue(element_lines: usize, id: &str, file: &str) -> Vec<Turn> {
    vec![
        say(BANNER),
        Turn::Hear(1),
        say("\r\n Object name  <cr>=(none) : "),
        Turn::Hear(1),
        say("\r\n Enter elements, one per line, <cr> when done : "),
        Turn::Hear(element_lines + 1),
        say(MENU),
        Turn::Hear(1),
        say(CONTACT),
        Turn::Hear(1),
        say(FORMAT),
        Turn::Hear(1),
        say(START),
        Turn::Hear(1),
        say(STOP),
        Turn::Hear(1),
        say(MORE),
        Turn::Hear(1),
        say(generated(id, file)),
        Turn::Hear(1),
    ]
}

/// Behaviour of the fake FTP server.
#[derive(Debug, Clone, Default)]
pub struct FtpBehaviour {
    /// Files in the remote directory.
    pub files: HashMap<String, Vec<u8>>,

    /// Answer the first active-mode fetch with 425.
    pub refuse_active: bool,

    /// Announce the first active-mode fetch with 150, then give up on
    /// the data connection with 425.
    pub refuse_after_opening: bool,

    /// Answer every fetch with 425.
    pub refuse_every_fetch: bool,
}

/// A fake FTP server for one client session.
pub struct FakeFtp {
    pub addr: SocketAddr,
    handle: JoinHandle<Vec<String>>,
}

impl FakeFtp {
    pub async fn spawn(behaviour: FtpBehaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve_ftp(stream, behaviour).await
        });
        Self { addr, handle }
    }

    /// Commands the client sent, once the session has ended.
    pub async fn commands(self) -> Vec<String> {
        self.handle.await.unwrap()
    }
}

async fn serve_ftp(stream: TcpStream, mut behaviour: FtpBehaviour) -> Vec<String> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut commands = Vec::new();
    let mut active: Option<SocketAddr> = None;
    let mut passive: Option<TcpListener> = None;

    let _ = write
        .write_all(b"220-Solar System Dynamics archive\r\n220 Ready\r\n")
        .await;

    while let Some(line) = read_line(&mut reader).await {
        commands.push(line.clone());
        let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));

        let reply: String = match verb {
            "USER" => "331 Password required\r\n".into(),
            "PASS" => "230 Guest login ok\r\n".into(),
            "TYPE" => format!("200 Type set to {arg}\r\n"),
            "CWD" if arg == "pub/ssd" => "250 CWD command successful\r\n".into(),
            "CWD" => "550 No such directory\r\n".into(),
            "PORT" => {
                let fields: Vec<u16> = arg.split(',').map(|f| f.parse().unwrap()).collect();
                let ip = format!("{}.{}.{}.{}", fields[0], fields[1], fields[2], fields[3]);
                active = Some(format!("{ip}:{}", fields[4] * 256 + fields[5]).parse().unwrap());
                "200 PORT command successful\r\n".into()
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                passive = Some(listener);
                // A private address, as seen behind a translating gateway.
                format!(
                    "227 Entering Passive Mode (10,0,0,7,{},{})\r\n",
                    port / 256,
                    port % 256
                )
            }
            "RETR" => {
                let Some(contents) = behaviour.files.get(arg).cloned() else {
                    let _ = write.write_all(b"550 No such file\r\n").await;
                    continue;
                };
                if behaviour.refuse_every_fetch {
                    active = None;
                    passive = None;
                    let _ = write.write_all(b"425 Can't open data connection\r\n").await;
                    continue;
                }
                if let Some(addr) = active.take() {
                    if std::mem::take(&mut behaviour.refuse_active) {
                        let _ = write.write_all(b"425 Can't open data connection\r\n").await;
                        continue;
                    }
                    if std::mem::take(&mut behaviour.refuse_after_opening) {
                        let _ = write.write_all(b"150 Opening data connection\r\n").await;
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        let _ = write.write_all(b"425 Can't open data connection\r\n").await;
                        continue;
                    }
                    let _ = write.write_all(b"150 Opening data connection\r\n").await;
                    let mut data = TcpStream::connect(addr).await.unwrap();
                    data.write_all(&contents).await.unwrap();
                    data.shutdown().await.unwrap();
                } else if let Some(listener) = passive.take() {
                    let (mut data, _) = listener.accept().await.unwrap();
                    let _ = write.write_all(b"150 Opening data connection\r\n").await;
                    data.write_all(&contents).await.unwrap();
                    data.shutdown().await.unwrap();
                } else {
                    let _ = write.write_all(b"425 Use PORT or PASV first\r\n").await;
                    continue;
                }
                "226 Transfer complete\r\n".into()
            }
            "QUIT" => {
                let _ = write.write_all(b"221 Goodbye\r\n").await;
                break;
            }
            _ => "502 Command not implemented\r\n".into(),
        };
        if write.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
    commands
}

/// A configuration pointing at the fakes, with short timeouts.
pub fn config(primary: SocketAddr, ftp: SocketAddr) -> Config {
    let mut config = Config::default();
    config.primary.endpoint = Endpoint::new("127.0.0.1", primary.port());
    config.primary.connect_timeout_secs = 5;
    config.primary.banner_timeout_secs = 5;
    config.primary.step_timeout_secs = 5;
    config.primary.generate_timeout_secs = 5;
    config.transfer.endpoint = Endpoint::new("127.0.0.1", ftp.port());
    config.transfer.connect_timeout_secs = 5;
    config.transfer.step_timeout_secs = 5;
    config.transfer.data_timeout_secs = 5;
    config
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub const SHORT: Duration = Duration::from_millis(200);
