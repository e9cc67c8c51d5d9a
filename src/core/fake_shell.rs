//! In-memory stand-in for PowerShell used by the session tests
//!
//! Speaks just enough of the framing protocol: a handful of statements,
//! the boundary trailer, `chcp` and `exit`.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use encoding_rs::Encoding;

use super::process::Transport;

pub struct ChannelWriter(Sender<Vec<u8>>);

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "reader gone"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.pending.len() {
            match self.rx.recv() {
                Ok(data) => {
                    self.pending = data;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

pub fn pipe() -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = mpsc::channel();
    (
        ChannelWriter(tx),
        ChannelReader {
            rx,
            pending: Vec::new(),
            pos: 0,
        },
    )
}

pub struct FakeShell {
    /// Code page reported by `chcp`
    pub code_page: u32,
    /// Encoding used for everything the fake reads and writes
    pub encoding: &'static Encoding,
    /// Deliver output one byte per write
    pub trickle: bool,
    /// Boundary tokens seen, in order
    pub boundaries: Arc<Mutex<Vec<String>>>,
}

impl FakeShell {
    pub fn new(code_page: u32, encoding: &'static Encoding) -> Self {
        Self {
            code_page,
            encoding,
            trickle: false,
            boundaries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn trickle(mut self) -> Self {
        self.trickle = true;
        self
    }

    pub fn spawn(self) -> (Transport, JoinHandle<()>) {
        let (stdin_w, stdin_r) = pipe();
        let (stdout_w, stdout_r) = pipe();
        let (stderr_w, stderr_r) = pipe();

        let handle = thread::spawn(move || self.run(stdin_r, stdout_w, stderr_w));
        let transport =
            Transport::from_pipes(Box::new(stdin_w), Box::new(stdout_r), Box::new(stderr_r));
        (transport, handle)
    }

    fn run(self, mut stdin: ChannelReader, mut stdout: ChannelWriter, mut stderr: ChannelWriter) {
        let mut input = Vec::new();
        let mut buf = [0u8; 256];

        loop {
            let n = match stdin.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            input.extend_from_slice(&buf[..n]);

            while let Some(end) = input.windows(2).position(|w| w == b"\r\n") {
                let raw: Vec<u8> = input.drain(..end + 2).collect();
                let (line, _) = self.encoding.decode_without_bom_handling(&raw[..end]);

                if line == "exit" {
                    return;
                }
                if self.handle_line(&line, &mut stdout, &mut stderr).is_err() {
                    return;
                }
            }
        }
    }

    fn handle_line(
        &self,
        line: &str,
        stdout: &mut ChannelWriter,
        stderr: &mut ChannelWriter,
    ) -> io::Result<()> {
        let Some(split) = line.find("; echo '$command") else {
            return Ok(());
        };
        let command = &line[..split];
        let trailer = &line[split + "; echo '".len()..];
        let boundary = &trailer[..trailer.find('\'').unwrap_or(trailer.len())];
        self.boundaries.lock().unwrap().push(boundary.to_string());

        for statement in command.split("; ") {
            // Bytes written by a program that ignores the console code page
            if let Some(text) = statement.strip_prefix("Write-Latin1 ") {
                let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(text);
                let mut bytes = bytes.into_owned();
                bytes.extend_from_slice(b"\r\n");
                self.emit_bytes(stdout, &bytes)?;
                continue;
            }
            let (out, err) = self.evaluate(statement);
            self.emit(stdout, &out)?;
            self.emit(stderr, &err)?;
        }

        let marker = format!("{}\r\n", boundary);
        self.emit(stdout, &marker)?;
        self.emit(stderr, &marker)
    }

    fn evaluate(&self, statement: &str) -> (String, String) {
        if statement == "chcp" {
            let text = if self.code_page == 932 {
                format!("現在のコード ページ: {}\r\n", self.code_page)
            } else {
                format!("Active code page: {}\r\n", self.code_page)
            };
            return (text, String::new());
        }
        if statement == "Get-TimeZone | Select-Object StandardName" {
            let table = "\r\nStandardName       \r\n------------       \r\nTokyo Standard Time\r\n\r\n\r\n";
            return (table.to_string(), String::new());
        }
        if let Some(text) = statement.strip_prefix("echo ") {
            return (format!("{}\r\n", text), String::new());
        }
        if let Some(text) = statement.strip_prefix("Write-Error ") {
            return (String::new(), format!("{}\r\n", text));
        }
        (
            String::new(),
            format!("The term '{}' is not recognized\r\n", statement),
        )
    }

    fn emit(&self, w: &mut ChannelWriter, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let (bytes, _, _) = self.encoding.encode(text);
        self.emit_bytes(w, &bytes)
    }

    fn emit_bytes(&self, w: &mut ChannelWriter, bytes: &[u8]) -> io::Result<()> {
        if self.trickle {
            for b in bytes.iter() {
                w.write_all(std::slice::from_ref(b))?;
            }
            Ok(())
        } else {
            w.write_all(bytes)
        }
    }
}
