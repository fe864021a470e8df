// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rendering of remote output streams.
//!
//! In single-host mode bytes are copied through untouched, partial lines and
//! escape sequences included. In multi-host mode the stream is split on LF
//! and every line becomes `<name>: <text>`, with name and separator in the
//! host's color, written to the sink as one unit.

use owo_colors::{AnsiColors, OwoColorize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use super::output_mode::ExecMode;
use super::output_sync::OutputSink;

const RAW_CHUNK_SIZE: usize = 8192;

/// Longest line buffered in multi-host mode. A longer run without LF is
/// emitted in pieces of this size, each as its own attributed line.
const MAX_LINE_SIZE: usize = 64 * 1024;

const HOST_PALETTE: [AnsiColors; 12] = [
    AnsiColors::Red,
    AnsiColors::Green,
    AnsiColors::Yellow,
    AnsiColors::Blue,
    AnsiColors::Magenta,
    AnsiColors::Cyan,
    AnsiColors::BrightRed,
    AnsiColors::BrightGreen,
    AnsiColors::BrightYellow,
    AnsiColors::BrightBlue,
    AnsiColors::BrightMagenta,
    AnsiColors::BrightCyan,
];

/// Stable color for a host name (FNV-1a over the palette).
pub fn host_color(name: &str) -> AnsiColors {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in name.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    HOST_PALETTE[hash as usize % HOST_PALETTE.len()]
}

/// Render a failure message, white on red when colors are on.
pub fn render_failure(message: &str, colors: bool) -> String {
    if colors {
        message.bright_white().on_red().to_string()
    } else {
        message.to_string()
    }
}

/// Per-host output renderer.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    host: String,
    color: AnsiColors,
    mode: ExecMode,
    colors: bool,
}

impl OutputFormatter {
    pub fn new(host: &str, mode: ExecMode, colors: bool) -> Self {
        Self {
            host: host.to_string(),
            color: host_color(host),
            mode,
            colors,
        }
    }

    /// Render one attributed line, newline included.
    pub fn render_line(&self, text: &str) -> String {
        if self.colors {
            format!(
                "{}{} {}\n",
                self.host.color(self.color),
                ":".color(self.color),
                text
            )
        } else {
            format!("{}: {}\n", self.host, text)
        }
    }

    /// Copy `reader` to `sink` until end-of-stream. Returns the number of
    /// bytes read from the remote stream.
    pub async fn relay<R>(&self, reader: R, sink: &OutputSink) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        match self.mode {
            ExecMode::Single => relay_raw(reader, sink).await,
            ExecMode::Multi => self.relay_lines(reader, sink).await,
        }
    }

    async fn relay_lines<R>(&self, reader: R, sink: &OutputSink) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        let mut total = 0u64;

        loop {
            line.clear();
            let n = (&mut reader)
                .take(MAX_LINE_SIZE as u64)
                .read_until(b'\n', &mut line)
                .await?;
            if n == 0 {
                break;
            }
            total += n as u64;

            if line.last() == Some(&b'\n') {
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }

            let rendered = self.render_line(&String::from_utf8_lossy(&line));
            sink.write_atomic(rendered.as_bytes())?;
        }

        Ok(total)
    }
}

async fn relay_raw<R>(mut reader: R, sink: &OutputSink) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; RAW_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sink.write_atomic(&buf[..n])?;
        total += n as u64;
    }

    Ok(total)
}
