use bytes::Bytes;
use futures_util::{Stream, StreamExt, pin_mut};
use serde::Deserialize;

/// Minimal shape of one streamed chunk from the chat deployments.
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Deserialize, Default)]
struct ChatDelta {
    #[serde(default)]
    content: String,
}

/// Assembles complete lines from incremental byte chunks. A fragment that
/// spans two transport chunks stays buffered until its newline arrives.
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append a chunk and drain every completed line from the buffer.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(nl) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=nl).collect();
            line.pop(); // trailing \n
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(line)
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

enum DataLine {
    Fragment(String),
    Done,
    Skip,
}

fn parse_data_line(line: &str) -> DataLine {
    let Some(payload) = line.strip_prefix("data: ") else {
        return DataLine::Skip;
    };
    if payload == "[DONE]" {
        return DataLine::Done;
    }
    // Malformed JSON is non-fatal: skip the line and keep aggregating.
    let Ok(chunk) = serde_json::from_str::<ChatChunk>(payload) else {
        return DataLine::Skip;
    };
    match chunk.choices.into_iter().next() {
        Some(choice) if !choice.delta.content.is_empty() => {
            DataLine::Fragment(choice.delta.content)
        }
        _ => DataLine::Skip,
    }
}

/// Consume a server-sent-event style byte stream and assemble the answer.
///
/// Each extracted content fragment is handed to `sink` in arrival order
/// before being accumulated, so a caller can render the reply live. The
/// `[DONE]` sentinel ends consumption; anything buffered after it is
/// ignored. The final answer is trimmed of surrounding whitespace.
///
/// A transport error aborts aggregation and is returned to the caller;
/// partial content is discarded.
pub async fn aggregate_sse<S, E, F>(stream: S, mut sink: F) -> Result<String, E>
where
    S: Stream<Item = Result<Bytes, E>>,
    F: FnMut(&str),
{
    pin_mut!(stream);
    let mut lines = LineBuffer::new();
    let mut answer = String::new();
    let mut done = false;

    'chunks: while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for line in lines.push(&chunk) {
            match parse_data_line(&line) {
                DataLine::Fragment(text) => {
                    sink(&text);
                    answer.push_str(&text);
                }
                DataLine::Done => {
                    done = true;
                    break 'chunks;
                }
                DataLine::Skip => {}
            }
        }
    }

    // Some deployments end the stream without a [DONE] line; flush the
    // trailing partial line in that case.
    if !done
        && let Some(line) = lines.finish()
        && let DataLine::Fragment(text) = parse_data_line(&line)
    {
        sink(&text);
        answer.push_str(&text);
    }

    Ok(answer.trim().to_string())
}
