use crate::{Error, ProgressEvent, Result};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Comment frame a transport may interleave to keep idle connections open.
/// Decoders skip it.
pub const KEEPALIVE_FRAME: &str = ": keepalive\n\n";

/// Text framing for [`ProgressEvent`]s.
///
/// Every event becomes one block of `field: value` lines closed by a blank
/// line:
///
/// ```text
/// id: 3
/// event: progress
/// data: {"seq":3,"jobId":"claim-1","kind":"report",...}
///
/// ```
///
/// Decoding accepts `\n` and `\r\n` line endings, joins repeated `data`
/// lines with `\n`, and skips `:` comment lines and unknown fields.
#[derive(Debug, Default)]
pub struct EventCodec {
  // Bytes already searched for a delimiter
  scan_offset: usize,
}

impl EventCodec {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn encode_frame(event: &ProgressEvent) -> Result<String> {
    let data = match event {
      ProgressEvent::Progress(event) => serde_json::to_string(event)?,
      ProgressEvent::Summary(event) => serde_json::to_string(event)?,
      ProgressEvent::Error(event) => serde_json::to_string(event)?,
    };

    Ok(format!(
      "id: {}\nevent: {}\ndata: {}\n\n",
      event.seq(),
      event.event_type(),
      data
    ))
  }

  /// Parses one frame without its closing blank line. `None` when the frame
  /// holds nothing but comments.
  pub fn decode_frame(frame: &str) -> Result<Option<ProgressEvent>> {
    let mut id = None;
    let mut event_type = None;
    let mut data: Vec<&str> = Vec::new();

    for line in frame.split('\n') {
      let line = line.strip_suffix('\r').unwrap_or(line);
      if line.is_empty() || line.starts_with(':') {
        continue;
      }

      let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
      };

      match field {
        "id" => {
          let seq = value
            .parse::<u64>()
            .map_err(|_| Error::codec_error(format!("Invalid frame id `{}`", value)))?;
          id = Some(seq);
        }
        "event" => event_type = Some(value),
        "data" => data.push(value),
        _ => log::debug!("Skipping unknown frame field `{}`", field),
      }
    }

    if id.is_none() && event_type.is_none() && data.is_empty() {
      return Ok(None);
    }

    let event_type =
      event_type.ok_or_else(|| Error::codec_error("Frame has no `event` field"))?;
    let data = data.join("\n");

    let event = match event_type {
      "progress" => ProgressEvent::Progress(serde_json::from_str(&data)?),
      "summary" => ProgressEvent::Summary(serde_json::from_str(&data)?),
      "error" => ProgressEvent::Error(serde_json::from_str(&data)?),
      other => {
        return Err(Error::codec_error(format!(
          "Unknown event type `{}`",
          other
        )))
      }
    };

    match id {
      Some(id) if id != event.seq() => Err(Error::codec_error(format!(
        "Frame id {} does not match event seq {}",
        id,
        event.seq()
      ))),
      _ => Ok(Some(event)),
    }
  }
}

/// Position and length of the first blank-line delimiter at or after `from`.
fn find_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
  let mut idx = from;

  while idx < buf.len() {
    if buf[idx] == b'\n' {
      match buf.get(idx + 1) {
        Some(b'\n') => return Some((idx, 2)),
        Some(b'\r') if buf.get(idx + 2) == Some(&b'\n') => return Some((idx, 3)),
        _ => {}
      }
    }
    idx += 1;
  }

  None
}

impl Decoder for EventCodec {
  type Item = ProgressEvent;
  type Error = Error;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ProgressEvent>> {
    loop {
      let Some((end, len)) = find_delimiter(src, self.scan_offset) else {
        // A delimiter can straddle reads, so rescan the last two bytes
        self.scan_offset = src.len().saturating_sub(2);
        return Ok(None);
      };

      let frame = src.split_to(end + len);
      self.scan_offset = 0;

      let text = std::str::from_utf8(&frame[..end])
        .map_err(|err| Error::codec_error(format!("Frame is not valid UTF-8: {}", err)))?;

      if let Some(event) = Self::decode_frame(text)? {
        return Ok(Some(event));
      }
    }
  }

  fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<ProgressEvent>> {
    if let Some(event) = self.decode(src)? {
      return Ok(Some(event));
    }

    let rest = std::str::from_utf8(src).ok();
    match rest.map(Self::decode_frame) {
      Some(Ok(None)) => {
        src.clear();
        self.scan_offset = 0;
        Ok(None)
      }
      _ => Err(Error::codec_error(format!(
        "Stream ended inside a frame ({} bytes left)",
        src.len()
      ))),
    }
  }
}

impl Encoder<ProgressEvent> for EventCodec {
  type Error = Error;

  fn encode(&mut self, event: ProgressEvent, dst: &mut BytesMut) -> Result<()> {
    let frame = Self::encode_frame(&event)?;
    dst.reserve(frame.len());
    dst.put_slice(frame.as_bytes());

    Ok(())
  }
}
