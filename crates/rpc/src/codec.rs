//! Length-prefixed framing.
//!
//! Every frame is a six character ASCII hexadecimal length followed by that many bytes of
//! UTF-8 JSON. The decoder keeps partial frames buffered until they are complete.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Width of the hexadecimal length header.
pub const HEADER_LEN: usize = 6;

/// Largest body the header can describe.
pub const MAX_FRAME_LEN: usize = 0xFF_FFFF;

/// Framing failures.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	/// Underlying stream error.
	#[error("{0}")]
	Io(#[from] std::io::Error),
	/// The length header is not six hexadecimal digits.
	#[error("malformed frame header {0:?}")]
	BadHeader(String),
	/// The body does not fit the header.
	#[error("frame of {0} bytes exceeds the frame size limit")]
	FrameTooLarge(usize),
}

/// Codec for hex length-prefixed frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec {
	/// Body length of the frame currently being assembled.
	pending_len: Option<usize>,
}

impl FrameCodec {
	/// Creates a codec with an empty assembly state.
	#[must_use]
	pub const fn new() -> Self {
		Self { pending_len: None }
	}
}

fn parse_header(header: &[u8]) -> Result<usize, CodecError> {
	let text = std::str::from_utf8(header)
		.map_err(|_| CodecError::BadHeader(String::from_utf8_lossy(header).into_owned()))?;
	if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(CodecError::BadHeader(text.to_owned()));
	}
	usize::from_str_radix(text, 16).map_err(|_| CodecError::BadHeader(text.to_owned()))
}

impl Decoder for FrameCodec {
	type Item = Bytes;
	type Error = CodecError;

	fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
		let len = match self.pending_len {
			Some(len) => len,
			None => {
				if src.len() < HEADER_LEN {
					return Ok(None);
				}
				let len = parse_header(&src[..HEADER_LEN])?;
				src.advance(HEADER_LEN);
				self.pending_len = Some(len);
				len
			}
		};

		if src.len() < len {
			src.reserve(len - src.len());
			return Ok(None);
		}

		self.pending_len = None;
		Ok(Some(src.split_to(len).freeze()))
	}
}

impl Encoder<Bytes> for FrameCodec {
	type Error = CodecError;

	fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<(), CodecError> {
		if body.len() > MAX_FRAME_LEN {
			return Err(CodecError::FrameTooLarge(body.len()));
		}
		dst.reserve(HEADER_LEN + body.len());
		dst.put_slice(format!("{:06x}", body.len()).as_bytes());
		dst.put_slice(&body);
		Ok(())
	}
}
