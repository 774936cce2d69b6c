//! Frame codec shared by every transport.
//!
//! A frame on the wire is laid out as
//!
//! ```text
//! tag: u32 LE | source rank: u32 LE | element count: u64 LE | elements: f64 LE ...
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::Error;

const HEADER_LEN: usize = 16;

/// Kind of collective a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Hello,
    Broadcast,
    Scatter,
    Gather,
    Barrier,
}

impl Tag {
    fn to_wire(self) -> u32 {
        match self {
            Tag::Hello => 1,
            Tag::Broadcast => 2,
            Tag::Scatter => 3,
            Tag::Gather => 4,
            Tag::Barrier => 5,
        }
    }

    fn from_wire(value: u32) -> Result<Self, Error> {
        match value {
            1 => Ok(Tag::Hello),
            2 => Ok(Tag::Broadcast),
            3 => Ok(Tag::Scatter),
            4 => Ok(Tag::Gather),
            5 => Ok(Tag::Barrier),
            other => Err(Error::Protocol(format!("unknown frame tag {}", other))),
        }
    }
}

/// One point-to-point message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tag: Tag,
    pub source: usize,
    pub payload: Vec<f64>,
}

impl Frame {
    pub fn new(tag: Tag, source: usize, payload: Vec<f64>) -> Self {
        Self {
            tag,
            source,
            payload,
        }
    }

    pub fn empty(tag: Tag, source: usize) -> Self {
        Self::new(tag, source, Vec::new())
    }

    fn encode(&self) -> Result<Vec<u8>, Error> {
        let source = u32::try_from(self.source)
            .map_err(|_| Error::Protocol(format!("source rank {} does not fit a frame", self.source)))?;
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len() * 8);
        buf.extend_from_slice(&self.tag.to_wire().to_le_bytes());
        buf.extend_from_slice(&source.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        for v in &self.payload {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        Ok(buf)
    }
}

/// Writes one frame and flushes the writer.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let buf = frame.encode()?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. A stream that ends mid-frame yields an I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, Error>
where
    R: AsyncRead + Unpin,
{
    let tag = Tag::from_wire(reader.read_u32_le().await?)?;
    let source = reader.read_u32_le().await? as usize;
    let len = usize::try_from(reader.read_u64_le().await?)
        .ok()
        .and_then(|count| count.checked_mul(8))
        .ok_or_else(|| Error::Protocol("element count overflows usize".to_string()))?;

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).await?;
    let payload = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();

    Ok(Frame {
        tag,
        source,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_survives_the_wire() {
        let frame = Frame::new(Tag::Scatter, 3, vec![1.5, -2.0, 0.0]);
        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).await.unwrap();
        assert_eq!(buf.len(), HEADER_LEN + 24);

        let decoded = read_frame(&mut buf.as_slice()).await.unwrap();
        assert_eq!(decoded, frame);
    }

    #[tokio::test]
    async fn unknown_tag_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&99u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());

        let err = read_frame(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_payload_is_an_io_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Frame::new(Tag::Gather, 0, vec![1.0, 2.0]))
            .await
            .unwrap();
        buf.truncate(buf.len() - 4);

        let err = read_frame(&mut buf.as_slice()).await.unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
