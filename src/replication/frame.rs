use crate::error::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Request: a 4-byte little-endian segment id.
pub async fn write_request(stream: &mut (impl AsyncWriteExt + Unpin), segment_id: u32) -> Result<()> {
    stream.write_all(&segment_id.to_le_bytes()).await?;
    Ok(())
}

pub async fn read_request(stream: &mut (impl AsyncReadExt + Unpin)) -> Result<u32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await?;
    Ok(u32::from_le_bytes(buf))
}

/// Response: 4-byte id echo (0 = not found), 1-byte compressed flag,
/// 4-byte length, `length` bytes.
pub struct SegmentFrame {
    pub segment_id: u32,
    pub compressed: bool,
    pub bytes: Vec<u8>,
}

pub async fn write_response(stream: &mut (impl AsyncWriteExt + Unpin), frame: Option<&SegmentFrame>) -> Result<()> {
    match frame {
        Some(frame) => {
            stream.write_all(&frame.segment_id.to_le_bytes()).await?;
            stream.write_all(&[frame.compressed as u8]).await?;
            stream.write_all(&(frame.bytes.len() as u32).to_le_bytes()).await?;
            stream.write_all(&frame.bytes).await?;
        }
        None => {
            stream.write_all(&0u32.to_le_bytes()).await?;
            stream.write_all(&[0u8]).await?;
            stream.write_all(&0u32.to_le_bytes()).await?;
        }
    }
    Ok(())
}

pub async fn read_response(stream: &mut (impl AsyncReadExt + Unpin)) -> Result<Option<SegmentFrame>> {
    let mut id_buf = [0u8; 4];
    stream.read_exact(&mut id_buf).await?;
    let segment_id = u32::from_le_bytes(id_buf);
    let mut flag_buf = [0u8; 1];
    stream.read_exact(&mut flag_buf).await?;
    let compressed = flag_buf[0] != 0;
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if segment_id == 0 {
        return Ok(None);
    }
    let mut bytes = vec![0u8; len];
    stream.read_exact(&mut bytes).await?;
    Ok(Some(SegmentFrame { segment_id, compressed, bytes }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trips_over_a_duplex_pipe() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_request(&mut a, 7).await.unwrap();
        let got = read_request(&mut b).await.unwrap();
        assert_eq!(got, 7);
    }

    #[tokio::test]
    async fn response_round_trips_found_and_not_found() {
        let (mut a, mut b) = tokio::io::duplex(256);
        let frame = SegmentFrame {
            segment_id: 3,
            compressed: true,
            bytes: b"hello".to_vec(),
        };
        write_response(&mut a, Some(&frame)).await.unwrap();
        let got = read_response(&mut b).await.unwrap().unwrap();
        assert_eq!(got.segment_id, 3);
        assert!(got.compressed);
        assert_eq!(got.bytes, b"hello");

        write_response(&mut a, None).await.unwrap();
        let got = read_response(&mut b).await.unwrap();
        assert!(got.is_none());
    }
}
