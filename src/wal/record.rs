use crate::error::{DbError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// A single WAL operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Set = 0,
    Del = 1,
}

impl Op {
    fn from_u8(b: u8) -> Result<Op> {
        match b {
            0 => Ok(Op::Set),
            1 => Ok(Op::Del),
            other => Err(DbError::Internal(format!("unknown WAL op byte {other}"))),
        }
    }
}

/// `(lsn, operation, args)` — one durable mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub lsn: u64,
    pub op: Op,
    pub args: Vec<String>,
}

/// Encodes a frame: `body_len | body | crc32c(body)`, all little-endian,
/// where `body` is `lsn | op | argc | (len, bytes)*argc`.
pub fn encode(entry: &Entry, out: &mut BytesMut) {
    let mut body = BytesMut::new();
    body.put_u64_le(entry.lsn);
    body.put_u8(entry.op as u8);
    body.put_u32_le(entry.args.len() as u32);
    for arg in &entry.args {
        let bytes = arg.as_bytes();
        body.put_u32_le(bytes.len() as u32);
        body.put_slice(bytes);
    }
    let checksum = crc32c::crc32c(&body);
    out.put_u32_le(body.len() as u32);
    out.put_slice(&body);
    out.put_u32_le(checksum);
}

/// Decodes a single frame from the front of `buf`, advancing it past the
/// frame on success. Returns `Ok(None)` if `buf` holds an incomplete frame
/// (a segment truncated by a crash mid-write); callers treat this as EOF
/// and stop replaying the segment. Returns `Err` if the body's crc32c does
/// not match the trailing checksum.
pub fn decode(buf: &mut impl Buf) -> Result<Option<Entry>> {
    let available = buf.remaining();
    if available < 4 {
        return Ok(None);
    }
    let chunk = buf.chunk();
    if chunk.len() < 4 {
        return Ok(None);
    }
    let body_len = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
    if available < 4 + body_len + 4 {
        return Ok(None);
    }
    buf.advance(4);
    let mut body = vec![0u8; body_len];
    buf.copy_to_slice(&mut body);
    let checksum = buf.get_u32_le();
    if crc32c::crc32c(&body) != checksum {
        return Err(DbError::Internal("WAL entry failed checksum verification".to_string()));
    }

    let mut cursor: &[u8] = &body;
    let lsn = cursor.get_u64_le();
    let op_byte = cursor.get_u8();
    let argc = cursor.get_u32_le();
    let mut args = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        let len = cursor.get_u32_le() as usize;
        let mut raw = vec![0u8; len];
        cursor.copy_to_slice(&mut raw);
        args.push(String::from_utf8(raw).map_err(|e| DbError::Internal(e.to_string()))?);
    }
    let op = Op::from_u8(op_byte)?;
    Ok(Some(Entry { lsn, op, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let entry = Entry {
            lsn: 42,
            op: Op::Set,
            args: vec!["key".to_string(), "value".to_string()],
        };
        let mut buf = BytesMut::new();
        encode(&entry, &mut buf);
        let mut reader = buf.freeze();
        let decoded = decode(&mut reader).unwrap().unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncated_entry_reports_none() {
        let entry = Entry {
            lsn: 1,
            op: Op::Del,
            args: vec!["k".to_string()],
        };
        let mut buf = BytesMut::new();
        encode(&entry, &mut buf);
        buf.truncate(buf.len() - 2);
        let mut reader = buf.freeze();
        assert!(decode(&mut reader).unwrap().is_none());
    }

    #[test]
    fn corrupted_body_fails_checksum() {
        let entry = Entry {
            lsn: 7,
            op: Op::Set,
            args: vec!["k".to_string(), "v".to_string()],
        };
        let mut buf = BytesMut::new();
        encode(&entry, &mut buf);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        let mut reader = buf.freeze();
        assert!(decode(&mut reader).is_err());
    }
}
