use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref};

/// An opaque block payload, exactly as returned by a node.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block(#[serde(with = "crate::serde_helper::hex_bytes")] Bytes);

impl Block {
    /// Creates a new block payload from raw bytes.
    pub const fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Returns the raw payload.
    pub const fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Consumes the block and returns the raw payload.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Decodes a block from a hex string, with or without `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s).map(Into::into)
    }
}

impl Deref for Block {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Bytes> for Block {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Block {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&'static [u8]> for Block {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // payloads can be large, only show a prefix
        const PREVIEW: usize = 16;
        let preview = &self.0[..self.0.len().min(PREVIEW)];
        write!(f, "Block(len={}, 0x{}", self.0.len(), hex::encode(preview))?;
        if self.0.len() > PREVIEW {
            f.write_str("..")?;
        }
        f.write_str(")")
    }
}

/// Provenance recorded alongside a stored block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Endpoint of the node the block was fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// User agent reported by that node at the time of the fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl BlockMeta {
    /// Creates metadata for a block fetched from `source`.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self { source: Some(source.into()), user_agent: None }
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hex_serde() {
        let block = Block::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, "\"0xdeadbeef\"");
        assert_eq!(serde_json::from_str::<Block>(&json).unwrap(), block);

        // prefix is optional when decoding
        assert_eq!(serde_json::from_str::<Block>("\"deadbeef\"").unwrap(), block);
    }

    #[test]
    fn block_from_hex() {
        assert_eq!(Block::from_hex("0x0102").unwrap().as_bytes().as_ref(), &[1, 2]);
        assert!(Block::from_hex("0xzz").is_err());
    }

    #[test]
    fn debug_truncates_payload() {
        let block = Block::from(vec![0u8; 64]);
        let dbg = format!("{block:?}");
        assert!(dbg.starts_with("Block(len=64, 0x"));
        assert!(dbg.ends_with("..)"));
    }

    #[test]
    fn meta_skips_empty_fields() {
        let meta = BlockMeta::default();
        assert_eq!(serde_json::to_string(&meta).unwrap(), "{}");

        let meta = BlockMeta::from_source("http://a").with_user_agent(Some("/Neo:2.10/".into()));
        let decoded: BlockMeta = serde_json::from_str(&serde_json::to_string(&meta).unwrap()).unwrap();
        assert_eq!(decoded, meta);
    }
}
