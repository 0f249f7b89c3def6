/*
 * Responsibility
 * - 公開 ID (sqids) ↔ 内部 ID (BIGSERIAL) の変換
 * - 非正規な公開 ID は拒否する (同じ行に複数の URL / キャッシュキーを作らないため)
 * - Extractor / handler からはこの service を使う
 */
use sqids::Sqids;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdCodecError>;

#[derive(Debug, Error)]
pub enum IdCodecError {
    #[error("SQIDS_MIN_LENGTH must be between 0 and 255, got {value}")]
    InvalidMinLength { value: usize },
    #[error("sqids error: {0}")]
    Sqids(#[from] sqids::Error),
    #[error("id must be non-negative, got {value}")]
    NegativeId { value: i64 },
    #[error("invalid public id format")]
    DecodeInvalidFormat,
    #[error("decoded id is out of range")]
    DecodeOutOfRange,
}

#[derive(Clone, Debug)]
pub struct IdCodec {
    sqids: Sqids,
}

impl IdCodec {
    pub fn new(min_length: usize, alphabet: &str) -> Result<Self> {
        let min_length: u8 = min_length
            .try_into()
            .map_err(|_| IdCodecError::InvalidMinLength { value: min_length })?;

        let sqids = Sqids::builder()
            .min_length(min_length)
            .alphabet(alphabet.chars().collect())
            .build()?;

        Ok(Self { sqids })
    }

    pub fn encode(&self, id: i64) -> Result<String> {
        let n = u64::try_from(id).map_err(|_| IdCodecError::NegativeId { value: id })?;
        Ok(self.sqids.encode(&[n])?)
    }

    pub fn decode(&self, public_id: &str) -> Result<i64> {
        let nums = self.sqids.decode(public_id);
        let [n] = nums.as_slice() else {
            return Err(IdCodecError::DecodeInvalidFormat);
        };
        // Several strings can decode to the same number; only the one we hand out is valid.
        if self.sqids.encode(&[*n]).ok().as_deref() != Some(public_id) {
            return Err(IdCodecError::DecodeInvalidFormat);
        }
        i64::try_from(*n).map_err(|_| IdCodecError::DecodeOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    fn codec() -> IdCodec {
        IdCodec::new(10, ALPHABET).unwrap()
    }

    #[test]
    fn encodes_to_min_length_and_decodes_back() {
        let codec = codec();
        let public = codec.encode(42).unwrap();
        assert!(public.len() >= 10);
        assert_eq!(codec.decode(&public).unwrap(), 42);
    }

    #[test]
    fn rejects_negative_and_garbage() {
        let codec = codec();
        assert!(matches!(codec.encode(-1), Err(IdCodecError::NegativeId { value: -1 })));
        assert!(matches!(codec.decode("!!"), Err(IdCodecError::DecodeInvalidFormat)));
        assert!(matches!(codec.decode(""), Err(IdCodecError::DecodeInvalidFormat)));
    }

    #[test]
    fn rejects_non_canonical_spelling() {
        let codec = codec();
        let public = codec.encode(7).unwrap();
        let shorter = IdCodec::new(0, ALPHABET).unwrap().encode(7).unwrap();
        assert_ne!(public, shorter);
        assert!(codec.decode(&shorter).is_err());
    }

    #[test]
    fn min_length_must_fit_u8() {
        assert!(matches!(
            IdCodec::new(300, ALPHABET),
            Err(IdCodecError::InvalidMinLength { value: 300 })
        ));
    }
}
