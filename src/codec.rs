//! An injected encode/decode pair for callers who want typed records: the
//! core log works in raw bytes, and whatever higher-level `Record` type an
//! external RPC layer wants (with its own offset/metadata fields) is
//! encoded/decoded at this seam, outside the core.

use std::marker::PhantomData;

use prost::Message;

use crate::log::Log;

/// An encode/decode pair for some caller-defined record type `T`.
pub trait RecordCodec<T> {
    type Error: std::error::Error + 'static;

    fn encode(&self, value: &T) -> Result<Vec<u8>, Self::Error>;
    fn decode(&self, bytes: &[u8]) -> Result<T, Self::Error>;
}

/// Identity codec for callers who already work in raw bytes.
pub struct BytesCodec;

impl RecordCodec<Vec<u8>> for BytesCodec {
    type Error = std::convert::Infallible;

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, Self::Error> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, Self::Error> {
        Ok(bytes.to_vec())
    }
}

/// A codec backed by a caller-supplied protobuf message type, for the
/// common case of an RPC layer that already speaks protobuf records.
pub struct ProstCodec<T> {
    _marker: PhantomData<T>,
}

impl<T> Default for ProstCodec<T> {
    fn default() -> Self {
        ProstCodec {
            _marker: PhantomData,
        }
    }
}

impl<T> RecordCodec<T> for ProstCodec<T>
where
    T: Message + Default,
{
    type Error = prost::DecodeError;

    fn encode(&self, value: &T) -> Result<Vec<u8>, Self::Error> {
        Ok(value.encode_to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, Self::Error> {
        T::decode(bytes)
    }
}

/// A thin typed view over [`Log`] that encodes on append and decodes on
/// read, plugging a `RecordCodec` into the raw-byte core.
pub struct TypedLog<'a, T, C: RecordCodec<T>> {
    log: &'a Log,
    codec: C,
    _marker: PhantomData<T>,
}

#[derive(Debug, thiserror::Error)]
pub enum TypedLogError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Log(#[from] crate::error::LogError),
    #[error(transparent)]
    Codec(E),
}

impl<'a, T, C: RecordCodec<T>> TypedLog<'a, T, C> {
    pub fn new(log: &'a Log, codec: C) -> Self {
        TypedLog {
            log,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn append(&self, value: &T) -> Result<u64, TypedLogError<C::Error>> {
        let bytes = self.codec.encode(value).map_err(TypedLogError::Codec)?;
        Ok(self.log.append(&bytes)?)
    }

    pub fn read(&self, offset: u64) -> Result<T, TypedLogError<C::Error>> {
        let bytes = self.log.read(offset)?;
        self.codec.decode(&bytes).map_err(TypedLogError::Codec)
    }
}
