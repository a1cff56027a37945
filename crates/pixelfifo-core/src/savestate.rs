use thiserror::Error;

pub const SNAPSHOT_MAGIC: &[u8; 3] = b"PFC";
pub const SNAPSHOT_VERSION: u8 = 1;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot does not start with the expected magic bytes")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),
    #[error("snapshot ended before all fields were read")]
    Truncated,
    #[error("snapshot has {0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("snapshot field `{field}` has invalid value {value}")]
    Invalid { field: &'static str, value: i64 },
}

impl SnapshotError {
    pub fn invalid(field: &'static str, value: impl Into<i64>) -> Self {
        SnapshotError::Invalid {
            field,
            value: value.into(),
        }
    }
}

/// Little-endian byte sink for snapshots.
#[derive(Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header() -> Self {
        let mut writer = Self::new();
        writer.bytes(SNAPSHOT_MAGIC);
        writer.u8(SNAPSHOT_VERSION);
        writer
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a snapshot produced by [`StateWriter`].
pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Open a snapshot and check its magic and version.
    pub fn with_header(data: &'a [u8]) -> Result<Self, SnapshotError> {
        let mut reader = Self::new(data);
        let magic = reader
            .bytes(SNAPSHOT_MAGIC.len())
            .map_err(|_| SnapshotError::BadMagic)?;
        if magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = reader.u8()?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        Ok(reader)
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self.pos.checked_add(len).ok_or(SnapshotError::Truncated)?;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(SnapshotError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], SnapshotError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn bool(&mut self, field: &'static str) -> Result<bool, SnapshotError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SnapshotError::invalid(field, other)),
        }
    }

    pub fn u16(&mut self) -> Result<u16, SnapshotError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16, SnapshotError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, SnapshotError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Read a byte and reject it when it exceeds `max`.
    pub fn bounded_u8(&mut self, field: &'static str, max: u8) -> Result<u8, SnapshotError> {
        let value = self.u8()?;
        if value > max {
            return Err(SnapshotError::invalid(field, value));
        }
        Ok(value)
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(self) -> Result<(), SnapshotError> {
        match self.data.len() - self.pos {
            0 => Ok(()),
            extra => Err(SnapshotError::TrailingBytes(extra)),
        }
    }
}

/// Component encoding in the snapshot's fixed field order.
///
/// `load_state` builds a fresh value and validates it completely, so a
/// rejected snapshot never leaves a component half-written.
pub trait SaveState: Sized {
    fn save_state(&self, writer: &mut StateWriter);
    fn load_state(reader: &mut StateReader<'_>) -> Result<Self, SnapshotError>;
}
