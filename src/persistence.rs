use crate::config::SyncMode;
use crate::error::{GridError, Result};
use crate::storage::StorageOp;
use blockgrid_types::schema::Schema;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const AOF_MAGIC: &[u8] = b"BLOCKGRID_AOF";
const AOF_VERSION: u8 = 1;
const LEN_FIELD_LEN: usize = 4;

const SCRATCH_INITIAL_CAPACITY: usize = 8 * 1024;
const SCRATCH_SHRINK_THRESHOLD: usize = 1 << 20;

/// AOF configuration for rewriting
#[derive(Debug, Clone)]
pub struct AOFConfig {
    /// Trigger rewrite when file size exceeds this many bytes
    pub rewrite_size_threshold: u64,
}

impl Default for AOFConfig {
    fn default() -> Self {
        Self {
            rewrite_size_threshold: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Store parameters recorded at the start of the log.
///
/// A log can only be replayed into a store with the same block size and
/// schema, since both decide which unit a record lives in and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AOFHeader {
    pub block_size: f64,
    pub schema: Schema,
}

/// Append-only log of storage batches.
///
/// Layout: magic, version byte, length-prefixed bincode header, then one
/// length-prefixed bincode frame per batch. A frame is the unit of atomicity:
/// replay either applies a whole batch or, for a torn tail, none of it.
pub struct AOFFile {
    file: File,
    writer: BufWriter<File>,
    path: PathBuf,
    size: u64,
    header: AOFHeader,
    header_len: u64,
    config: AOFConfig,
    last_rewrite_size: u64,
    scratch: BytesMut,
}

impl AOFFile {
    /// Open AOF file with default configuration
    pub fn open<P: AsRef<Path>>(path: P, header: AOFHeader) -> Result<Self> {
        Self::open_with_config(path, header, AOFConfig::default())
    }

    /// Open AOF file with custom configuration.
    ///
    /// A new file gets `header` written to it; an existing file must carry an
    /// equal header or `ConfigMismatch` is returned.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        header: AOFHeader,
        config: AOFConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        let mut size = file.metadata()?.len();
        let header_len = if size == 0 {
            let encoded = Self::encode_header(&header)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
            size = encoded.len() as u64;
            size
        } else {
            let (stored, header_len) = Self::read_header(&mut file)?;
            if stored != header {
                return Err(GridError::ConfigMismatch(format!(
                    "{} was created with block size {} and schema [{}], \
                     but the store is configured with block size {} and schema [{}]",
                    path.display(),
                    stored.block_size,
                    stored.schema,
                    header.block_size,
                    header.schema
                )));
            }
            header_len
        };

        let writer = BufWriter::new(file.try_clone()?);

        Ok(AOFFile {
            file,
            writer,
            path,
            size,
            header,
            header_len,
            config,
            last_rewrite_size: size,
            scratch: BytesMut::with_capacity(SCRATCH_INITIAL_CAPACITY),
        })
    }

    fn encode_header(header: &AOFHeader) -> Result<Bytes> {
        let body = bincode::serialize(header)?;
        let mut buf = BytesMut::with_capacity(AOF_MAGIC.len() + 1 + LEN_FIELD_LEN + body.len());
        buf.put_slice(AOF_MAGIC);
        buf.put_u8(AOF_VERSION);
        buf.put_u32(body.len() as u32);
        buf.put_slice(&body);
        Ok(buf.freeze())
    }

    fn read_header(file: &mut File) -> Result<(AOFHeader, u64)> {
        file.seek(SeekFrom::Start(0))?;

        let mut magic = vec![0u8; AOF_MAGIC.len()];
        file.read_exact(&mut magic)
            .map_err(|_| GridError::InvalidFormat)?;
        if magic != AOF_MAGIC {
            return Err(GridError::InvalidFormat);
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != AOF_VERSION {
            return Err(GridError::InvalidFormat);
        }

        let mut len_buf = [0u8; LEN_FIELD_LEN];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut body = vec![0u8; len];
        file.read_exact(&mut body)
            .map_err(|_| GridError::UnexpectedEof)?;
        let header: AOFHeader =
            bincode::deserialize(&body).map_err(|_| GridError::InvalidFormat)?;

        let header_len = (AOF_MAGIC.len() + 1 + LEN_FIELD_LEN + len) as u64;
        Ok((header, header_len))
    }

    /// Get current file size
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn header(&self) -> &AOFHeader {
        &self.header
    }

    /// Append one batch as a single frame and hand it to the OS.
    ///
    /// If the write fails part way, the partial frame is cut off again so the
    /// next frame starts on a boundary.
    pub fn write_batch(&mut self, ops: &[StorageOp]) -> Result<()> {
        let body = bincode::serialize(ops)?;

        self.scratch.clear();
        self.scratch.reserve(LEN_FIELD_LEN + body.len());
        self.scratch.put_u32(body.len() as u32);
        self.scratch.put_slice(&body);

        let written = self
            .writer
            .write_all(&self.scratch)
            .and_then(|_| self.writer.flush());
        if let Err(e) = written {
            if let Err(repair) = self.discard_partial_frame() {
                log::warn!(
                    "Could not cut partial frame from {}: {}",
                    self.path.display(),
                    repair
                );
            }
            return Err(e.into());
        }
        self.size += self.scratch.len() as u64;

        if self.scratch.capacity() > SCRATCH_SHRINK_THRESHOLD
            && self.scratch.len() <= SCRATCH_INITIAL_CAPACITY
        {
            self.scratch = BytesMut::with_capacity(SCRATCH_INITIAL_CAPACITY);
        }

        Ok(())
    }

    /// Drop buffered bytes and truncate the file back to the last complete
    /// frame.
    fn discard_partial_frame(&mut self) -> Result<()> {
        let fresh = BufWriter::new(self.file.try_clone()?);
        // into_parts hands back the buffer without flushing it
        let (_, _unwritten) = std::mem::replace(&mut self.writer, fresh).into_parts();
        self.file.set_len(self.size)?;
        Ok(())
    }

    /// Check if AOF should be rewritten: past the size threshold and at
    /// least double the size it had after the last rewrite.
    pub fn should_rewrite(&self) -> bool {
        self.size >= self.config.rewrite_size_threshold
            && self.size >= self.last_rewrite_size.saturating_mul(2)
    }

    /// Read every complete batch after the header.
    ///
    /// A torn trailing frame (from a crash mid-write) is logged, discarded and
    /// truncated away so later appends start on a frame boundary.
    pub fn replay(&mut self) -> Result<Vec<Vec<StorageOp>>> {
        self.writer.flush()?;
        self.file.seek(SeekFrom::Start(self.header_len))?;

        let mut data = Vec::new();
        self.file.read_to_end(&mut data)?;
        let total = data.len();
        let mut buf = Bytes::from(data);
        let mut batches = Vec::new();

        while buf.has_remaining() {
            if buf.remaining() < LEN_FIELD_LEN {
                break;
            }
            let len = (&buf[..LEN_FIELD_LEN]).get_u32() as usize;
            if buf.remaining() - LEN_FIELD_LEN < len {
                break;
            }
            buf.advance(LEN_FIELD_LEN);
            let frame = buf.split_to(len);
            let ops: Vec<StorageOp> =
                bincode::deserialize(&frame).map_err(|_| GridError::InvalidFormat)?;
            batches.push(ops);
        }

        if buf.has_remaining() {
            let valid = self.header_len + (total - buf.remaining()) as u64;
            log::warn!(
                "Discarding {} bytes of torn trailing frame in {}",
                buf.remaining(),
                self.path.display()
            );
            self.file.set_len(valid)?;
            self.file.sync_all()?;
            self.size = valid;
        }

        Ok(batches)
    }

    /// Replace the log with `batches`, atomically via a temp file and rename.
    pub fn rewrite<I>(&mut self, batches: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<StorageOp>>,
    {
        self.writer.flush()?;

        let rewrite_path = self.path.with_extension("aof.rewrite");
        let _ = std::fs::remove_file(&rewrite_path);

        let mut rewrite_file = Self::open_with_config(
            &rewrite_path,
            self.header.clone(),
            self.config.clone(),
        )?;
        for ops in batches {
            rewrite_file.write_batch(&ops)?;
        }
        // Sync rewritten file to disk before rename to guarantee durability
        rewrite_file.sync()?;
        drop(rewrite_file);

        std::fs::rename(&rewrite_path, &self.path)?;

        let new_file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)?;
        let new_size = new_file.metadata()?.len();
        let writer = BufWriter::new(new_file.try_clone()?);

        log::debug!(
            "Rewrote {} from {} to {} bytes",
            self.path.display(),
            self.size,
            new_size
        );

        self.file = new_file;
        self.writer = writer;
        self.size = new_size;
        self.last_rewrite_size = new_size;

        Ok(())
    }

    /// Flush buffered writes to disk
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.sync_with_mode(SyncMode::All)
    }

    /// Flush and sync using the provided mode.
    pub fn sync_with_mode(&mut self, mode: SyncMode) -> Result<()> {
        self.writer.flush()?;
        match mode {
            SyncMode::All => self.file.sync_all()?,
            SyncMode::Data => self.file.sync_data()?,
        }
        Ok(())
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AOFFile {
    fn drop(&mut self) {
        // Best effort flush on drop, ignore errors
        let _ = self.writer.flush();
    }
}
