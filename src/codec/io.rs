//! Byte sinks and sources.
//!
//! The encoder and decoder only ever talk to a [`Sink`] or a [`Source`]. A
//! sink must accept exactly the bytes it is given and a source must fill
//! exactly the buffer it is given; anything less is reported by the codec as
//! [`PackError::ShortIo`].
//!
//! Provided adapters:
//!
//! - [`BytesSink`] - growable in-memory buffer (`bytes::BytesMut`)
//! - [`SliceSource`] - fixed in-memory region (`bytes::Bytes`)
//! - [`IoSink`] / [`IoSource`] - any `std::io::Write` / `std::io::Read`
//! - [`FnSink`] / [`FnSource`] - caller closures, see [`sink_fn`] and [`source_fn`]
//!
//! # Example
//!
//! ```
//! use packwire::codec::{BytesSink, SliceSource, Sink, Source};
//!
//! let mut sink = BytesSink::new();
//! sink.write(b"abc").unwrap();
//!
//! let mut source = SliceSource::new(sink.freeze());
//! let mut buf = [0u8; 3];
//! assert_eq!(source.read(&mut buf).unwrap(), 3);
//! assert_eq!(&buf, b"abc");
//! ```

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PackError, Result};

/// Default initial capacity of a [`BytesSink`].
pub const DEFAULT_SINK_CAPACITY: usize = 1024;

/// Output side of the codec.
pub trait Sink {
    /// Write `bytes`, returning how many were written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;
}

/// Input side of the codec.
pub trait Source {
    /// Fill `buf` from the source, returning how many bytes were read.
    ///
    /// Implementations block until `buf` is full, the source is exhausted,
    /// or an error occurs.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

/// Write all of `bytes` or fail with [`PackError::ShortIo`].
pub(crate) fn write_exact<W: Sink + ?Sized>(sink: &mut W, bytes: &[u8]) -> Result<()> {
    let written = sink.write(bytes)?;
    if written != bytes.len() {
        return Err(PackError::ShortIo {
            expected: bytes.len(),
            actual: written,
        });
    }
    Ok(())
}

/// Fill all of `buf` or fail with [`PackError::ShortIo`].
pub(crate) fn read_exact<R: Source + ?Sized>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let read = source.read(buf)?;
    if read != buf.len() {
        return Err(PackError::ShortIo {
            expected: buf.len(),
            actual: read,
        });
    }
    Ok(())
}

/// Growable in-memory sink.
#[derive(Debug, Clone, Default)]
pub struct BytesSink {
    buffer: BytesMut,
}

impl BytesSink {
    /// Create an empty sink with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SINK_CAPACITY)
    }

    /// Create an empty sink with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Convert into immutable `Bytes` (zero-copy).
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }
}

impl Sink for BytesSink {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.buffer.put_slice(bytes);
        Ok(bytes.len())
    }
}

/// Fixed in-memory source.
///
/// Reading past the end returns fewer bytes than requested, which the
/// decoder reports as [`PackError::ShortIo`].
#[derive(Debug, Clone, Default)]
pub struct SliceSource {
    data: Bytes,
}

impl SliceSource {
    /// Create a source over `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Create a source over a borrowed slice (copies data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Bytes not yet read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    /// The unread bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Source for SliceSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.data.remaining());
        self.data.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

/// Sink over any `std::io::Write`.
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: io::Write> IoSink<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Get a reference to the writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> Sink for IoSink<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        match self.inner.write_all(bytes) {
            Ok(()) => Ok(bytes.len()),
            Err(e) if e.kind() == io::ErrorKind::WriteZero => Err(PackError::ShortIo {
                expected: bytes.len(),
                actual: 0,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Source over any `std::io::Read`.
#[derive(Debug)]
pub struct IoSource<R> {
    inner: R,
}

impl<R: io::Read> IoSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwrap the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read> Source for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Sink backed by a closure.
pub struct FnSink<F>(F);

/// Source backed by a closure.
pub struct FnSource<F>(F);

/// Build a sink from `FnMut(&[u8]) -> io::Result<usize>`.
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    FnSink(f)
}

/// Build a source from `FnMut(&mut [u8]) -> io::Result<usize>`.
pub fn source_fn<F>(f: F) -> FnSource<F>
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    FnSource(f)
}

impl<F> Sink for FnSink<F>
where
    F: FnMut(&[u8]) -> io::Result<usize>,
{
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        Ok((self.0)(bytes)?)
    }
}

impl<F> Source for FnSource<F>
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok((self.0)(buf)?)
    }
}
