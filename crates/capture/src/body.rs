use std::fmt;
use std::io::Read;
use std::sync::{Mutex, OnceLock};

use tracing::warn;

/// A message body that may be backed by a single-pass stream.
///
/// The stream is drained the first time [`Body::materialize`] runs and the
/// text is cached; later calls never touch the stream again.
pub struct Body {
    source: Mutex<Option<Box<dyn Read + Send>>>,
    text: OnceLock<String>,
}

impl Body {
    pub fn from_text(text: impl Into<String>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(text.into());
        Self {
            source: Mutex::new(None),
            text: cell,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_text(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            source: Mutex::new(Some(Box::new(reader))),
            text: OnceLock::new(),
        }
    }

    pub fn materialize(&self) -> &str {
        self.text.get_or_init(|| {
            let reader = match self.source.lock() {
                Ok(mut slot) => slot.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            let Some(mut reader) = reader else {
                return String::new();
            };

            let mut buf = Vec::new();
            match reader.read_to_end(&mut buf) {
                Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
                Err(e) => {
                    warn!(error = %e, "body read failed, recording empty body");
                    String::new()
                }
            }
        })
    }

    pub fn is_materialized(&self) -> bool {
        self.text.get().is_some()
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::from_text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text.get() {
            Some(text) => f.debug_tuple("Body").field(text).finish(),
            None => f.write_str("Body(<stream>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingReader {
        inner: io::Cursor<Vec<u8>>,
        reads: Arc<AtomicUsize>,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read(buf)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("socket reset"))
        }
    }

    #[test]
    fn stream_is_drained_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let body = Body::from_reader(CountingReader {
            inner: io::Cursor::new(b"name=value".to_vec()),
            reads: reads.clone(),
        });
        assert!(!body.is_materialized());
        assert_eq!(body.materialize(), "name=value");
        let after_first = reads.load(Ordering::SeqCst);
        assert_eq!(body.materialize(), "name=value");
        assert_eq!(reads.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn read_failure_gives_empty_body() {
        let body = Body::from_reader(BrokenReader);
        assert_eq!(body.materialize(), "");
        assert!(body.is_materialized());
    }

    #[test]
    fn text_bodies_are_ready() {
        let body = Body::from("hello");
        assert!(body.is_materialized());
        assert_eq!(body.materialize(), "hello");
        assert_eq!(Body::from_bytes(b"\xffok").materialize(), "\u{fffd}ok");
    }
}
