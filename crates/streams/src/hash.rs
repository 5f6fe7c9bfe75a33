//! Digest tees over byte streams.

use crate::ByteStream;
use async_stream::stream;
use futures::StreamExt;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// A content-hash algorithm understood by the gateway.
///
/// Names are the lowercase keys used in metadata hash maps and JSON bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// The lowercase wire name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    fn hasher(&self) -> Hasher {
        match self {
            Self::Md5 => Hasher::Md5(Md5::new()),
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    /// Digest an in-memory buffer in one go.
    pub fn digest(&self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> String {
        match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

struct ObserverState {
    hashers: Vec<(HashAlgorithm, Hasher)>,
    bytes: u64,
    digests: Option<BTreeMap<String, String>>,
}

/// The read side of a digest tee created by [`ByteStream::observe`].
///
/// Digests only become available once the wrapped stream has been consumed
/// to EOF; an abandoned stream never reports them.
#[derive(Clone)]
pub struct DigestObserver(Arc<Mutex<ObserverState>>);

impl DigestObserver {
    fn new(algorithms: &[HashAlgorithm]) -> Self {
        Self(Arc::new(Mutex::new(ObserverState {
            hashers: algorithms.iter().map(|algo| (*algo, algo.hasher())).collect(),
            bytes: 0,
            digests: None,
        })))
    }

    fn update(&self, chunk: &[u8]) {
        let mut state = self.0.lock().expect("digest observer poisoned");
        state.bytes += chunk.len() as u64;
        for (_, hasher) in &mut state.hashers {
            hasher.update(chunk);
        }
    }

    fn finish(&self) {
        let mut state = self.0.lock().expect("digest observer poisoned");
        if state.digests.is_some() {
            return;
        }
        let digests =
            state.hashers.drain(..).map(|(algo, hasher)| (algo.name().to_string(), hasher.finalize())).collect();
        state.digests = Some(digests);
    }

    /// The finished digest map, or `None` if the stream has not reached EOF.
    pub fn digests(&self) -> Option<BTreeMap<String, String>> {
        self.0.lock().expect("digest observer poisoned").digests.clone()
    }

    /// Bytes observed so far.
    pub fn bytes_seen(&self) -> u64 {
        self.0.lock().expect("digest observer poisoned").bytes
    }
}

impl ByteStream {
    /// Tee this stream through one or more running digests.
    ///
    /// The returned stream yields exactly the same chunks; the observer
    /// yields the lowercase-hex digest map once the stream is exhausted.
    pub fn observe(self, algorithms: &[HashAlgorithm]) -> (ByteStream, DigestObserver) {
        let observer = DigestObserver::new(algorithms);
        let tee = observer.clone();
        let (size, name) = (self.size, self.name.clone());
        let mut inner = self.inner;
        let wrapped = stream! {
            while let Some(chunk) = inner.next().await {
                if let Ok(bytes) = &chunk {
                    tee.update(bytes);
                }
                yield chunk;
            }
            tee.finish();
        };
        let mut stream = ByteStream::new(wrapped, size);
        stream.name = name;
        (stream, observer)
    }
}
