//! Byte-streamed reads with progress reporting and cooperative cancellation.

use std::fs;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::LoadError;

const CHUNK_SIZE: usize = 64 * 1024;

pub struct Response {
    pub body: Box<dyn Read + Send>,
    pub content_length: Option<u64>,
}

/// Where image bytes come from. The viewer only ever issues GETs.
pub trait Fetcher: Send + Sync {
    fn get(&self, source: &str) -> Result<Response, LoadError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsFetcher;

impl Fetcher for FsFetcher {
    fn get(&self, source: &str) -> Result<Response, LoadError> {
        let io_err = |source_err| LoadError::Io { path: source.to_string(), source: source_err };
        let file = fs::File::open(source).map_err(io_err)?;
        let content_length = file.metadata().ok().map(|m| m.len());
        Ok(Response { body: Box::new(file), content_length })
    }
}

/// Reads the whole body, calling `on_progress(loaded, total)` after every chunk.
///
/// Returns `Ok(None)` as soon as `cancel` is observed; nothing is reported after that.
pub fn read_streamed(
    fetcher: &dyn Fetcher,
    source: &str,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<Option<Vec<u8>>, LoadError> {
    if cancel.load(Ordering::Acquire) {
        return Ok(None);
    }
    let Response { mut body, content_length } = fetcher.get(source)?;
    let total = content_length.filter(|&n| n > 0);

    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.load(Ordering::Acquire) {
            return Ok(None);
        }
        let n = body
            .read(&mut chunk)
            .map_err(|e| LoadError::Io { path: source.to_string(), source: e })?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        on_progress(bytes.len() as u64, total);
    }

    if cancel.load(Ordering::Acquire) {
        return Ok(None);
    }
    if bytes.is_empty() {
        return Err(LoadError::Empty(source.to_string()));
    }
    Ok(Some(bytes))
}
