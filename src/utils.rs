use crate::error::{Result, SieveError};
use flate2::read::GzDecoder;
use std::fs::OpenOptions;
use std::io::{self, stdin, BufReader, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn realtime() -> f64 {
    let now = SystemTime::now();
    let since_epoch = now.duration_since(UNIX_EPOCH).expect("Time went backwards");
    since_epoch.as_secs_f64()
}

pub fn cputime() -> f64 {
    let rusage = unsafe {
        let mut rusage = std::mem::MaybeUninit::uninit();
        libc::getrusage(libc::RUSAGE_SELF, rusage.as_mut_ptr());
        rusage.assume_init()
    };
    let user_time = rusage.ru_utime;
    let sys_time = rusage.ru_stime;
    (user_time.tv_sec as f64 + user_time.tv_usec as f64 * 1e-6)
        + (sys_time.tv_sec as f64 + sys_time.tv_usec as f64 * 1e-6)
}

pub fn xopen(path: &Path) -> io::Result<Box<dyn Read>> {
    if path.to_str() == Some("-") {
        return Ok(Box::new(BufReader::new(stdin())));
    }

    let file = OpenOptions::new().read(true).open(path)?;
    Ok(Box::new(BufReader::new(file)))
}

pub fn xzopen(path: &Path) -> io::Result<Box<dyn Read>> {
    let input = xopen(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(input)))
    } else {
        Ok(input)
    }
}

/// Reads the whole text as opaque bytes; no normalisation, no trimming.
pub fn read_text(path: &Path) -> Result<Vec<u8>> {
    let mut reader = xzopen(path).map_err(|e| SieveError::io(path, e))?;
    let mut text = Vec::new();
    reader
        .read_to_end(&mut text)
        .map_err(|e| SieveError::io(path, e))?;
    Ok(text)
}

/// Reads queries, one per line. Empty lines are preserved as empty queries;
/// callers typically filter them.
pub fn read_queries(path: &Path) -> Result<Vec<Vec<u8>>> {
    let content = read_text(path)?;
    let mut queries: Vec<Vec<u8>> = content
        .split(|&b| b == b'\n')
        .map(<[u8]>::to_vec)
        .collect();
    if queries.last().is_some_and(Vec::is_empty) {
        queries.pop(); // final newline, not an empty query
    }
    Ok(queries)
}
