use std::path::Path;
use std::{fs, io};
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

pub(crate) fn file_to_vec<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
    let file_in = fs::File::open(filename)?;
    let file_reader = BufReader::new(file_in);
    file_reader.lines().collect()
}

pub(crate) fn trace(l_type: &str, l_step: &str, start: Instant, prev_elapsed: Duration) -> Duration {
    let elapsed = start.elapsed();
    log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, elapsed, l_step, elapsed - prev_elapsed);
    elapsed
}
