use std::io::{self, Read};

/// Growth step of the read buffer.
pub const CHUNK_SIZE: usize = 4096;

/// What one readiness notification produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes: Vec<u8>,
    /// The writer closed its end. Nothing more will arrive.
    pub eof: bool,
}

/// Read from a non-blocking source until it would block or reaches EOF.
///
/// The buffer grows by [`CHUNK_SIZE`] whenever it fills up; there is no
/// upper bound. Errors other than would-block and interrupted reads are
/// returned to the caller.
pub fn read_available<R: Read>(source: &mut R) -> io::Result<ReadOutcome> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut received = 0;
    let mut eof = false;

    loop {
        if received == buf.len() {
            buf.resize(buf.len() + CHUNK_SIZE, 0);
        }
        match source.read(&mut buf[received..]) {
            Ok(0) => {
                eof = true;
                break;
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    buf.truncate(received);
    Ok(ReadOutcome { bytes: buf, eof })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out scripted results, then reports would-block forever.
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Scripted {
        fn new(steps: Vec<io::Result<Vec<u8>>>) -> Self {
            Self(steps.into())
        }
    }

    impl Read for Scripted {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(mut data)) => {
                    let n = data.len().min(out.len());
                    out[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.0.push_front(Ok(data.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    #[test]
    fn would_block_before_data_yields_nothing() {
        let outcome = read_available(&mut Scripted::new(vec![])).unwrap();
        assert_eq!(outcome, ReadOutcome::default());
    }

    #[test]
    fn partial_reads_are_joined() {
        let mut source = Scripted::new(vec![
            Ok(b"[{\"full_".to_vec()),
            Err(io::ErrorKind::Interrupted.into()),
            Ok(b"text\":\"a\"}]".to_vec()),
        ]);
        let outcome = read_available(&mut source).unwrap();
        assert_eq!(outcome.bytes, b"[{\"full_text\":\"a\"}]");
        assert!(!outcome.eof);
    }

    #[test]
    fn buffer_grows_past_one_chunk() {
        let big = vec![b'x'; CHUNK_SIZE * 3 + 17];
        let outcome = read_available(&mut Scripted::new(vec![Ok(big.clone())])).unwrap();
        assert_eq!(outcome.bytes.len(), big.len());
    }

    #[test]
    fn eof_keeps_bytes_read_before_it() {
        let mut source = Scripted::new(vec![Ok(b"bye\n".to_vec()), Ok(Vec::new())]);
        let outcome = read_available(&mut source).unwrap();
        assert_eq!(outcome.bytes, b"bye\n");
        assert!(outcome.eof);
    }

    #[test]
    fn other_errors_are_returned() {
        let mut source = Scripted::new(vec![Err(io::ErrorKind::BrokenPipe.into())]);
        assert!(read_available(&mut source).is_err());
    }
}
