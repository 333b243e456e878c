//! Raw RGB24 frame reads shared by the device camera and the file reader.

use std::io::{self, ErrorKind, Read};

/// Result of reading one fixed-size frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FrameRead {
    /// Buffer completely filled
    Full,
    /// Stream ended exactly on a frame boundary
    Eof,
    /// Stream ended after `n` bytes of a frame
    Partial(usize),
}

pub(crate) fn read_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<FrameRead> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(match filled {
        0 => FrameRead::Eof,
        n if n == buf.len() => FrameRead::Full,
        n => FrameRead::Partial(n),
    })
}
