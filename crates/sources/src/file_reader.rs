//! FileFrameReader - 顺序读取原始 RGB24 帧文件
//!
//! 文件为若干帧紧密拼接，帧尺寸由配置给出。打开前先 `probe` 得到总帧数，
//! 批处理重组表按此预分配。读到文件末尾 (帧边界) 是正常结束；
//! 末尾残缺帧视为读取错误。

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use contracts::{DataSource, Exhaustion, Frame, SourceError, SourceId};
use tracing::{info, warn};

use crate::frame_io::{read_frame, FrameRead};

/// 原始帧文件读取器
#[derive(Debug, Clone)]
pub struct FileFrameReader {
    id: SourceId,
    path: PathBuf,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl FileFrameReader {
    /// 探测文件并计算总帧数
    ///
    /// # Errors
    /// 文件不存在或无法读取元数据时返回 `SourceError::Open`
    pub fn probe(
        id: impl Into<SourceId>,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<Self, SourceError> {
        let id = id.into();
        let frame_len = Frame::byte_len(width, height) as u64;
        if frame_len == 0 {
            return Err(SourceError::open(&id, "frame size is zero"));
        }

        let len = std::fs::metadata(path)
            .map_err(|e| SourceError::open(&id, format!("{}: {e}", path.display())))?
            .len();
        let frame_count = len / frame_len;
        if len % frame_len != 0 {
            warn!(
                source_id = %id,
                path = %path.display(),
                trailing_bytes = len % frame_len,
                "input ends with a partial frame"
            );
        }

        info!(source_id = %id, path = %path.display(), frame_count, "probed frame file");
        Ok(Self {
            id,
            path: path.to_path_buf(),
            width,
            height,
            frame_count,
        })
    }

    /// 总帧数
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileFrameReader {
    type Item = Frame;
    type Handle = BufReader<File>;

    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn exhaustion(&self) -> Exhaustion {
        Exhaustion::Graceful
    }

    fn expected_len(&self) -> Option<u64> {
        Some(self.frame_count)
    }

    fn open(&mut self) -> Result<BufReader<File>, SourceError> {
        File::open(&self.path)
            .map(BufReader::new)
            .map_err(|e| SourceError::open(&self.id, format!("{}: {e}", self.path.display())))
    }

    fn read_next(&mut self, handle: &mut BufReader<File>) -> Result<Frame, SourceError> {
        let mut buf = vec![0u8; Frame::byte_len(self.width, self.height)];
        match read_frame(handle, &mut buf) {
            Ok(FrameRead::Full) => Frame::new(self.width, self.height, buf)
                .map_err(|e| SourceError::read(&self.id, e.to_string())),
            Ok(FrameRead::Eof) => Err(SourceError::end_of_stream(&self.id)),
            Ok(FrameRead::Partial(n)) => Err(SourceError::read(
                &self.id,
                format!("truncated frame: {n} of {} bytes", buf.len()),
            )),
            Err(e) => Err(SourceError::read(&self.id, e.to_string())),
        }
    }

    fn close(&mut self, handle: BufReader<File>) {
        drop(handle);
    }
}
