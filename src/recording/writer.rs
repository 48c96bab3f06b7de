use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::body::TrackedFrame;
use crate::error::RecordingError;

use super::codec;
use super::header::RecordingHeader;

/// 次の書き込みがファイルのどの部分に属するか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// まだ何も書いていない。ヘッダのみ書ける
    Header,
    /// ヘッダ書き込み済み。以降はフレームレコード
    Data { joint_count: usize },
    /// 書き込みに失敗した。ストリーム末尾に書きかけのバイトが残っている可能性がある
    Failed,
}

/// 記録の書き出し: テキストヘッダを1回、その後フレームごとにバイナリレコードを1つ
///
/// レコードは全体をエンコードしてから1回の `write_all` で書き、flush する。
/// 書き込みが失敗した場合は `Failed` になり、以降の書き込みは全て拒否される。
/// `bytes_written` は常に最後に書き切ったレコードの末尾を指すので、
/// ファイルなら [`RecordingWriter::discard_partial_record`] でそこまで切り詰められる。
pub struct RecordingWriter<W: Write> {
    out: W,
    state: WriterState,
    frames_written: u64,
    bytes_written: u64,
}

impl RecordingWriter<File> {
    /// `path` のファイルを作成（既存なら切り詰め）
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecordingError> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }

    /// 失敗した書き込みの残骸を捨て、ファイルを最後の完全なレコードの末尾で切る
    pub fn discard_partial_record(&mut self) -> Result<(), RecordingError> {
        if self.state != WriterState::Failed {
            return Ok(());
        }
        self.out.set_len(self.bytes_written)?;
        self.out.seek(SeekFrom::Start(self.bytes_written))?;
        self.out.sync_data()?;
        Ok(())
    }
}

impl<W: Write> RecordingWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: WriterState::Header,
            frames_written: 0,
            bytes_written: 0,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// 書き切ったバイト数（ヘッダ込み）
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn write_header(&mut self, header: &RecordingHeader) -> Result<(), RecordingError> {
        match self.state {
            WriterState::Header => {}
            WriterState::Data { .. } => return Err(RecordingError::HeaderAlreadyWritten),
            WriterState::Failed => return Err(RecordingError::Failed),
        }
        let mut buf = Vec::with_capacity(header.encoded_len());
        header.write_to(&mut buf)?;
        self.append(&buf)?;
        self.state = WriterState::Data {
            joint_count: header.joint_count,
        };
        Ok(())
    }

    pub fn write_frame(&mut self, frame: &TrackedFrame) -> Result<(), RecordingError> {
        let joint_count = match self.state {
            WriterState::Data { joint_count } => joint_count,
            WriterState::Header => return Err(RecordingError::HeaderNotWritten),
            WriterState::Failed => return Err(RecordingError::Failed),
        };
        if let Some(body) = frame.bodies.iter().find(|b| b.joints.len() != joint_count) {
            return Err(RecordingError::JointCountMismatch {
                body_id: body.id,
                expected: joint_count,
                got: body.joints.len(),
            });
        }

        let record = codec::encode(frame);
        self.append(&record)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), RecordingError> {
        // write_all は途中まで書いて失敗することがある。以降のレコードがずれないよう停止する
        if let Err(e) = self.out.write_all(bytes).and_then(|_| self.out.flush()) {
            self.state = WriterState::Failed;
            return Err(e.into());
        }
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }
}
