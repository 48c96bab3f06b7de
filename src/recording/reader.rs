use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::body::TrackedFrame;
use crate::error::FormatError;

use super::codec;
use super::header::RecordingHeader;

/// 記録ファイルの読み出し。ヘッダーを先に読み、レコードは必要な分だけ読む
///
/// レコードの境界で終われば正常終了。最初のエラーの後は何も返さない
/// （読み位置が分からなくなるため）。
pub struct RecordingReader<R: BufRead> {
    input: R,
    header: RecordingHeader,
    frames_read: u64,
    failed: bool,
}

impl RecordingReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> RecordingReader<R> {
    pub fn new(mut input: R) -> Result<Self, FormatError> {
        let header = RecordingHeader::read_from(&mut input)?;
        Ok(Self {
            input,
            header,
            frames_read: 0,
            failed: false,
        })
    }

    pub fn header(&self) -> &RecordingHeader {
        &self.header
    }

    /// これまでにデコードできたフレーム数
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn next_frame(&mut self) -> Result<Option<TrackedFrame>, FormatError> {
        if self.failed {
            return Ok(None);
        }
        match codec::decode(&mut self.input, self.header.joint_count) {
            Ok(Some(frame)) => {
                self.frames_read += 1;
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordingReader<R> {
    type Item = Result<TrackedFrame, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{ConfidenceLevel, JointPose, TrackedBody, JOINT_COUNT};
    use crate::recording::codec::record_size;
    use crate::recording::header::tests::sample_header;
    use crate::recording::RecordingWriter;

    fn frame(timestamp: i64, body_count: usize) -> TrackedFrame {
        let bodies = (0..body_count)
            .map(|b| {
                let joints = (0..JOINT_COUNT)
                    .map(|j| {
                        JointPose::new(
                            ConfidenceLevel::Medium,
                            [j as f32, b as f32, timestamp as f32],
                            [0.0, 0.0, 0.0, 1.0],
                        )
                    })
                    .collect();
                TrackedBody::new(b as u32 + 10, joints)
            })
            .collect();
        TrackedFrame::new(timestamp, bodies)
    }

    fn recording(frames: &[TrackedFrame]) -> Vec<u8> {
        let mut writer = RecordingWriter::new(Vec::new());
        writer.write_header(&sample_header()).unwrap();
        for f in frames {
            writer.write_frame(f).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn test_reads_frames_in_order() {
        let frames: Vec<_> = (0..5).map(|i| frame(i * 333_333, (i % 3) as usize)).collect();
        let bytes = recording(&frames);

        let reader = RecordingReader::new(bytes.as_slice()).unwrap();
        assert_eq!(reader.header(), &sample_header());
        let read: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(read, frames);
    }

    #[test]
    fn test_header_only_recording() {
        let bytes = recording(&[]);
        let mut reader = RecordingReader::new(bytes.as_slice()).unwrap();
        assert!(reader.next_frame().unwrap().is_none());
        assert_eq!(reader.frames_read(), 0);
    }

    #[test]
    fn test_truncation_at_record_boundaries() {
        let frames: Vec<_> = (0..4).map(|i| frame(i, i as usize)).collect();
        let bytes = recording(&frames);
        let header_len = sample_header().encoded_len();

        let mut boundary = header_len;
        for n in 0..=frames.len() {
            let reader = RecordingReader::new(&bytes[..boundary]).unwrap();
            let read: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
            assert_eq!(read, frames[..n]);
            if n < frames.len() {
                boundary += record_size(frames[n].body_count(), JOINT_COUNT);
            }
        }
        assert_eq!(boundary, bytes.len());
    }

    #[test]
    fn test_truncation_inside_record_is_an_error() {
        let frames = vec![frame(1, 1), frame(2, 2)];
        let bytes = recording(&frames);
        let cut = bytes.len() - 7;

        let mut reader = RecordingReader::new(&bytes[..cut]).unwrap();
        assert_eq!(reader.next_frame().unwrap(), Some(frames[0].clone()));
        let err = reader.next_frame().unwrap_err();
        assert!(matches!(err, FormatError::Truncated { .. }));
        assert_eq!(reader.frames_read(), 1);
        // 失敗後は何も返さない
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.btd");
        std::fs::write(&path, recording(&[frame(7, 1)])).unwrap();
        let mut reader = RecordingReader::open(&path).unwrap();
        assert_eq!(reader.next_frame().unwrap().map(|f| f.device_timestamp), Some(7));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            RecordingReader::open("/nonexistent/a.btd"),
            Err(FormatError::Io(_))
        ));
    }
}
