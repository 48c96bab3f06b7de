use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::body::{ConfidenceLevel, JointPose, TrackedBody, TrackedFrame};
use crate::error::FormatError;

// レコード形式（すべてリトルエンディアン、ヘッダー直後から連続）:
//
//   i64   デバイスタイムスタンプ (100ns 単位)
//   i32   ボディ数
//   ボディ数だけ:
//       u32   ボディ ID
//       関節数（ヘッダーの joint-count）だけ:
//           u8    信頼度
//           f32   x, y, z
//           f32   qx, qy, qz, qw
//
// サイズはボディ数と関節数だけで決まるので、先読みせずに次のレコードを読める

/// タイムスタンプ + ボディ数
pub const FRAME_HEADER_SIZE: usize = 8 + 4;
pub const BODY_HEADER_SIZE: usize = 4;
/// 信頼度 + 位置 + 姿勢
pub const JOINT_RECORD_SIZE: usize = 1 + 3 * 4 + 4 * 4;

/// ボディ数 `body_count`、関節数 `joint_count` のレコードサイズ
pub fn record_size(body_count: usize, joint_count: usize) -> usize {
    FRAME_HEADER_SIZE + body_count * (BODY_HEADER_SIZE + joint_count * JOINT_RECORD_SIZE)
}

/// 1フレームを新しいバッファにエンコード
pub fn encode(frame: &TrackedFrame) -> Vec<u8> {
    let joint_count = frame.bodies.first().map_or(0, |b| b.joints.len());
    let mut buf = Vec::with_capacity(record_size(frame.body_count(), joint_count));
    encode_into(frame, &mut buf);
    buf
}

/// `buf` の末尾に1フレーム分のレコードを追加する。メモリ上の追記なので失敗しない。
pub fn encode_into(frame: &TrackedFrame, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&frame.device_timestamp.to_le_bytes());
    buf.extend_from_slice(&(frame.body_count() as i32).to_le_bytes());
    for body in &frame.bodies {
        buf.extend_from_slice(&body.id.to_le_bytes());
        for joint in &body.joints {
            buf.push(joint.confidence.as_u8());
            for v in joint.position.iter().chain(&joint.orientation) {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
}

/// `r` から次のレコードをデコードする。
///
/// レコードの境界でちょうど終わっていれば `Ok(None)`。レコードの途中で
/// 終わっていれば [`FormatError::Truncated`]。
pub fn decode<R: Read>(r: &mut R, joint_count: usize) -> Result<Option<TrackedFrame>, FormatError> {
    let mut timestamp = [0u8; 8];
    if !read_record_start(r, &mut timestamp)? {
        return Ok(None);
    }
    let device_timestamp = i64::from_le_bytes(timestamp);

    let raw_count = r.read_u32::<LittleEndian>().map_err(truncated("body count"))?;
    if raw_count > i32::MAX as u32 {
        return Err(FormatError::BodyCountOutOfRange { count: raw_count });
    }
    let body_count = raw_count as usize;

    // 破損したカウントで巨大な確保をしないよう上限を付ける
    let mut bodies = Vec::with_capacity(body_count.min(16));
    for _ in 0..body_count {
        let id = r.read_u32::<LittleEndian>().map_err(truncated("body id"))?;
        let mut joints = Vec::with_capacity(joint_count.min(256));
        for _ in 0..joint_count {
            joints.push(decode_joint(r)?);
        }
        bodies.push(TrackedBody::new(id, joints));
    }

    Ok(Some(TrackedFrame::new(device_timestamp, bodies)))
}

/// `bytes` の先頭から1フレームをデコードし、消費したバイト数と一緒に返す
pub fn decode_slice(bytes: &[u8], joint_count: usize) -> Result<(TrackedFrame, usize), FormatError> {
    let mut cursor = bytes;
    match decode(&mut cursor, joint_count)? {
        Some(frame) => Ok((frame, bytes.len() - cursor.len())),
        None => Err(FormatError::Truncated { what: "frame timestamp" }),
    }
}

fn decode_joint<R: Read>(r: &mut R) -> Result<JointPose, FormatError> {
    let raw = r.read_u8().map_err(truncated("joint confidence"))?;
    let confidence =
        ConfidenceLevel::from_u8(raw).ok_or(FormatError::InvalidConfidence { value: raw })?;

    let mut values = [0f32; 7];
    r.read_f32_into::<LittleEndian>(&mut values)
        .map_err(truncated("joint pose"))?;

    Ok(JointPose::new(
        confidence,
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5], values[6]],
    ))
}

/// `buf` を埋める。1バイトも読めなければ正常終端 (false)、途中までなら Truncated
fn read_record_start<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<bool, FormatError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(FormatError::Truncated { what: "frame timestamp" }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FormatError::Io(e)),
        }
    }
    Ok(true)
}

fn truncated(what: &'static str) -> impl Fn(io::Error) -> FormatError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FormatError::Truncated { what }
        } else {
            FormatError::Io(e)
        }
    }
}
