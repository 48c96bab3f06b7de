use std::io::{self, BufRead, Read, Write};
use std::str::FromStr;

use serde::Serialize;

use crate::calibration::{self, CameraCalibration};
use crate::device::{ColorResolution, DepthMode, FirmwareVersion, HardwareVersion};
use crate::error::FormatError;

pub const MAGIC: &str = "BT-DUMP";
pub const FORMAT_VERSION: u32 = 1;
pub const DATA_SENTINEL: &str = "data:";

/// ヘッダー1行の上限。これを超えて改行が無ければ諦める
const MAX_LINE_LEN: usize = 64 * 1024;

/// 記録ファイルのテキストヘッダー
///
/// `BT-DUMP` の行に続いて ASCII の `key: value` 行が固定順で並び、`data:` 行で
/// 終わる。長さの前置きは無く、バイナリのレコードは `data:` の改行の直後から始まる。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingHeader {
    pub version: u32,
    pub device_version: HardwareVersion,
    pub serial_number: String,
    pub color_resolution: ColorResolution,
    pub depth_mode: DepthMode,
    pub depth_calibration: CameraCalibration,
    pub color_calibration: CameraCalibration,
    pub joint_count: usize,
}

impl RecordingHeader {
    /// ファイル順のヘッダー行（改行なし）。最後は `data:`
    pub fn lines(&self) -> Vec<String> {
        let v = &self.device_version;
        let mut lines = vec![
            MAGIC.to_string(),
            format!("V: {}", self.version),
            format!("device-version-audio: {}", v.audio),
            format!("device-version-depth: {}", v.depth),
            format!("device-version-depth-sensor: {}", v.depth_sensor),
            format!("device-version-firmware-build: {}", v.firmware_build),
            format!("device-version-firmware-signature: {}", v.firmware_signature),
            format!("device-version-rgb: {}", v.rgb),
            format!("device-sn: {}", self.serial_number),
            format!("device-color-resolution: {}", self.color_resolution),
            format!("device-depth-mode: {}", self.depth_mode),
        ];
        lines.extend(calibration::serialize("depth", &self.depth_calibration));
        lines.extend(calibration::serialize("color", &self.color_calibration));
        lines.push(format!("joint-count: {}", self.joint_count));
        lines.push(DATA_SENTINEL.to_string());
        lines
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for line in self.lines() {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    /// `data:` 行までヘッダーを読む。
    ///
    /// 成功時、`r` は最初のレコードの先頭を指している。
    pub fn read_from<R: BufRead>(r: &mut R) -> Result<Self, FormatError> {
        let mut lines = HeaderLines { reader: r };

        let magic = lines.next_line()?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic { got: magic });
        }
        let version = lines.field("V")?;
        if version.parse::<u32>().ok() != Some(FORMAT_VERSION) {
            return Err(FormatError::UnsupportedVersion { version });
        }

        let audio = lines.parse::<FirmwareVersion>("device-version-audio")?;
        let depth = lines.parse::<FirmwareVersion>("device-version-depth")?;
        let depth_sensor = lines.parse::<FirmwareVersion>("device-version-depth-sensor")?;
        let firmware_build = lines.parse("device-version-firmware-build")?;
        let firmware_signature = lines.parse("device-version-firmware-signature")?;
        let rgb = lines.parse::<FirmwareVersion>("device-version-rgb")?;
        let serial_number = lines.field("device-sn")?;
        let color_resolution = lines.parse("device-color-resolution")?;
        let depth_mode = lines.parse("device-depth-mode")?;
        let depth_calibration = lines.calibration("depth")?;
        let color_calibration = lines.calibration("color")?;
        let joint_count = lines.parse::<usize>("joint-count")?;

        let sentinel = lines.next_line()?;
        if sentinel != DATA_SENTINEL {
            return Err(FormatError::UnexpectedKey {
                expected: DATA_SENTINEL.to_string(),
                got: sentinel,
            });
        }

        Ok(Self {
            version: FORMAT_VERSION,
            device_version: HardwareVersion {
                rgb,
                depth,
                audio,
                depth_sensor,
                firmware_build,
                firmware_signature,
            },
            serial_number,
            color_resolution,
            depth_mode,
            depth_calibration,
            color_calibration,
            joint_count,
        })
    }

    /// ヘッダーのバイト数（= 最初のレコードのファイル内オフセット）
    pub fn encoded_len(&self) -> usize {
        self.lines().iter().map(|l| l.len() + 1).sum()
    }
}

struct HeaderLines<'a, R> {
    reader: &'a mut R,
}

impl<R: BufRead> HeaderLines<'_, R> {
    fn next_line(&mut self) -> Result<String, FormatError> {
        let mut buf = Vec::new();
        let n = (&mut *self.reader)
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut buf)?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Err(FormatError::Truncated { what: "header line" });
        }
        buf.pop();
        if !buf.is_ascii() {
            return Err(FormatError::NonTextHeader);
        }
        String::from_utf8(buf).map_err(|_| FormatError::NonTextHeader)
    }

    /// 次の行を読み、キーが一致すれば値を返す
    fn field(&mut self, key: &str) -> Result<String, FormatError> {
        let line = self.next_line()?;
        let value = line
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest).to_string());
        value.ok_or_else(|| FormatError::UnexpectedKey {
            expected: key.to_string(),
            got: line,
        })
    }

    fn parse<T: FromStr>(&mut self, key: &str) -> Result<T, FormatError> {
        let value = self.field(key)?;
        value.parse::<T>().map_err(|_| FormatError::InvalidValue {
            key: key.to_string(),
            value,
        })
    }

    fn calibration(&mut self, prefix: &str) -> Result<CameraCalibration, FormatError> {
        let keys = calibration::keys(prefix);
        let rotation = self.field(&keys[0])?;
        let translation = self.field(&keys[1])?;
        let model_type = self.field(&keys[2])?;
        let parameters = self.field(&keys[3])?;
        calibration::parse(prefix, [&rotation, &translation, &model_type, &parameters])
    }
}
