use serde::Serialize;

use crate::device::{ColorResolution, DepthMode};
use crate::error::FormatError;

// --- データ構造 ---

named_enum! {
    /// 内部パラメータのレンズモデル
    pub enum CalibrationModelType {
        Unknown => "Unknown",
        Theta => "Theta",
        Polynomial3K => "Polynomial3K",
        Rational6KT => "Rational6KT",
        BrownConrady => "BrownConrady",
    }
}

/// 外部パラメータ（深度カメラ基準）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extrinsics {
    /// 回転行列 (row-major 3x3)
    pub rotation: [f32; 9],
    /// 並進ベクトル（ミリメートル）
    pub translation: [f32; 3],
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            translation: [0.0, 0.0, 0.0],
        }
    }
}

/// 内部パラメータ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intrinsics {
    pub model_type: CalibrationModelType,
    /// モデル依存のパラメータ列（可変長）
    pub parameters: Vec<f32>,
}

/// 単一カメラのキャリブレーション
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraCalibration {
    pub extrinsics: Extrinsics,
    pub intrinsics: Intrinsics,
}

/// センサーから読み出したデバイス全体のキャリブレーション
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCalibration {
    pub depth_camera: CameraCalibration,
    pub color_camera: CameraCalibration,
    pub depth_mode: DepthMode,
    pub color_resolution: ColorResolution,
}

// --- ヘッダ行 ---

const FIELDS: [&str; 4] = ["rotation", "translation", "type", "parameters"];

/// 1カメラ分のヘッダキーを出力順で返す
pub fn keys(prefix: &str) -> [String; 4] {
    FIELDS.map(|field| format!("device-{prefix}-calibration-{field}"))
}

/// キャリブレーションをヘッダ行（改行なし）に変換
///
/// 出力順: rotation, translation, type, parameters。
/// 浮動小数点は最短の往復可能な10進表記で出力する。
pub fn serialize(prefix: &str, cal: &CameraCalibration) -> Vec<String> {
    let [rotation, translation, model_type, parameters] = keys(prefix);
    vec![
        format!("{rotation}: {}", join_floats(&cal.extrinsics.rotation)),
        format!("{translation}: {}", join_floats(&cal.extrinsics.translation)),
        format!("{model_type}: {}", cal.intrinsics.model_type),
        format!("{parameters}: {}", join_floats(&cal.intrinsics.parameters)),
    ]
}

/// `serialize` の逆変換。`values` は `keys(prefix)` の順に並んだ値。
pub fn parse(prefix: &str, values: [&str; 4]) -> Result<CameraCalibration, FormatError> {
    let keys = keys(prefix);
    let rotation = parse_fixed::<9>(&keys[0], values[0])?;
    let translation = parse_fixed::<3>(&keys[1], values[1])?;
    let model_type = values[2]
        .parse::<CalibrationModelType>()
        .map_err(|_| invalid(&keys[2], values[2]))?;
    let parameters = parse_floats(&keys[3], values[3])?;

    Ok(CameraCalibration {
        extrinsics: Extrinsics {
            rotation,
            translation,
        },
        intrinsics: Intrinsics {
            model_type,
            parameters,
        },
    })
}

fn join_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_floats(key: &str, value: &str) -> Result<Vec<f32>, FormatError> {
    value
        .split_whitespace()
        .map(|s| s.parse::<f32>().map_err(|_| invalid(key, value)))
        .collect()
}

fn parse_fixed<const N: usize>(key: &str, value: &str) -> Result<[f32; N], FormatError> {
    let floats = parse_floats(key, value)?;
    floats.try_into().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> FormatError {
    FormatError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
