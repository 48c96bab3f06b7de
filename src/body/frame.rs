use serde::Serialize;

use super::joint::{JointId, JointPose};

/// デバイスタイムスタンプの分解能（1 tick = 100ns）
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// 検出された1人分のスケルトン
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedBody {
    /// フレーム内で一意なボディID
    pub id: u32,
    /// 関節インデックス順の姿勢（スケルトンモデルの関節数と同じ長さ）
    pub joints: Vec<JointPose>,
}

impl TrackedBody {
    pub fn new(id: u32, joints: Vec<JointPose>) -> Self {
        Self { id, joints }
    }

    /// 関節IDで姿勢を取得
    pub fn joint(&self, joint: JointId) -> Option<&JointPose> {
        self.joints.get(joint as usize)
    }
}

/// トラッカーが1キャプチャに対して出力する結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackedFrame {
    /// デバイスタイムスタンプ（100ns tick）
    pub device_timestamp: i64,
    pub bodies: Vec<TrackedBody>,
}

impl TrackedFrame {
    pub fn new(device_timestamp: i64, bodies: Vec<TrackedBody>) -> Self {
        Self {
            device_timestamp,
            bodies,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// タイムスタンプを秒で取得
    pub fn timestamp_secs(&self) -> f64 {
        self.device_timestamp as f64 / TICKS_PER_SECOND as f64
    }

    pub fn body(&self, id: u32) -> Option<&TrackedBody> {
        self.bodies.iter().find(|b| b.id == id)
    }
}
