use serde::Serialize;

/// ボディトラッキングのスケルトン定義 (32 関節)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum JointId {
    Pelvis = 0,
    SpineNavel = 1,
    SpineChest = 2,
    Neck = 3,
    ClavicleLeft = 4,
    ShoulderLeft = 5,
    ElbowLeft = 6,
    WristLeft = 7,
    HandLeft = 8,
    HandTipLeft = 9,
    ThumbLeft = 10,
    ClavicleRight = 11,
    ShoulderRight = 12,
    ElbowRight = 13,
    WristRight = 14,
    HandRight = 15,
    HandTipRight = 16,
    ThumbRight = 17,
    HipLeft = 18,
    KneeLeft = 19,
    AnkleLeft = 20,
    FootLeft = 21,
    HipRight = 22,
    KneeRight = 23,
    AnkleRight = 24,
    FootRight = 25,
    Head = 26,
    Nose = 27,
    EyeLeft = 28,
    EarLeft = 29,
    EyeRight = 30,
    EarRight = 31,
}

/// スケルトンモデルの関節数。ヘッダの `joint-count` に書き込まれる。
pub const JOINT_COUNT: usize = JointId::COUNT;

impl JointId {
    pub const COUNT: usize = 32;

    const ALL: [JointId; JointId::COUNT] = [
        Self::Pelvis,
        Self::SpineNavel,
        Self::SpineChest,
        Self::Neck,
        Self::ClavicleLeft,
        Self::ShoulderLeft,
        Self::ElbowLeft,
        Self::WristLeft,
        Self::HandLeft,
        Self::HandTipLeft,
        Self::ThumbLeft,
        Self::ClavicleRight,
        Self::ShoulderRight,
        Self::ElbowRight,
        Self::WristRight,
        Self::HandRight,
        Self::HandTipRight,
        Self::ThumbRight,
        Self::HipLeft,
        Self::KneeLeft,
        Self::AnkleLeft,
        Self::FootLeft,
        Self::HipRight,
        Self::KneeRight,
        Self::AnkleRight,
        Self::FootRight,
        Self::Head,
        Self::Nose,
        Self::EyeLeft,
        Self::EarLeft,
        Self::EyeRight,
        Self::EarRight,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 全関節をインデックス順に返す
    pub fn iter() -> impl Iterator<Item = JointId> {
        Self::ALL.into_iter()
    }
}

/// 関節の信頼度 (低 → 高)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[repr(u8)]
pub enum ConfidenceLevel {
    /// 範囲外（検出されていない）
    #[default]
    None = 0,
    /// 推定値（隠れている関節）
    Low = 1,
    /// 観測値
    Medium = 2,
    /// 予約（現行のトラッカーは出力しない）
    High = 3,
}

impl ConfidenceLevel {
    pub const COUNT: usize = 4;

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// 単一関節の姿勢
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointPose {
    pub confidence: ConfidenceLevel,
    /// 位置 (x, y, z)、深度カメラ座標系のミリメートル
    pub position: [f32; 3],
    /// 回転 (クォータニオン: x, y, z, w)
    pub orientation: [f32; 4],
}

impl JointPose {
    pub fn new(confidence: ConfidenceLevel, position: [f32; 3], orientation: [f32; 4]) -> Self {
        Self {
            confidence,
            position,
            orientation,
        }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: ConfidenceLevel) -> bool {
        self.confidence >= threshold
    }
}

impl Default for JointPose {
    fn default() -> Self {
        Self {
            confidence: ConfidenceLevel::None,
            position: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
