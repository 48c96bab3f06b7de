use std::io;

use thiserror::Error;

/// 記録ファイル読み込み時のエラー
#[derive(Debug, Error)]
pub enum FormatError {
    /// 終端以外の理由で読み込みに失敗
    #[error("I/O error while reading recording: {0}")]
    Io(#[from] io::Error),

    /// ヘッダー行またはレコードの途中で終端に達した
    #[error("Truncated recording: unexpected end of stream while reading {what}")]
    Truncated { what: &'static str },

    /// 先頭行が `BT-DUMP` ではない
    #[error("Not a bt-dump recording: expected magic \"BT-DUMP\", got {got:?}")]
    BadMagic { got: String },

    #[error("Unsupported recording version: {version}")]
    UnsupportedVersion { version: String },

    /// ヘッダー行の欠落または順序違い
    #[error("Expected header key \"{expected}\", got {got:?}")]
    UnexpectedKey { expected: String, got: String },

    #[error("Invalid value for header key \"{key}\": {value:?}")]
    InvalidValue { key: String, value: String },

    /// ヘッダー行に ASCII 以外のバイトが含まれる
    #[error("Header line is not ASCII text")]
    NonTextHeader,

    /// ボディ数が int32 に収まらない
    #[error("Body count out of range: {count}")]
    BodyCountOutOfRange { count: u32 },

    #[error("Invalid joint confidence level: {value}")]
    InvalidConfidence { value: u8 },
}

/// [`crate::recording::RecordingWriter`] のエラー
#[derive(Debug, Error)]
pub enum RecordingError {
    #[error("I/O error on recording stream: {0}")]
    Io(#[from] io::Error),

    #[error("Frame written before the recording header")]
    HeaderNotWritten,

    #[error("Recording header written twice")]
    HeaderAlreadyWritten,

    /// 以前の書き込みが失敗済み。末尾に書きかけのレコードが残っている可能性がある
    #[error("Recording stream failed earlier; no further writes are accepted")]
    Failed,

    /// ボディの関節数がヘッダーの `joint-count` と一致しない
    #[error("Body {body_id} has {got} joints, header declares {expected}")]
    JointCountMismatch {
        body_id: u32,
        expected: usize,
        got: usize,
    },
}

/// セッションを終わらせる致命的エラー。失敗した段階ごとに分ける
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session setup failed: {0:#}")]
    Setup(#[source] anyhow::Error),

    #[error("sensor failed: {0:#}")]
    Sensor(#[source] anyhow::Error),

    #[error("body tracker failed: {0:#}")]
    Tracker(#[source] anyhow::Error),

    #[error("recording failed: {0}")]
    Recording(#[from] RecordingError),
}

impl SessionError {
    /// 失敗した段階の短い名前（ログ用）
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Sensor(_) => "sensor",
            Self::Tracker(_) => "tracker",
            Self::Recording(_) => "recording",
        }
    }
}
