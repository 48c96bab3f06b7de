use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::body::TrackedFrame;

/// キャプチャループからビューアへ最新の結果だけを渡すスロット
///
/// `publish` は前の結果を置き換え、スロットの参照だけを手放す。読み手が
/// 同じ結果の `Arc` を持っていれば、その結果は読み手が手放すまで有効。
/// 読み出しは結果を消費しないので、次の `publish` まで同じ結果が返る。
pub struct LatestResultHandoff<T = TrackedFrame> {
    slot: Mutex<Option<Arc<T>>>,
    generation: AtomicU64,
}

impl<T> LatestResultHandoff<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// 結果を公開する。戻り値は公開後の世代番号。
    pub fn publish(&self, value: Arc<T>) -> u64 {
        let (previous, generation) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = slot.replace(value);
            // ロック内で更新し、世代とスロットの中身を一致させる
            (previous, self.generation.fetch_add(1, Ordering::AcqRel) + 1)
        };
        // 前の結果の解放はロックの外で
        drop(previous);
        generation
    }

    /// 現在の結果を取得（なければ None）
    pub fn read_latest(&self) -> Option<Arc<T>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 結果と、その結果が公開された世代番号を同時に取得
    pub fn read_with_generation(&self) -> (Option<Arc<T>>, u64) {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        (slot.clone(), self.generation.load(Ordering::Acquire))
    }

    /// 公開回数。新しい結果が来るたびに増える。
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl<T> Default for LatestResultHandoff<T> {
    fn default() -> Self {
        Self::new()
    }
}
