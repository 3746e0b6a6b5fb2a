//! 输出队列.
//!
//! 解码侧写入, 调用方非阻塞取出. 每个队列有自己的锁, 入队与出队都是 O(1).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 线程安全的 FIFO 队列, clone 后共享同一队列
#[derive(Debug)]
pub struct OutputQueue<T> {
    items: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for OutputQueue<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for OutputQueue<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<T> OutputQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 追加到队尾
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
    }

    /// 取出队首, 队列为空时立即返回 None
    pub fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 清空队列
    pub fn clear(&self) {
        self.lock().clear();
    }
}
