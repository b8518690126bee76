use crate::shared::SharedPtr;
use crate::sync::Mutex;
use std::fmt;

/// Failure of [`AtomicSharedPtr::compare_exchange`].
///
/// 比较交换失败时返回的值。
pub struct CompareExchangeError<T: ?Sized> {
    /// The value held by the location at the time of the comparison.
    /// 比较时该位置持有的值。
    pub current: SharedPtr<T>,
    /// The value that would have been stored, handed back to the caller.
    /// 本应写入的新值，原样交还给调用者。
    pub new: SharedPtr<T>,
}

impl<T: ?Sized> fmt::Debug for CompareExchangeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompareExchangeError")
            .field("current", &self.current)
            .field("new", &self.new)
            .finish()
    }
}

/// A shared location holding a `SharedPtr` that several threads may read and
/// replace.
///
/// A handle is two words wide, so the location is guarded by a lock. The only
/// operations ever applied to the stored handle are clone, move and swap.
/// Handles displaced by `store` are dropped after the lock is released, so a
/// deleter never runs while other threads wait on the location.
///
/// **Typical Usage**:
/// ```
/// use shared_ptr::{AtomicSharedPtr, SharedPtr};
///
/// let config = AtomicSharedPtr::new(SharedPtr::new(1u32));
///
/// // Reader threads:
/// let snapshot = config.load();
/// assert_eq!(*snapshot, 1);
///
/// // Writer thread:
/// config.store(SharedPtr::new(2u32));
/// assert_eq!(*config.load(), 2);
/// assert_eq!(*snapshot, 1);
/// ```
///
/// 一个持有 `SharedPtr` 的共享位置，多个线程可以读取和替换它。
/// 句柄有两个字宽，因此该位置由锁保护。对存储句柄施加的操作只有克隆、移动和交换。
/// 被 `store` 替换下来的句柄在释放锁之后才 drop，因此删除器不会在其他线程
/// 等待该位置时运行。
pub struct AtomicSharedPtr<T: ?Sized> {
    slot: Mutex<SharedPtr<T>>,
}

impl<T: ?Sized> AtomicSharedPtr<T> {
    /// A location initially holding `value`.
    /// 创建一个初始持有 `value` 的位置。
    #[inline]
    pub fn new(value: SharedPtr<T>) -> Self {
        Self {
            slot: Mutex::new(value),
        }
    }

    /// Always `false`: access goes through a lock.
    /// 始终为 `false`：访问经过锁。
    #[inline]
    pub fn is_lock_free(&self) -> bool {
        false
    }

    /// A new owner of the currently stored handle.
    /// 当前存储句柄的一个新拥有者。
    #[inline]
    pub fn load(&self) -> SharedPtr<T> {
        self.slot.lock().clone()
    }

    /// Replace the stored handle with `value`.
    /// 用 `value` 替换存储的句柄。
    #[inline]
    pub fn store(&self, value: SharedPtr<T>) {
        drop(self.swap(value));
    }

    /// Replace the stored handle with `value`, returning the previous one.
    /// 用 `value` 替换存储的句柄，并返回之前的句柄。
    #[inline]
    pub fn swap(&self, mut value: SharedPtr<T>) -> SharedPtr<T> {
        self.slot.lock().swap(&mut value);
        value
    }

    /// Store `new` if the location still holds `current`.
    ///
    /// Two handles are equivalent when they expose the same pointer and share
    /// the same control block. On success the previous handle is returned; on
    /// failure the caller gets both the current value and `new` back.
    ///
    /// Since the location is guarded by a lock, this never fails spuriously.
    ///
    /// 如果该位置仍持有 `current`，则写入 `new`。
    /// 两个句柄等价，当且仅当它们暴露相同指针并共享同一个控制块。
    /// 成功时返回之前的句柄；失败时把当前值和 `new` 一并交还调用者。
    pub fn compare_exchange(
        &self,
        current: &SharedPtr<T>,
        mut new: SharedPtr<T>,
    ) -> Result<SharedPtr<T>, CompareExchangeError<T>> {
        let mut slot = self.slot.lock();
        if *slot == *current && slot.owner_eq(current) {
            slot.swap(&mut new);
            drop(slot);
            Ok(new)
        } else {
            let current = slot.clone();
            drop(slot);
            Err(CompareExchangeError { current, new })
        }
    }

    /// Same as [`compare_exchange`](Self::compare_exchange). A lock-guarded
    /// location never fails spuriously.
    ///
    /// 与 [`compare_exchange`](Self::compare_exchange) 相同。由锁保护的位置不会伪失败。
    #[inline]
    pub fn compare_exchange_weak(
        &self,
        current: &SharedPtr<T>,
        new: SharedPtr<T>,
    ) -> Result<SharedPtr<T>, CompareExchangeError<T>> {
        self.compare_exchange(current, new)
    }

    /// Consume the location, returning the stored handle.
    /// 消耗该位置，返回存储的句柄。
    #[inline]
    pub fn into_inner(self) -> SharedPtr<T> {
        self.slot.into_inner()
    }
}

impl<T: ?Sized> Default for AtomicSharedPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::new(SharedPtr::null())
    }
}

impl<T: ?Sized> From<SharedPtr<T>> for AtomicSharedPtr<T> {
    #[inline]
    fn from(value: SharedPtr<T>) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> fmt::Debug for AtomicSharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicSharedPtr").field(&*self.slot.lock()).finish()
    }
}
