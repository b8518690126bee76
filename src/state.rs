use crate::block::BlockVTable;
use crate::sync::{AtomicUsize, Ordering, fence};
use std::ptr::NonNull;

/// Counter value past which an increment aborts the process.
///
/// Leaking handles with `mem::forget` in a loop could otherwise wrap a counter
/// and free a live block.
///
/// 计数器超过该值时自增会中止进程。
/// 否则循环中 `mem::forget` 句柄可能让计数器回绕，进而释放仍在使用的控制块。
pub(crate) const MAX_REFCOUNT: usize = isize::MAX as usize;

/// The non-polymorphic prefix shared by every control block.
///
/// Counters are read and updated directly; only the two teardown steps go
/// through `vtable`.
///
/// `weak` holds one extra reference on behalf of all strong owners together,
/// released by whichever strong release brings `strong` to zero.
///
/// 所有控制块共享的非多态前缀。
/// 计数器被直接读写；只有两个拆除步骤经过 `vtable`。
/// `weak` 额外持有一个代表"所有强引用整体"的引用，
/// 由把 `strong` 降到零的那次释放归还。
#[derive(Debug)]
#[repr(C)]
pub(crate) struct BlockHeader {
    /// Number of owning handles.
    /// 拥有型句柄的数量。
    pub(crate) strong: AtomicUsize,
    /// Number of observers, plus one while any owner exists.
    /// 观察者数量，只要存在拥有者就额外加一。
    pub(crate) weak: AtomicUsize,
    pub(crate) vtable: &'static BlockVTable,
}

impl BlockHeader {
    /// A header for a block that is about to be handed to its first owner.
    #[inline]
    pub(crate) fn new(vtable: &'static BlockVTable) -> Self {
        Self {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
            vtable,
        }
    }

    #[inline]
    pub(crate) fn strong_count(&self) -> usize {
        self.strong.load(Ordering::Acquire)
    }

    /// Add an owner. The caller already holds one, so atomicity is enough.
    #[inline]
    pub(crate) fn increment_strong(&self) {
        if self.strong.fetch_add(1, Ordering::Relaxed) > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Add an observer. The caller already holds a strong or weak reference.
    #[inline]
    pub(crate) fn increment_weak(&self) {
        if self.weak.fetch_add(1, Ordering::Relaxed) > MAX_REFCOUNT {
            std::process::abort();
        }
    }

    /// Add an owner only if one still exists.
    ///
    /// The zero check and the increment form a single compare-exchange, so a
    /// concurrent final release can never be resurrected.
    ///
    /// 仅当仍有拥有者时才增加拥有者。
    /// 零值检查与自增是同一次 compare-exchange，因此并发的最后一次释放不会被"复活"。
    #[inline]
    pub(crate) fn try_increment_strong(&self) -> bool {
        let mut current = self.strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                std::process::abort();
            }
            match self.strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Drop one owner of `block`.
///
/// `Alive -> PointeeReleased`: the release that takes `strong` to zero runs
/// the pointee teardown, then gives back the weak reference held for the
/// owners.
///
/// 释放 `block` 的一个拥有者。
/// `Alive -> PointeeReleased`：把 `strong` 降为零的那次释放负责销毁指向对象，
/// 然后归还代表拥有者持有的弱引用。
///
/// # Safety
/// The caller must own one strong reference to a live block and must not use
/// it afterwards.
#[inline]
pub(crate) unsafe fn release_strong(block: NonNull<BlockHeader>) {
    let release_pointee = {
        let header = unsafe { block.as_ref() };
        if header.strong.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        // Synchronize with every earlier release so all writes made through
        // other handles are visible before the pointee goes away.
        fence(Ordering::Acquire);
        header.vtable.release_pointee
    };

    unsafe {
        release_pointee(block);
        release_weak(block);
    }
}

/// Drop one observer of `block`.
///
/// `PointeeReleased -> Destroyed`: the release that takes `weak` to zero frees
/// the block itself.
///
/// 释放 `block` 的一个观察者。
/// `PointeeReleased -> Destroyed`：把 `weak` 降为零的那次释放负责释放控制块本身。
///
/// # Safety
/// The caller must own one weak reference to a live block and must not use it
/// afterwards.
#[inline]
pub(crate) unsafe fn release_weak(block: NonNull<BlockHeader>) {
    let destroy_self = {
        let header = unsafe { block.as_ref() };
        if header.weak.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);
        header.vtable.destroy_self
    };

    unsafe { destroy_self(block) }
}
