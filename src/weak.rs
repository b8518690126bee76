use crate::count::{SharedCount, WeakCount};
use crate::shared::SharedPtr;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

/// A non-owning observer of an object managed by `SharedPtr`.
///
/// A `WeakPtr` keeps the control block allocated but never the pointee, so it
/// can always answer whether the pointee is still alive (`expired`) and try to
/// become an owner again (`lock`).
///
/// **Counters**: creating, cloning and dropping `WeakPtr`s only touches the
/// block's weak count. `use_count()` reports the number of owners, never the
/// number of observers.
///
/// 由 `SharedPtr` 管理的对象的非拥有型观察者。
///
/// `WeakPtr` 保持控制块已分配，但从不保持指向对象存活，因此它总能回答
/// 指向对象是否仍然存活（`expired`），并尝试重新成为拥有者（`lock`）。
///
/// **计数器**：创建、克隆和 drop `WeakPtr` 只会改动控制块的弱计数。
/// `use_count()` 报告拥有者的数量，而不是观察者的数量。
pub struct WeakPtr<T: ?Sized> {
    pub(crate) ptr: Option<NonNull<T>>,
    pub(crate) count: WeakCount,
    _marker: PhantomData<T>,
}

unsafe impl<T: ?Sized + Send + Sync> Send for WeakPtr<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for WeakPtr<T> {}

impl<T: ?Sized> WeakPtr<T> {
    /// An observer of nothing; always expired.
    #[inline]
    pub const fn new() -> Self {
        Self {
            ptr: None,
            count: WeakCount::empty(),
            _marker: PhantomData,
        }
    }

    /// Try to become an owner. Returns a null `SharedPtr` if the pointee has
    /// already been released.
    ///
    /// The liveness check and the owner increment are a single atomic step, so
    /// this never races with a concurrent final release.
    ///
    /// 尝试成为拥有者。如果指向对象已被释放，返回空 `SharedPtr`。
    /// 存活检查与拥有者自增是一个原子步骤，因此不会与并发的最后一次释放竞争。
    #[inline]
    pub fn lock(&self) -> SharedPtr<T> {
        match SharedCount::try_from_weak(&self.count) {
            Some(count) => SharedPtr::from_parts(self.ptr, count),
            None => SharedPtr::null(),
        }
    }

    /// `true` once no owner remains (or if there never was a control block).
    #[inline]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Number of owners of the observed control block.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.count.use_count()
    }

    /// The pointer remembered from the source handle. It may dangle.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Exchange contents with `other` without touching any counter.
    /// 与 `other` 交换内容，不触碰任何计数器。
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Stop observing, leaving an empty `WeakPtr`.
    /// 停止观察，留下一个空的 `WeakPtr`。
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Reinterpret the remembered pointer as `U`, observing the same block.
    ///
    /// Only the weak count is incremented.
    ///
    /// 将记住的指针重新解释为 `U`，观察同一个控制块。只增加弱计数。
    ///
    /// # Safety
    /// Whenever the pointee is alive, the remembered pointer (if any) must be
    /// valid for reads as a `U`.
    #[inline]
    pub unsafe fn cast<U>(&self) -> WeakPtr<U> {
        WeakPtr {
            ptr: self.ptr.map(NonNull::cast::<U>),
            count: self.count.clone(),
            _marker: PhantomData,
        }
    }

    /// Ownership-based ordering against an owning handle.
    /// 与拥有型句柄之间基于所有权的排序。
    #[inline]
    pub fn owner_before<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool {
        self.count.owner_id() < other.count.owner_id()
    }

    /// Ownership-based ordering against another observer.
    /// 与另一个观察者之间基于所有权的排序。
    #[inline]
    pub fn owner_before_weak<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        self.count.owner_id() < other.count.owner_id()
    }

    /// `true` when both observers share a control block (or both have none).
    /// 两个观察者共享同一个控制块（或都没有）时为 `true`。
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        self.count.owner_id() == other.count.owner_id()
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    /// Observe `shared`'s control block. A `shared` without one produces an
    /// inert observer that still remembers the exposed pointer.
    #[inline]
    fn from(shared: &SharedPtr<T>) -> Self {
        Self {
            ptr: shared.ptr,
            count: WeakCount::from_shared(&shared.count),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            count: self.count.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr")
            .field("ptr", &self.ptr)
            .field("use_count", &self.use_count())
            .finish()
    }
}
