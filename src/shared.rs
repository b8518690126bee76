use crate::alloc::{Allocator, Global};
use crate::block::{InlineBlock, PointerBlock, new_inline_block, new_pointer_block};
use crate::builder::SharedPtrBuilder;
use crate::count::SharedCount;
use crate::deleter::{DefaultDelete, Deleter};
use crate::error::{AllocError, BadWeakPtr};
use crate::weak::WeakPtr;
use std::alloc::Layout;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// An owning, reference-counted handle to an object managed through a
/// control block.
///
/// A `SharedPtr` is a pair: the pointer it exposes to the caller and a strong
/// reference to a control block that decides when (and how) the managed
/// object is released. The two are usually the same object, but an aliasing
/// handle (`aliasing`, `project`, `cast`, `downcast`) may expose any address
/// while keeping its owner alive.
///
/// **Lifecycle**:
/// - The control block is created once, by the first constructor that takes
///   ownership (`new`, `from_box`, `from_raw*`, the builder).
/// - Cloning shares the block and adds an owner; dropping removes one.
/// - The last owner runs the deleter exactly once. The block itself is freed
///   once the last `WeakPtr` is gone as well.
///
/// **Typical Usage**:
/// ```
/// use shared_ptr::{SharedPtr, WeakPtr};
///
/// let owner = SharedPtr::new(String::from("hello"));
/// let observer = WeakPtr::from(&owner);
/// assert_eq!(observer.use_count(), 1);
///
/// let second = owner.clone();
/// assert_eq!(owner.use_count(), 2);
/// drop(second);
///
/// drop(owner);
/// assert!(observer.expired());
/// assert!(observer.lock().is_null());
/// ```
///
/// Reference cycles between `SharedPtr`s are never collected; break them with
/// a `WeakPtr`.
///
/// 通过控制块管理对象的拥有型引用计数句柄。
///
/// `SharedPtr` 是一个二元组：暴露给调用者的指针，以及指向控制块的一个强引用。
/// 控制块决定何时（以及如何）释放被管理的对象。两者通常指向同一个对象，
/// 但别名句柄（`aliasing`、`project`、`cast`、`downcast`）可以暴露任意地址，
/// 同时保持其所有者存活。
///
/// **生命周期**：
/// - 控制块只创建一次，由第一个接管所有权的构造函数创建。
/// - 克隆共享控制块并增加一个拥有者；drop 减少一个拥有者。
/// - 最后一个拥有者恰好运行一次删除器。最后一个 `WeakPtr` 也消失后，控制块本身被释放。
///
/// `SharedPtr` 之间的引用环永远不会被回收；请用 `WeakPtr` 打破环。
pub struct SharedPtr<T: ?Sized> {
    pub(crate) ptr: Option<NonNull<T>>,
    pub(crate) count: SharedCount,
    _marker: PhantomData<T>,
}

unsafe impl<T: ?Sized + Send + Sync> Send for SharedPtr<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for SharedPtr<T> {}

impl<T: Send + Sync + 'static> SharedPtr<T> {
    /// Allocate `value` together with its control block in a single allocation.
    ///
    /// 将 `value` 与其控制块放在同一次分配中。
    #[inline]
    pub fn new(value: T) -> Self {
        match Self::new_in(value, Global) {
            Ok(shared) => shared,
            Err(_) => std::alloc::handle_alloc_error(Layout::new::<InlineBlock<T, Global>>()),
        }
    }

    /// Allocate `value` together with its control block using `alloc`.
    ///
    /// On failure `value` is dropped.
    ///
    /// 使用 `alloc` 将 `value` 与其控制块放在同一次分配中。失败时 `value` 被 drop。
    #[inline]
    pub fn new_in<A>(value: T, alloc: A) -> Result<Self, AllocError>
    where
        A: Allocator + Send + Sync + 'static,
    {
        Self::new_with_in(move || value, alloc)
    }

    /// Acquire co-located storage from `alloc`, then build the pointee with
    /// `init` directly for it.
    ///
    /// If `init` panics the storage is handed back to `alloc` before the panic
    /// continues.
    ///
    /// 先从 `alloc` 获取存储，再用 `init` 构造指向对象。
    /// 如果 `init` panic，存储会在 panic 继续传播前归还给 `alloc`。
    pub fn new_with_in<A, F>(init: F, alloc: A) -> Result<Self, AllocError>
    where
        A: Allocator + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let (block, value) = new_inline_block(init, alloc)?;
        Ok(Self::from_parts(Some(value), unsafe { SharedCount::adopt(block) }))
    }

    /// Take over the allocation of a `Box`.
    #[inline]
    pub fn from_box(value: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Take ownership of a raw pointer, releasing it with `DefaultDelete`.
    ///
    /// A null `ptr` yields a handle with `use_count() == 1` whose release does
    /// nothing.
    ///
    /// # Safety
    /// `ptr` must be null or come from `Box::into_raw`, and must not be owned
    /// by anything else.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        unsafe { Self::from_raw_with_deleter(ptr, DefaultDelete) }
    }

    /// Take ownership of a raw pointer, releasing it with `deleter`.
    ///
    /// If the control block cannot be allocated, `deleter` is applied to `ptr`
    /// before the allocation error is raised.
    ///
    /// 接管原始指针，并用 `deleter` 释放它。
    /// 如果无法分配控制块，会先对 `ptr` 调用 `deleter`，再报告分配错误。
    ///
    /// # Safety
    /// `ptr` must be null or valid for reads for as long as any owner exists,
    /// and `deleter` must be the correct way to release it.
    pub unsafe fn from_raw_with_deleter<D>(ptr: *mut T, deleter: D) -> Self
    where
        D: Deleter<T> + Send + Sync + 'static,
    {
        match unsafe { Self::from_raw_in(ptr, deleter, Global) } {
            Ok(shared) => shared,
            Err(_) => std::alloc::handle_alloc_error(Layout::new::<PointerBlock<T, D, Global>>()),
        }
    }

    /// Take ownership of a raw pointer, releasing it with `deleter` and storing
    /// the control block in memory obtained from `alloc`.
    ///
    /// On `Err`, `deleter` has already been applied to `ptr`.
    ///
    /// 接管原始指针，用 `deleter` 释放它，并把控制块存放在 `alloc` 提供的内存中。
    /// 返回 `Err` 时，`deleter` 已经作用于 `ptr`。
    ///
    /// # Safety
    /// Same as [`SharedPtr::from_raw_with_deleter`].
    pub unsafe fn from_raw_in<D, A>(ptr: *mut T, deleter: D, alloc: A) -> Result<Self, AllocError>
    where
        D: Deleter<T> + Send + Sync + 'static,
        A: Allocator + Send + Sync + 'static,
    {
        let block = unsafe { new_pointer_block(ptr, deleter, alloc)? };
        Ok(Self::from_parts(NonNull::new(ptr), unsafe { SharedCount::adopt(block) }))
    }

    /// Replace the managed object with `ptr`, released by `DefaultDelete`.
    /// The previous owner reference is dropped after the new block exists.
    ///
    /// # Safety
    /// Same as [`SharedPtr::from_raw`].
    #[inline]
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        *self = unsafe { Self::from_raw(ptr) };
    }

    /// Replace the managed object with `ptr`, released by `deleter`.
    ///
    /// # Safety
    /// Same as [`SharedPtr::from_raw_with_deleter`].
    #[inline]
    pub unsafe fn reset_raw_with_deleter<D>(&mut self, ptr: *mut T, deleter: D)
    where
        D: Deleter<T> + Send + Sync + 'static,
    {
        *self = unsafe { Self::from_raw_with_deleter(ptr, deleter) };
    }

    /// Replace the managed object with `ptr`, released by `deleter`, with the
    /// block allocated from `alloc`. On `Err` the handle is left untouched.
    ///
    /// # Safety
    /// Same as [`SharedPtr::from_raw_with_deleter`].
    #[inline]
    pub unsafe fn reset_raw_in<D, A>(
        &mut self,
        ptr: *mut T,
        deleter: D,
        alloc: A,
    ) -> Result<(), AllocError>
    where
        D: Deleter<T> + Send + Sync + 'static,
        A: Allocator + Send + Sync + 'static,
    {
        *self = unsafe { Self::from_raw_in(ptr, deleter, alloc)? };
        Ok(())
    }

    /// Erase the pointee type so it can later be recovered with `downcast`.
    #[inline]
    pub fn into_any(self) -> SharedPtr<dyn Any + Send + Sync> {
        let Self { ptr, count, .. } = self;
        SharedPtr::from_parts(ptr.map(|ptr| ptr as NonNull<dyn Any + Send + Sync>), count)
    }
}

impl SharedPtr<()> {
    /// A builder collecting the deleter and allocator for a new control block.
    ///
    /// ```
    /// use shared_ptr::{Global, SharedPtr};
    ///
    /// let shared = SharedPtr::builder()
    ///     .allocator(Global)
    ///     .emplace(7u32)
    ///     .unwrap();
    /// assert_eq!(*shared, 7);
    /// ```
    #[inline]
    pub fn builder() -> SharedPtrBuilder {
        SharedPtrBuilder::new()
    }
}

impl<T: ?Sized> SharedPtr<T> {
    /// A handle that owns nothing and exposes nothing.
    /// 一个不拥有任何东西、也不暴露任何指针的句柄。
    #[inline]
    pub const fn null() -> Self {
        Self::from_parts(None, SharedCount::empty())
    }

    #[inline]
    pub(crate) const fn from_parts(ptr: Option<NonNull<T>>, count: SharedCount) -> Self {
        Self {
            ptr,
            count,
            _marker: PhantomData,
        }
    }

    /// Share the ownership of `owner` while exposing `ptr`.
    ///
    /// The result reports `owner`'s use count. If `owner` owns nothing, neither
    /// does the result, yet `ptr` is still exposed.
    ///
    /// 共享 `owner` 的所有权，同时暴露 `ptr`。
    /// 结果报告与 `owner` 相同的引用计数。如果 `owner` 不拥有任何东西，
    /// 结果也不拥有，但 `ptr` 仍然被暴露。
    ///
    /// # Safety
    /// `ptr` must be null or stay valid for reads for as long as the result
    /// (or any handle derived from it) exposes it.
    #[inline]
    pub unsafe fn aliasing<U: ?Sized>(owner: &SharedPtr<U>, ptr: *const T) -> Self {
        Self::from_parts(NonNull::new(ptr as *mut T), owner.count.clone())
    }

    /// Share ownership while exposing a part of the pointee chosen by `f`.
    ///
    /// Covers field access as well as unsizing to a trait object. A null
    /// handle yields a null handle with the same ownership.
    ///
    /// 共享所有权，同时暴露由 `f` 选出的指向对象的一部分。
    /// 可用于字段访问，也可用于转换为 trait 对象。
    ///
    /// ```
    /// use shared_ptr::SharedPtr;
    /// use std::fmt::Display;
    ///
    /// let pair = SharedPtr::new((1u8, String::from("two")));
    /// let second = pair.project(|pair| &pair.1);
    /// let shown = pair.project(|pair| &pair.0 as &dyn Display);
    /// assert_eq!(*second, "two");
    /// assert_eq!(shown.to_string(), "1");
    /// assert_eq!(pair.use_count(), 3);
    /// ```
    #[inline]
    pub fn project<U: ?Sized>(&self, f: impl FnOnce(&T) -> &U) -> SharedPtr<U> {
        let ptr = self.get().map(|value| NonNull::from(f(value)));
        SharedPtr::from_parts(ptr, self.count.clone())
    }

    /// Reinterpret the exposed pointer as `U`, sharing ownership.
    ///
    /// # Safety
    /// The exposed pointer, if any, must be valid for reads as a `U`.
    #[inline]
    pub unsafe fn cast<U>(&self) -> SharedPtr<U> {
        SharedPtr::from_parts(self.ptr.map(NonNull::cast::<U>), self.count.clone())
    }

    /// Promote `weak`, failing loudly if its pointee has been released.
    ///
    /// 提升 `weak`；如果其指向对象已被释放，则显式失败。
    pub fn try_from_weak(weak: &WeakPtr<T>) -> Result<Self, BadWeakPtr> {
        match SharedCount::try_from_weak(&weak.count) {
            Some(count) => Ok(Self::from_parts(weak.ptr, count)),
            None => {
                log::debug!("refusing to promote an expired weak pointer");
                Err(BadWeakPtr)
            }
        }
    }

    /// The exposed object, or `None` for a null handle.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: the exposed pointer is kept valid by ownership or, for
        // aliasing handles, by the caller of `aliasing`.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// The exposed pointer.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// `true` when no pointer is exposed, regardless of ownership.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Number of owners of the control block, or 0 without one.
    /// 控制块的拥有者数量；没有控制块时为 0。
    #[inline]
    pub fn use_count(&self) -> usize {
        self.count.use_count()
    }

    /// `true` when this handle is the only owner.
    /// 当前句柄是唯一拥有者时为 `true`。
    #[inline]
    pub fn unique(&self) -> bool {
        self.use_count() == 1
    }

    /// Exchange contents with `other` without touching any counter.
    /// 与 `other` 交换内容，不触碰任何计数器。
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Drop this handle's ownership, leaving it null.
    /// 放弃当前句柄的所有权，使其变为空句柄。
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::null();
    }

    /// Move the contents out, leaving a null handle behind.
    /// 移出内容，原处留下空句柄。
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::null())
    }

    /// Create an observer of this handle's control block.
    /// 创建观察当前控制块的弱引用。
    #[inline]
    pub fn downgrade(&self) -> WeakPtr<T> {
        WeakPtr::from(self)
    }

    /// Ownership-based strict weak ordering: compares control blocks, not the
    /// exposed pointers.
    ///
    /// 基于所有权的严格弱序：比较控制块，而不是暴露的指针。
    #[inline]
    pub fn owner_before<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool {
        self.count.owner_id() < other.count.owner_id()
    }

    /// Same ordering as `owner_before`, against an observer.
    /// 与 `owner_before` 相同的排序，比较对象为观察者。
    #[inline]
    pub fn owner_before_weak<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        self.count.owner_id() < other.count.owner_id()
    }

    /// `true` when both handles share a control block (or both have none).
    /// 两个句柄共享同一个控制块（或都没有）时为 `true`。
    #[inline]
    pub fn owner_eq<U: ?Sized>(&self, other: &SharedPtr<U>) -> bool {
        self.count.owner_id() == other.count.owner_id()
    }

    /// The deleter stored in the control block, if it has type `D`.
    ///
    /// Co-located blocks (`new`, `new_in`) have no deleter.
    ///
    /// 控制块中存储的删除器（如果其类型为 `D`）。同址分配的控制块没有删除器。
    #[inline]
    pub fn get_deleter<D: 'static>(&self) -> Option<&D> {
        self.count
            .deleter(TypeId::of::<D>())
            // SAFETY: the type id matched and the block outlives `self`.
            .map(|deleter| unsafe { &*deleter.cast::<D>().as_ptr() })
    }

    #[inline]
    fn addr(&self) -> usize {
        self.ptr.map_or(0, |ptr| ptr.as_ptr().cast::<()>() as usize)
    }
}

impl SharedPtr<dyn Any + Send + Sync> {
    /// Checked conversion to a concrete pointee type.
    ///
    /// On a type mismatch the result exposes nothing but still shares
    /// ownership.
    ///
    /// 带检查地转换为具体指向类型。类型不匹配时，结果不暴露任何指针，但仍共享所有权。
    #[inline]
    pub fn downcast<U: Any>(&self) -> SharedPtr<U> {
        let ptr = self
            .get()
            .and_then(|value| value.downcast_ref::<U>())
            .map(NonNull::from);
        SharedPtr::from_parts(ptr, self.count.clone())
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self::from_parts(self.ptr, self.count.clone())
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    /// # Panics
    /// Panics if the handle exposes no pointer.
    #[inline]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced a null SharedPtr"),
        }
    }
}

impl<T: Send + Sync + 'static> From<Box<T>> for SharedPtr<T> {
    #[inline]
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: Send + Sync + 'static> From<Option<Box<T>>> for SharedPtr<T> {
    /// `None` converts to a null handle without a control block.
    #[inline]
    fn from(value: Option<Box<T>>) -> Self {
        value.map_or_else(Self::null, Self::from_box)
    }
}

impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = BadWeakPtr;

    #[inline]
    fn try_from(weak: &WeakPtr<T>) -> Result<Self, Self::Error> {
        Self::try_from_weak(weak)
    }
}

impl<T: ?Sized> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPtr")
            .field("ptr", &self.ptr)
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ptr {
            Some(ptr) => fmt::Pointer::fmt(&ptr, f),
            None => fmt::Pointer::fmt(&ptr::null::<()>(), f),
        }
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    #[inline]
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized, U: ?Sized> PartialOrd<SharedPtr<U>> for SharedPtr<T> {
    #[inline]
    fn partial_cmp(&self, other: &SharedPtr<U>) -> Option<Ordering> {
        Some(self.addr().cmp(&other.addr()))
    }
}

impl<T: ?Sized> Ord for SharedPtr<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<T: ?Sized> Hash for SharedPtr<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}
