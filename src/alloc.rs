use crate::error::AllocError;
use std::alloc::Layout;
use std::ptr::NonNull;

/// Storage provider for control blocks.
///
/// Allocators are layout based, so a single allocator value serves every
/// block type: the block asks for `Layout::new::<Block>()` and later hands the
/// same layout back to `deallocate`.
///
/// 控制块的存储提供者。
/// 分配器基于 `Layout` 工作，因此同一个分配器可以服务所有控制块类型：
/// 控制块请求 `Layout::new::<Block>()`，之后用相同的布局调用 `deallocate`。
///
/// # Safety
/// `allocate` must return memory valid for `layout` that stays valid until it
/// is passed to `deallocate` on this allocator (or a clone of it).
pub unsafe trait Allocator {
    /// Allocate a block of memory fitting `layout`.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Return memory obtained from `allocate`.
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this allocator with the same `layout`,
    /// and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide allocator registered with `#[global_allocator]`.
/// 进程全局分配器（即 `#[global_allocator]` 注册的分配器）。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Global;

unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // Zero-sized requests never touch the heap.
            return NonNull::new(layout.align() as *mut u8).ok_or(AllocError);
        }
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}

unsafe impl<A> Allocator for &A
where
    A: Allocator + ?Sized,
{
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

/// Owns a freshly allocated, still uninitialized block of storage.
///
/// Dropping the guard returns the storage to the allocator, so every early
/// exit between allocation and initialization (including unwinding out of a
/// user initializer) releases it. `commit` disarms the guard once the storage
/// has been initialized and ownership moves into the control block.
///
/// 持有一块刚分配、尚未初始化的存储。
/// drop 守卫会把存储归还给分配器，因此分配与初始化之间的任何提前退出
/// （包括用户初始化函数 panic 展开）都会释放它。
/// 存储初始化完成、所有权转移到控制块后，`commit` 解除守卫。
pub(crate) struct AllocGuard<A: Allocator> {
    alloc: std::mem::ManuallyDrop<A>,
    ptr: NonNull<u8>,
    layout: Layout,
}

impl<A: Allocator> AllocGuard<A> {
    #[inline]
    pub(crate) fn new(alloc: A, layout: Layout) -> Result<Self, AllocError> {
        let ptr = alloc.allocate(layout)?;
        Ok(Self {
            alloc: std::mem::ManuallyDrop::new(alloc),
            ptr,
            layout,
        })
    }

    /// Disarm the guard, handing back the storage and the allocator.
    #[inline]
    pub(crate) fn commit(self) -> (NonNull<u8>, A) {
        let mut this = std::mem::ManuallyDrop::new(self);
        let alloc = unsafe { std::mem::ManuallyDrop::take(&mut this.alloc) };
        (this.ptr, alloc)
    }
}

impl<A: Allocator> Drop for AllocGuard<A> {
    fn drop(&mut self) {
        unsafe {
            self.alloc.deallocate(self.ptr, self.layout);
            std::mem::ManuallyDrop::drop(&mut self.alloc);
        }
    }
}
