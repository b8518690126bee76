use crate::alloc::{Allocator, Global};
use crate::deleter::{DefaultDelete, Deleter};
use crate::error::AllocError;
use crate::shared::SharedPtr;

/// Builder for configuring how a `SharedPtr` releases its object and where its
/// control block lives.
///
/// Use this builder to customize construction:
/// - `deleter`: how the adopted pointer is released (default: `DefaultDelete`)
/// - `allocator`: where the control block is stored (default: `Global`)
///
/// # Example
/// ```
/// use shared_ptr::{Global, SharedPtr};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let released = Arc::new(AtomicUsize::new(0));
/// let counter = released.clone();
///
/// let raw = Box::into_raw(Box::new(5u64));
/// let shared = unsafe {
///     SharedPtr::builder()
///         .deleter(move |ptr: *mut u64| {
///             drop(unsafe { Box::from_raw(ptr) });
///             counter.fetch_add(1, Ordering::Relaxed);
///         })
///         .allocator(Global)
///         .adopt(raw)
///         .unwrap()
/// };
///
/// assert_eq!(*shared, 5);
/// drop(shared);
/// assert_eq!(released.load(Ordering::Relaxed), 1);
/// ```
///
/// 用于配置 `SharedPtr` 如何释放其对象以及控制块存放位置的构建器。
#[derive(Debug, Clone, Default)]
pub struct SharedPtrBuilder<D = DefaultDelete, A = Global> {
    deleter: D,
    alloc: A,
}

impl SharedPtrBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            deleter: DefaultDelete,
            alloc: Global,
        }
    }
}

impl<D, A> SharedPtrBuilder<D, A> {
    /// Set the deleter applied to the adopted pointer once the last owner is
    /// gone.
    ///
    /// 设置在最后一个拥有者消失后作用于被接管指针的删除器。
    #[inline]
    pub fn deleter<D2>(self, deleter: D2) -> SharedPtrBuilder<D2, A> {
        SharedPtrBuilder {
            deleter,
            alloc: self.alloc,
        }
    }

    /// Set the allocator providing the control block's storage.
    ///
    /// 设置为控制块提供存储的分配器。
    #[inline]
    pub fn allocator<A2>(self, alloc: A2) -> SharedPtrBuilder<D, A2> {
        SharedPtrBuilder {
            deleter: self.deleter,
            alloc,
        }
    }

    /// Take ownership of `ptr` with the configured deleter and allocator.
    ///
    /// On `Err`, the deleter has already been applied to `ptr`.
    ///
    /// # Safety
    /// See [`SharedPtr::from_raw_in`].
    #[inline]
    pub unsafe fn adopt<T>(self, ptr: *mut T) -> Result<SharedPtr<T>, AllocError>
    where
        T: Send + Sync + 'static,
        D: Deleter<T> + Send + Sync + 'static,
        A: Allocator + Send + Sync + 'static,
    {
        unsafe { SharedPtr::from_raw_in(ptr, self.deleter, self.alloc) }
    }
}

impl<A> SharedPtrBuilder<DefaultDelete, A>
where
    A: Allocator + Send + Sync + 'static,
{
    /// Place `value` in a single allocation with its control block, using the
    /// configured allocator.
    ///
    /// 使用配置的分配器，把 `value` 与其控制块放在同一次分配中。
    #[inline]
    pub fn emplace<T>(self, value: T) -> Result<SharedPtr<T>, AllocError>
    where
        T: Send + Sync + 'static,
    {
        SharedPtr::new_in(value, self.alloc)
    }
}
