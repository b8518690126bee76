use crate::state::{BlockHeader, release_strong, release_weak};
use std::any::TypeId;
use std::ptr::NonNull;

/// Ownership core of a `SharedPtr`: one strong reference to a control block,
/// or nothing.
///
/// Clone adds an owner, drop releases one. Moving it touches no counter.
///
/// `SharedPtr` 的所有权核心：持有控制块的一个强引用，或者什么都不持有。
/// 克隆增加拥有者，drop 释放一个拥有者，移动不触碰计数器。
#[derive(Debug)]
pub(crate) struct SharedCount {
    block: Option<NonNull<BlockHeader>>,
}

impl SharedCount {
    #[inline]
    pub(crate) const fn empty() -> Self {
        Self { block: None }
    }

    /// Take over the initial strong reference of a freshly built block.
    ///
    /// # Safety
    /// `block` must be live and the reference must not be claimed twice.
    #[inline]
    pub(crate) unsafe fn adopt(block: NonNull<BlockHeader>) -> Self {
        Self { block: Some(block) }
    }

    /// Promote an observer: succeeds only while the block still has owners.
    #[inline]
    pub(crate) fn try_from_weak(weak: &WeakCount) -> Option<Self> {
        let block = weak.block?;
        if weak.header()?.try_increment_strong() {
            Some(Self { block: Some(block) })
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn header(&self) -> Option<&BlockHeader> {
        // SAFETY: a strong reference keeps the block allocated.
        self.block.map(|block| unsafe { &*block.as_ptr() })
    }

    #[inline]
    pub(crate) fn use_count(&self) -> usize {
        self.header().map_or(0, BlockHeader::strong_count)
    }

    /// Address of the control block, used for ownership ordering.
    #[inline]
    pub(crate) fn owner_id(&self) -> usize {
        self.block.map_or(0, |block| block.as_ptr() as usize)
    }

    /// Address of the stored deleter if it has type `type_id`.
    #[inline]
    pub(crate) fn deleter(&self, type_id: TypeId) -> Option<NonNull<()>> {
        let header = self.header()?;
        let block = self.block?;
        unsafe { (header.vtable.deleter)(block, type_id) }
    }
}

impl Clone for SharedCount {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(header) = self.header() {
            header.increment_strong();
        }
        Self { block: self.block }
    }
}

impl Drop for SharedCount {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            unsafe { release_strong(block) }
        }
    }
}

/// Observer core of a `WeakPtr`: one weak reference to a control block, or
/// nothing. Keeps the block's metadata addressable, never the pointee.
///
/// `WeakPtr` 的观察者核心：持有控制块的一个弱引用，或者什么都不持有。
/// 只保证控制块元数据可访问，从不保证指向对象存活。
#[derive(Debug)]
pub(crate) struct WeakCount {
    block: Option<NonNull<BlockHeader>>,
}

impl WeakCount {
    #[inline]
    pub(crate) const fn empty() -> Self {
        Self { block: None }
    }

    #[inline]
    pub(crate) fn from_shared(shared: &SharedCount) -> Self {
        if let Some(header) = shared.header() {
            header.increment_weak();
        }
        Self {
            block: shared.block,
        }
    }

    #[inline]
    pub(crate) fn header(&self) -> Option<&BlockHeader> {
        // SAFETY: a weak reference keeps the block allocated.
        self.block.map(|block| unsafe { &*block.as_ptr() })
    }

    /// Number of owners of the observed block; zero once the pointee is gone.
    #[inline]
    pub(crate) fn use_count(&self) -> usize {
        self.header().map_or(0, BlockHeader::strong_count)
    }

    #[inline]
    pub(crate) fn owner_id(&self) -> usize {
        self.block.map_or(0, |block| block.as_ptr() as usize)
    }
}

impl Clone for WeakCount {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(header) = self.header() {
            header.increment_weak();
        }
        Self { block: self.block }
    }
}

impl Drop for WeakCount {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            unsafe { release_weak(block) }
        }
    }
}
