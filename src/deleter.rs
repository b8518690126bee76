/// Cleanup logic for a pointer adopted by a `SharedPtr`.
///
/// Any `FnMut(*mut T)` closure is a deleter. Closures should annotate their
/// parameter (`|p: *mut Foo| ...`) since the bound is reached through this
/// trait rather than directly.
///
/// Deleters must not panic. A deleter that unwinds aborts the process.
///
/// 被 `SharedPtr` 接管的指针的清理逻辑。
/// 任何 `FnMut(*mut T)` 闭包都是删除器。
/// 删除器不得 panic；展开的删除器会导致进程中止。
pub trait Deleter<T> {
    /// Release the resource behind `ptr`.
    ///
    /// # Safety
    /// `ptr` is the pointer the control block adopted (possibly null). It is
    /// passed exactly once, and nothing accesses it afterwards.
    unsafe fn delete(&mut self, ptr: *mut T);
}

impl<T, F> Deleter<T> for F
where
    F: FnMut(*mut T),
{
    #[inline]
    unsafe fn delete(&mut self, ptr: *mut T) {
        self(ptr)
    }
}

/// Reclaims a pointer produced by `Box::into_raw`. Null is ignored.
/// 回收由 `Box::into_raw` 产生的指针。空指针被忽略。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultDelete;

impl<T> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: *mut T) {
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}
