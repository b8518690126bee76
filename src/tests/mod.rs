mod lifecycle_tests;

use crate::{AllocError, Allocator, Deleter, Global};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 测试共享的计数状态
#[derive(Debug, Default)]
pub(crate) struct TestState {
    pub(crate) deleter_count: AtomicUsize,
    pub(crate) allocated_bytes: AtomicUsize,
    pub(crate) deallocated_bytes: AtomicUsize,
}

impl TestState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn deleter_count(&self) -> usize {
        self.deleter_count.load(Ordering::SeqCst)
    }

    pub(crate) fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::SeqCst)
    }

    pub(crate) fn deallocated_bytes(&self) -> usize {
        self.deallocated_bytes.load(Ordering::SeqCst)
    }
}

/// 释放 Box 指针并计数的删除器
#[derive(Debug, Clone)]
pub(crate) struct TestDeleter {
    pub(crate) state: Arc<TestState>,
}

impl TestDeleter {
    pub(crate) fn new(state: &Arc<TestState>) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

impl<T> Deleter<T> for TestDeleter {
    unsafe fn delete(&mut self, ptr: *mut T) {
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr) });
        }
        self.state.deleter_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// 统计分配与释放字节数的分配器
#[derive(Debug, Clone)]
pub(crate) struct TestAllocator {
    pub(crate) state: Arc<TestState>,
}

impl TestAllocator {
    pub(crate) fn new(state: &Arc<TestState>) -> Self {
        Self {
            state: state.clone(),
        }
    }
}

unsafe impl Allocator for TestAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        self.state
            .allocated_bytes
            .fetch_add(layout.size(), Ordering::SeqCst);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.state
            .deallocated_bytes
            .fetch_add(layout.size(), Ordering::SeqCst);
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// 总是失败的分配器
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FailingAllocator;

unsafe impl Allocator for FailingAllocator {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        unreachable!("nothing was ever allocated");
    }
}

/// Drop 时计数的值
#[derive(Debug)]
pub(crate) struct DropCounter {
    pub(crate) drops: Arc<AtomicUsize>,
}

impl DropCounter {
    pub(crate) fn new(drops: &Arc<AtomicUsize>) -> Self {
        Self {
            drops: drops.clone(),
        }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
