/// 生命周期测试模块
/// 测试两阶段拆除、弱引用提升、重置、交换和所有权排序
use super::{DropCounter, TestAllocator, TestDeleter, TestState, init_logger};
use crate::{BadWeakPtr, SharedPtr, WeakPtr};
use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct A;

/// 测试1: 最后一个强引用释放时删除器恰好运行一次
#[test]
fn test_deleter_runs_exactly_once() {
    let state = TestState::new();
    let raw = Box::into_raw(Box::new(A));
    let ptr = unsafe { SharedPtr::from_raw_with_deleter(raw, TestDeleter::new(&state)) };

    let copies: Vec<_> = (0..10).map(|_| ptr.clone()).collect();
    assert_eq!(ptr.use_count(), 11);

    drop(ptr);
    assert_eq!(state.deleter_count(), 0);

    for (i, copy) in copies.into_iter().enumerate() {
        assert_eq!(copy.use_count(), 10 - i);
        drop(copy);
    }
    assert_eq!(state.deleter_count(), 1);
}

/// 测试2: 文档中的具体场景
#[test]
fn test_weak_expires_after_reset() {
    let mut p = SharedPtr::new(A);
    let w = WeakPtr::from(&p);
    assert_eq!(w.use_count(), 1);

    p.reset();
    assert!(w.expired());
    assert!(w.lock().get().is_none());
}

/// 测试3: 弱引用不影响强计数
#[test]
fn test_weak_never_touches_strong_count() {
    let p = SharedPtr::new(A);
    let q = p.clone();
    {
        let w1 = p.downgrade();
        let w2 = w1.clone();
        let mut w3 = WeakPtr::from(&q);
        w3.swap(&mut w2.clone());
        assert_eq!(p.use_count(), 2);
        assert_eq!(w1.use_count(), 2);
        assert_eq!(w3.use_count(), 2);
    }
    assert_eq!(p.use_count(), 2);
    assert_eq!(q.use_count(), 2);
}

/// 测试4: 提升失败时显式报错，lock 返回空句柄
#[test]
fn test_promotion_after_release() {
    init_logger();
    let w = {
        let p = SharedPtr::new(A);
        WeakPtr::from(&p)
    };
    assert_eq!(SharedPtr::try_from_weak(&w).unwrap_err(), BadWeakPtr);
    assert!(SharedPtr::try_from(&w).is_err());

    let locked = w.lock();
    assert!(locked.is_null());
    assert_eq!(locked.use_count(), 0);
}

/// 测试5: 提升成功时共享控制块
#[test]
fn test_promotion_while_alive() {
    let p = SharedPtr::new(A);
    let w = WeakPtr::from(&p);
    let promoted = SharedPtr::try_from(&w).unwrap();
    assert_eq!(promoted.use_count(), 2);
    assert_eq!(promoted.as_ptr(), p.as_ptr());
    assert!(promoted.owner_eq(&p));

    let locked = w.lock();
    assert_eq!(locked.use_count(), 3);
}

/// 测试6: 对象先于控制块释放
#[test]
fn test_pointee_released_before_block() {
    let state = TestState::new();
    let raw = Box::into_raw(Box::new(A));
    let p = unsafe {
        SharedPtr::from_raw_in(raw, TestDeleter::new(&state), TestAllocator::new(&state))
    }
    .unwrap();
    let w = WeakPtr::from(&p);

    drop(p);
    // 对象已释放，但弱引用仍让控制块存活
    assert_eq!(state.deleter_count(), 1);
    assert_eq!(state.deallocated_bytes(), 0);
    assert!(w.expired());

    drop(w);
    assert_eq!(state.allocated_bytes(), state.deallocated_bytes());
}

/// 测试7: 同址分配下的两阶段拆除
#[test]
fn test_colocated_two_phase_teardown() {
    let state = TestState::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let p = SharedPtr::new_in(DropCounter::new(&drops), TestAllocator::new(&state)).unwrap();
    let w = p.downgrade();

    drop(p);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(state.deallocated_bytes(), 0);

    drop(w);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(state.allocated_bytes(), state.deallocated_bytes());
}

/// 测试8: reset 的各个重载
#[test]
fn test_reset_overloads() {
    let state = TestState::new();
    let mut p = SharedPtr::new(A);
    let old = p.downgrade();

    unsafe { p.reset_raw(Box::into_raw(Box::new(A))) };
    assert!(old.expired());
    assert_eq!(p.use_count(), 1);

    unsafe { p.reset_raw_with_deleter(Box::into_raw(Box::new(A)), TestDeleter::new(&state)) };
    assert_eq!(p.use_count(), 1);
    assert_eq!(state.deleter_count(), 0);

    unsafe {
        p.reset_raw_in(
            Box::into_raw(Box::new(A)),
            TestDeleter::new(&state),
            TestAllocator::new(&state),
        )
    }
    .unwrap();
    // 上一个控制块在新控制块建立之后才被释放
    assert_eq!(state.deleter_count(), 1);

    p.reset();
    assert!(p.is_null());
    assert_eq!(p.use_count(), 0);
    assert_eq!(state.deleter_count(), 2);
    assert_eq!(state.allocated_bytes(), state.deallocated_bytes());
}

/// 测试9: 赋值遵循拷贝/移动规则
#[test]
fn test_assignment() {
    let a = SharedPtr::new(1u32);
    let b = SharedPtr::new(2u32);
    let wb = b.downgrade();

    let mut target = b;
    assert_eq!(target.use_count(), 1);

    target = a.clone();
    assert!(wb.expired());
    assert_eq!(a.use_count(), 2);
    assert_eq!(*target, 1);

    let mut other: SharedPtr<u32> = SharedPtr::null();
    other.clone_from(&target);
    assert_eq!(a.use_count(), 3);
}

/// 测试10: swap 不改变计数
#[test]
fn test_swap() {
    let mut a = SharedPtr::new(1u32);
    let mut b = SharedPtr::new(2u32);
    let a2 = a.clone();

    a.swap(&mut b);
    assert_eq!(*a, 2);
    assert_eq!(*b, 1);
    assert_eq!(a.use_count(), 1);
    assert_eq!(b.use_count(), 2);
    assert!(b.owner_eq(&a2));
}

/// 测试11: owner_before 比较控制块而不是指针
#[test]
fn test_owner_before() {
    let pair = SharedPtr::new((1u32, 2u32));
    let first = pair.project(|p| &p.0);
    let second = pair.project(|p| &p.1);
    assert_ne!(first, second);
    assert!(!first.owner_before(&second));
    assert!(!second.owner_before(&first));

    let other = SharedPtr::new(3u32);
    assert!(first.owner_before(&other) != other.owner_before(&first));

    let weak = other.downgrade();
    assert_eq!(first.owner_before_weak(&weak), first.owner_before(&other));
    assert_eq!(weak.owner_before(&first), other.owner_before(&first));
    assert!(!weak.owner_before_weak(&weak.clone()));
}

/// 测试12: 类型擦除与动态向下转换
#[test]
fn test_downcast() {
    let p = SharedPtr::new(42u64);
    let any = p.clone().into_any();
    assert_eq!(any.use_count(), 2);

    let back = any.downcast::<u64>();
    assert_eq!(*back, 42);
    assert_eq!(back.use_count(), 3);

    // 转换失败：指针为空，但所有权不变
    let wrong = any.downcast::<String>();
    assert!(wrong.is_null());
    assert_eq!(wrong.use_count(), 4);
    assert!(wrong.owner_eq(&p));
}

/// 测试13: 投影为 trait 对象
#[test]
fn test_project_to_trait_object() {
    let p = SharedPtr::new(5i32);
    let shown: SharedPtr<dyn Display> = p.project(|v| v as &dyn Display);
    assert_eq!(shown.to_string(), "5");

    let any: SharedPtr<dyn Any> = p.project(|v| v as &dyn Any);
    assert!(any.is::<i32>());
    assert_eq!(p.use_count(), 3);
}

/// 测试14: 静态指针转换
#[test]
fn test_cast() {
    #[repr(transparent)]
    struct Meters(u32);

    let p = SharedPtr::new(Meters(12));
    let raw: SharedPtr<u32> = unsafe { p.cast() };
    assert_eq!(*raw, 12);
    assert_eq!(raw.use_count(), 2);
}

/// 测试15: get_deleter 按类型查找
#[test]
fn test_get_deleter() {
    let state = TestState::new();
    let raw = Box::into_raw(Box::new(A));
    let p = unsafe { SharedPtr::from_raw_with_deleter(raw, TestDeleter::new(&state)) };

    let deleter = p.get_deleter::<TestDeleter>().unwrap();
    assert!(Arc::ptr_eq(&deleter.state, &state));
    assert!(p.get_deleter::<crate::DefaultDelete>().is_none());

    let alias = p.project(|a| a);
    assert!(alias.get_deleter::<TestDeleter>().is_some());
    assert!(SharedPtr::<A>::null().get_deleter::<TestDeleter>().is_none());
}

/// 测试16: 比较与哈希使用暴露的地址
#[test]
fn test_comparison_and_hash() {
    let a = SharedPtr::new(1u8);
    let a2 = a.clone();
    let b = SharedPtr::new(1u8);
    let null: SharedPtr<u8> = SharedPtr::null();

    assert_eq!(a, a2);
    assert_ne!(a, b);
    assert_eq!(null, SharedPtr::<u16>::null());
    assert!(null < a && null < b);

    let set: HashSet<_> = [a.clone(), a2.clone(), b.clone()].into_iter().collect();
    assert_eq!(set.len(), 2);

    let ordered: BTreeSet<_> = [b.clone(), a.clone(), null.clone()].into_iter().collect();
    assert_eq!(ordered.first(), Some(&null));

    assert_eq!(format!("{:p}", a), format!("{:p}", a.as_ptr().unwrap()));
    assert_eq!(format!("{:p}", null), format!("{:p}", std::ptr::null::<()>()));
}

/// 测试17: 循环强引用会泄漏，用弱引用打破
#[test]
fn test_cycle_broken_by_weak() {
    struct Node {
        drops: Arc<AtomicUsize>,
        parent: crate::AtomicSharedPtr<Node>,
        child_of: std::sync::Mutex<WeakPtr<Node>>,
    }

    impl Drop for Node {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    let make = || Node {
        drops: drops.clone(),
        parent: crate::AtomicSharedPtr::default(),
        child_of: std::sync::Mutex::new(WeakPtr::new()),
    };

    let parent = SharedPtr::new(make());
    let child = SharedPtr::new(make());
    child.parent.store(parent.clone());
    *parent.child_of.lock().unwrap() = child.downgrade();

    drop(parent);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(child);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}
