use elastic_alloc::{capacity, AllocError, Arena, Config, Error, GrowVec, Traced, TryGlobal};

#[test]
fn push_twenty_then_pop_them_all() {
    let mut v = GrowVec::new();
    for i in 0..20 {
        v.push(i).unwrap();
    }
    assert_eq!(v.len(), 20);
    assert_eq!(v.capacity(), 32);
    for i in 5..15 {
        assert_eq!(v.at(i), Ok(&(i as i32)));
    }

    let popped: Vec<i32> = (0..20).map(|_| v.pop()).collect();
    assert_eq!(popped, (0..20).rev().collect::<Vec<_>>());
    v.release();
    assert_eq!(v.capacity(), 0);
}

#[test]
fn insert_into_an_empty_vector() {
    let mut v = GrowVec::new();
    v.insert(19, 2).unwrap();
    assert_eq!(v.len(), 20);
    assert!(v.capacity() >= 20);
    assert_eq!(v.at(19), Ok(&2));
}

#[test]
fn copy_survives_releasing_the_source() {
    let mut src = GrowVec::new();
    for i in 0..5u32 {
        src.push(i * 10).unwrap();
    }
    src.resize(8).unwrap();

    let mut dest = GrowVec::new();
    dest.copy_from(&src).unwrap();
    src.release();

    assert_eq!(dest.len(), 5);
    assert!(dest.capacity() >= 8);
    assert_eq!(dest.as_slice(), &[0, 10, 20, 30, 40]);
}

#[test]
#[should_panic(expected = "pop on empty vector")]
fn pop_on_a_fresh_vector_is_fatal() {
    let mut v: GrowVec<i32> = GrowVec::new();
    v.pop();
}

#[test]
fn narrow_counters_with_a_custom_round_up() {
    let config = |name: &'static str| Config {
        alloc: Traced(TryGlobal),
        roundup: capacity::smear,
        context: name,
    };
    let mut vec: GrowVec<i32, u16, Traced<TryGlobal>, &str> =
        GrowVec::with_config(config("my vector!"));
    let mut vec2: GrowVec<i32, u16, Traced<TryGlobal>, &str> =
        GrowVec::with_config(config("another vector"));

    vec.insert(19, 2).unwrap();
    for i in 0..20 {
        vec.push(i).unwrap();
        *vec.push_slot().unwrap() = i * 2;
    }
    assert_eq!(vec.len(), 60);
    assert_eq!(vec.capacity(), 64);

    vec2.copy_from(&vec).unwrap();
    assert_eq!(*vec2.context(), "another vector");

    *vec.at_mut(18).unwrap() = 3;
    assert_eq!(vec.at(18), Ok(&3));
    assert_eq!(vec2.at(18), Ok(&0));

    let mut expected = vec2.as_slice().to_vec();
    expected[18] = 3;
    while let Some(x) = vec.try_pop() {
        assert_eq!(Some(x), expected.pop());
    }
    assert!(expected.is_empty());
    assert_eq!(vec2.len(), 60);
    assert_eq!(vec2.pop(), 38);
}

#[test]
fn pooled_vectors_report_exhaustion() {
    let arena = Arena::new(64, 4);
    let mut big: GrowVec<u64, usize, &Arena> = GrowVec::new_in(&arena);
    for i in 0..32 {
        big.push(i).unwrap();
    }
    assert_eq!(arena.free_pages(), 0);

    let mut other: GrowVec<u64, usize, &Arena> = GrowVec::new_in(&arena);
    assert_eq!(other.push(1), Err(Error::Alloc(AllocError::OutOfMemory)));
    assert!(other.is_empty());

    big.release();
    other.push(1).unwrap();
    assert_eq!(arena.used_pages(), 1);
}
