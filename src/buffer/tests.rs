use super::*;
use std::sync::Arc;

#[test]
fn snapshot_is_oldest_to_newest() {
    let buf = RingBuffer::new(5);
    for i in 0..3 {
        buf.push(i);
    }
    assert_eq!(buf.snapshot(), vec![0, 1, 2]);
    assert_eq!(buf.len(), 3);
    assert_eq!(buf.last(), Some(2));
}

#[test]
fn overflow_keeps_exactly_the_last_capacity_items() {
    let buf = RingBuffer::new(4);
    for i in 0..10 {
        buf.push(i);
    }
    assert_eq!(buf.len(), 4);
    assert_eq!(buf.snapshot(), vec![6, 7, 8, 9]);

    buf.push(10);
    assert_eq!(buf.snapshot(), vec![7, 8, 9, 10]);
}

#[test]
fn zero_capacity_is_promoted_to_one() {
    let buf = RingBuffer::new(0);
    buf.push(1);
    buf.push(2);
    assert_eq!(buf.capacity(), 1);
    assert_eq!(buf.snapshot(), vec![2]);
}

#[test]
fn clear_empties_the_buffer() {
    let buf = RingBuffer::new(3);
    buf.push("a");
    buf.push("b");
    buf.clear();
    assert!(buf.is_empty());
    assert_eq!(buf.last(), None);
    buf.push("c");
    assert_eq!(buf.snapshot(), vec!["c"]);
}

#[test]
fn concurrent_pushes_never_exceed_capacity() {
    let buf = Arc::new(RingBuffer::new(16));
    let mut handles = vec![];
    for t in 0..4 {
        let buf = buf.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..100 {
                buf.push(t * 1000 + i);
                let snap = buf.snapshot();
                assert!(snap.len() <= 16);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(buf.len(), 16);
}
