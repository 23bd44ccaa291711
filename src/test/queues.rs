use super::{data_frame, mac};
use crate::frame::EthernetFrame;
use crate::queue::{
    DEFAULT_FRAME_BYTES, DropHeadQueue, DropTailQueue, FrameQueue, NoneQueue, PriorityQueue,
    QueueKind, mem_from_frames,
};
use crate::wire::{ControlCode, TunnelControl};

/// 总长 `size` 字节的数据帧，载荷首字节作为标记
fn tagged(tag: u8, size: usize) -> EthernetFrame {
    let mut payload = vec![0u8; size - 14];
    payload[0] = tag;
    EthernetFrame::new(mac(2), mac(1), 0x0800, &payload)
}

fn tag(frame: &EthernetFrame) -> u8 {
    frame.payload()[0]
}

fn control() -> EthernetFrame {
    TunnelControl::new(ControlCode::EchoRequest).to_frame(mac(2), mac(1))
}

#[test]
fn none_queue_drops_everything() {
    let mut q = NoneQueue;
    let frame = data_frame(mac(2), mac(1), 10);
    let dropped = q.enqueue(frame.clone()).expect_err("should drop");
    assert_eq!(dropped, frame);
    assert!(q.is_empty());
    assert!(q.dequeue().is_none());
}

#[test]
fn droptail_queue_enforces_capacity_and_preserves_order() {
    let mut q = DropTailQueue::new(100);
    assert_eq!(q.capacity_bytes(), 100);
    assert_eq!(q.len(), 0);
    assert_eq!(q.bytes(), 0);

    assert!(q.enqueue(tagged(1, 60)).is_ok());
    assert_eq!(q.len(), 1);
    assert_eq!(q.bytes(), 60);

    let dropped = q.enqueue(tagged(2, 50)).expect_err("should drop");
    assert_eq!(tag(&dropped), 2);
    assert_eq!(q.len(), 1);
    assert_eq!(q.bytes(), 60);

    assert_eq!(tag(&q.dequeue().expect("frame")), 1);
    assert_eq!(q.len(), 0);
    assert_eq!(q.bytes(), 0);
    assert!(q.dequeue().is_none());
}

#[test]
fn drophead_queue_evicts_oldest_to_make_room() {
    let mut q = DropHeadQueue::new(100);
    assert!(q.enqueue(tagged(1, 40)).is_ok());
    assert!(q.enqueue(tagged(2, 40)).is_ok());

    let evicted = q.enqueue(tagged(3, 40)).expect_err("oldest evicted");
    assert_eq!(tag(&evicted), 1);
    assert_eq!(q.len(), 2);
    assert_eq!(q.bytes(), 80);
    assert_eq!(tag(&q.dequeue().expect("frame")), 2);
    assert_eq!(tag(&q.dequeue().expect("frame")), 3);
}

#[test]
fn drophead_queue_rejects_frame_larger_than_capacity() {
    let mut q = DropHeadQueue::new(50);
    assert!(q.enqueue(tagged(1, 40)).is_ok());
    let dropped = q.enqueue(tagged(2, 60)).expect_err("too large");
    assert_eq!(tag(&dropped), 2);
    assert_eq!(q.len(), 1);
}

#[test]
fn priority_queue_dequeues_control_before_data() {
    let mut q = PriorityQueue::new(1_000);
    assert!(q.enqueue(tagged(1, 100)).is_ok());
    assert!(q.enqueue(control()).is_ok());
    assert!(q.enqueue(tagged(2, 100)).is_ok());

    let first = q.dequeue().expect("frame");
    assert_eq!(
        TunnelControl::from_frame(&first).expect("control").code,
        ControlCode::EchoRequest
    );
    assert_eq!(tag(&q.dequeue().expect("frame")), 1);
    assert_eq!(tag(&q.dequeue().expect("frame")), 2);
    assert!(q.dequeue().is_none());
}

#[test]
fn priority_queue_enforces_capacity_drop_tail() {
    let mut q = PriorityQueue::new(100);
    assert!(q.enqueue(tagged(1, 90)).is_ok());
    assert_eq!(q.bytes(), 90);

    let dropped = q.enqueue(control()).expect_err("should drop");
    assert_eq!(dropped, control());
    assert_eq!(q.bytes(), 90);
    assert_eq!(q.len(), 1);
}

#[test]
fn mem_from_frames_multiplies_default_frame_bytes_and_saturates() {
    assert_eq!(mem_from_frames(0), 0);
    assert_eq!(mem_from_frames(2), DEFAULT_FRAME_BYTES.saturating_mul(2));
    assert_eq!(mem_from_frames(u64::MAX), u64::MAX);
}

#[test]
fn queue_kind_builds_the_selected_policy() {
    let mut q = QueueKind::DropTail.build(1_000);
    assert_eq!(q.capacity_bytes(), 1_000);
    assert!(q.enqueue(tagged(1, 100)).is_ok());

    let mut none = QueueKind::default().build(1_000);
    assert!(none.enqueue(tagged(1, 100)).is_err());

    let kind: QueueKind = serde_json::from_str("\"drop_head\"").expect("kind");
    assert_eq!(kind, QueueKind::DropHead);
}
