use forgemesh_core::bus::{DeliveryStatus, Message, MessageBus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// spec §8 scenario 4.
#[test]
fn requester_blocks_until_correlated_response_arrives() {
    let bus = Arc::new(MessageBus::new());
    let sender = Uuid::new_v4();
    let receiver = Uuid::new_v4();

    let bus2 = bus.clone();
    let responder = std::thread::spawn(move || {
        let request = bus2.receive(receiver).expect("request delivered");
        assert_eq!(request.status, DeliveryStatus::Delivered);
        let response = Message::create_response(&request, json!({"answer": 42}));
        bus2.send(response).unwrap();
    });

    let request = Message::new(1, 0, sender, json!({"question": "?"})).to(receiver);
    let request_id = request.id;

    let response = bus
        .request(request, Duration::from_millis(500))
        .unwrap()
        .expect("response arrives within the timeout");

    responder.join().unwrap();

    assert_eq!(response.correlation_id, Some(request_id));
    assert_eq!(response.sender_id, receiver);
    assert_eq!(response.receiver_id, Some(sender));
    assert_eq!(response.payload, json!({"answer": 42}));
}

/// An unrelated message delivered while a request is outstanding is
/// re-enqueued to the sender's mailbox rather than discarded (spec §9).
#[test]
fn unrelated_message_is_reenqueued_not_lost() {
    let bus = Arc::new(MessageBus::new());
    let sender = Uuid::new_v4();
    let receiver = Uuid::new_v4();
    let bystander = Uuid::new_v4();

    let bus2 = bus.clone();
    let responder = std::thread::spawn(move || {
        // an unrelated message lands in the sender's mailbox first
        bus2.send(Message::new(9, 0, bystander, json!("hi")).to(sender)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let request = bus2.receive(receiver).expect("request delivered");
        let response = Message::create_response(&request, json!("pong"));
        bus2.send(response).unwrap();
    });

    let request = Message::new(2, 0, sender, json!("ping")).to(receiver);
    let response = bus
        .request(request, Duration::from_millis(500))
        .unwrap()
        .expect("response arrives within the timeout");
    responder.join().unwrap();

    assert_eq!(response.payload, json!("pong"));
    let reenqueued = bus.try_receive(sender).expect("unrelated message preserved");
    assert_eq!(reenqueued.sender_id, bystander);
}
