use super::*;
use client_core::ControllerView;

#[tokio::test]
async fn printer_keeps_going_after_falling_behind() {
    let (sender, receiver) = broadcast::channel(2);
    for _ in 0..5 {
        sender
            .send(ControllerEvent::ViewChanged(ControllerView::Dashboard))
            .expect("receiver alive");
    }
    drop(sender);

    assert_eq!(print_controller_events(receiver).await, 2);
}
