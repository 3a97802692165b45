use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sponsor_common::Price;
use sponsor_engine::{
    db_types::OrderStatusType,
    events::{EventHandler, EventHooks, EventProducers},
    order_objects::CreateOrderRequest,
    refunds::{GatewayError, PaymentGateway, RefundCoordinator, RefundReceipt},
};

mod support;
use support::{seed_catalog, setup_with_producers, successful_payment, tear_down, BUYER};

struct AcceptAll;

#[async_trait]
impl PaymentGateway for AcceptAll {
    async fn refund(&self, _: &str, refund_no: &str, amount: Price) -> Result<RefundReceipt, GatewayError> {
        Ok(RefundReceipt { refund_no: refund_no.into(), gateway_refund_id: None, amount })
    }
}

#[tokio::test]
async fn hooks_see_each_committed_transition_once() {
    let paid = Arc::new(Mutex::new(Vec::<String>::new()));
    let refunded = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut hooks = EventHooks::default();
    let p = paid.clone();
    hooks.on_order_paid(move |ev| {
        let p = p.clone();
        Box::pin(async move {
            assert!(!ev.delivery.is_empty());
            p.lock().unwrap().push(ev.order.order_no);
        })
    });
    let r = refunded.clone();
    hooks.on_order_refunded(move |ev| {
        let r = r.clone();
        Box::pin(async move {
            assert_eq!(ev.order.status, OrderStatusType::Refunded);
            r.lock().unwrap().push(ev.order.order_no);
        })
    });

    let paid_handler = EventHandler::new(8, hooks.on_order_paid.clone().unwrap());
    let refunded_handler = EventHandler::new(8, hooks.on_order_refunded.clone().unwrap());
    let mut producers = EventProducers::default();
    producers.order_paid_producer.push(paid_handler.subscribe());
    producers.order_refunded_producer.push(refunded_handler.subscribe());
    let paid_task = tokio::spawn(paid_handler.start_handler());
    let refunded_task = tokio::spawn(refunded_handler.start_handler());

    let api = setup_with_producers(producers).await.with_refund_coordinator(RefundCoordinator::new(AcceptAll));
    let catalog = seed_catalog(api.db()).await;

    let free = api.create_order(CreateOrderRequest::new(catalog.free.id, BUYER)).await.unwrap().order;
    let bought = api.create_order(CreateOrderRequest::new(catalog.flat.id, BUYER)).await.unwrap().order;
    api.process_payment_notification(successful_payment(&bought.order_no, 9900)).await.unwrap();
    api.process_payment_notification(successful_payment(&bought.order_no, 9900)).await.unwrap();
    let cancelled = api.create_order(CreateOrderRequest::new(catalog.flat.id, "bob@example.com")).await.unwrap().order;
    api.modify_status_for_order(cancelled.id, OrderStatusType::Cancelled).await.unwrap();
    api.modify_status_for_order(bought.id, OrderStatusType::Refunded).await.unwrap();

    tear_down(api).await;
    paid_task.await.unwrap();
    refunded_task.await.unwrap();

    let mut paid = paid.lock().unwrap().clone();
    paid.sort();
    let mut expected = vec![free.order_no.clone(), bought.order_no.clone()];
    expected.sort();
    assert_eq!(paid, expected);
    assert_eq!(*refunded.lock().unwrap(), vec![bought.order_no]);
}
