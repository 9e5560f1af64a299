mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use storefront_api::{
    auth::{AuthUser, UserId, ADMIN_ROLE},
    entities::{
        order::{OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress},
        Order,
    },
    errors::ServiceError,
    services::{AdminOrderUpdate, OrderFilter, PlaceOrderInput},
};

fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        first_name: "Asha".into(),
        last_name: "Patel".into(),
        street: "12 MG Road".into(),
        city: "Pune".into(),
        postal_code: "411001".into(),
        country: "IN".into(),
        phone: Some("+91-9800000000".into()),
    }
}

fn shopper(user_id: UserId) -> AuthUser {
    AuthUser {
        id: user_id,
        email: None,
        roles: vec![],
    }
}

fn admin() -> AuthUser {
    AuthUser {
        id: UserId::new(),
        email: None,
        roles: vec![ADMIN_ROLE.to_string()],
    }
}

fn place_input(method: PaymentMethod) -> PlaceOrderInput {
    PlaceOrderInput {
        shipping_address: shipping_address(),
        payment_method: method,
    }
}

#[tokio::test]
async fn place_order_on_empty_cart_fails_and_creates_nothing() {
    let app = TestApp::new().await;
    let user_id = UserId::new();

    let err = app
        .state
        .services
        .checkout
        .place_order(user_id, place_input(PaymentMethod::Razorpay))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::EmptyCart);

    let order_count = Order::find().count(&*app.state.db).await.expect("count");
    assert_eq!(order_count, 0);
}

#[tokio::test]
async fn place_order_snapshots_cart_and_clears_it() {
    let app = TestApp::new().await;
    let user_id = UserId::new();
    let product = app.seed_product("Mixer Grinder", dec!(450), 100).await;

    app.state
        .services
        .cart
        .add_item(user_id, product.id, 2)
        .await
        .expect("add");

    let placed = app
        .state
        .services
        .checkout
        .place_order(user_id, place_input(PaymentMethod::Razorpay))
        .await
        .expect("place order");

    assert_eq!(placed.order.total_price, dec!(900));
    assert_eq!(placed.order.order_status, OrderStatus::Pending);
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].product_name, "Mixer Grinder");
    assert_eq!(placed.items[0].quantity, 2);
    assert_eq!(placed.items[0].unit_price, dec!(450));

    // The cart is cleared, not deleted.
    let cart = app
        .state
        .services
        .cart
        .get_or_create_cart(user_id)
        .await
        .expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.cart.total, Decimal::ZERO);
}

#[tokio::test]
async fn order_totals_are_immutable_after_product_edits() {
    let app = TestApp::new().await;
    let user_id = UserId::new();
    let product = app.seed_product("Kettle", dec!(450), 100).await;

    app.state
        .services
        .cart
        .add_item(user_id, product.id, 2)
        .await
        .expect("add");

    let placed = app
        .state
        .services
        .checkout
        .place_order(user_id, place_input(PaymentMethod::Stripe))
        .await
        .expect("place order");

    // Reprice and rename the product afterwards.
    let mut active: storefront_api::entities::product::ActiveModel = product.into();
    active.price = Set(dec!(9999));
    active.name = Set("Kettle Pro Max".into());
    active.update(&*app.state.db).await.expect("edit product");

    let reread = app
        .state
        .services
        .orders
        .get_order(placed.order.id, &shopper(user_id))
        .await
        .expect("order");

    assert_eq!(reread.order.total_price, dec!(900));
    assert_eq!(reread.items[0].unit_price, dec!(450));
    assert_eq!(reread.items[0].product_name, "Kettle");
}

#[tokio::test]
async fn ownership_gate_on_get_order() {
    let app = TestApp::new().await;
    let owner_id = UserId::new();
    let product = app.seed_product("Toaster", dec!(100), 10).await;

    app.state
        .services
        .cart
        .add_item(owner_id, product.id, 1)
        .await
        .expect("add");
    let placed = app
        .state
        .services
        .checkout
        .place_order(owner_id, place_input(PaymentMethod::CashOnDelivery))
        .await
        .expect("place order");

    let orders = &app.state.services.orders;

    assert_matches!(
        orders
            .get_order(placed.order.id, &shopper(UserId::new()))
            .await
            .unwrap_err(),
        ServiceError::Forbidden
    );
    assert!(orders.get_order(placed.order.id, &shopper(owner_id)).await.is_ok());
    assert!(orders.get_order(placed.order.id, &admin()).await.is_ok());
}

#[tokio::test]
async fn cancel_respects_the_state_machine() {
    let app = TestApp::new().await;
    let user_id = UserId::new();
    let product = app.seed_product("Blender", dec!(150), 10).await;
    let caller = shopper(user_id);

    for (status, should_cancel) in [
        (OrderStatus::Pending, true),
        (OrderStatus::Confirmed, true),
        (OrderStatus::Shipped, false),
        (OrderStatus::Delivered, false),
        (OrderStatus::Cancelled, false),
    ] {
        app.state
            .services
            .cart
            .add_item(user_id, product.id, 1)
            .await
            .expect("add");
        let placed = app
            .state
            .services
            .checkout
            .place_order(user_id, place_input(PaymentMethod::Razorpay))
            .await
            .expect("place order");

        if status != OrderStatus::Pending {
            app.state
                .services
                .orders
                .update_order(
                    placed.order.id,
                    AdminOrderUpdate {
                        order_status: Some(status),
                        ..Default::default()
                    },
                )
                .await
                .expect("force status");
        }

        let result = app
            .state
            .services
            .orders
            .cancel_order(placed.order.id, &caller)
            .await;

        if should_cancel {
            assert_eq!(
                result.expect("cancel").order.order_status,
                OrderStatus::Cancelled
            );
        } else {
            assert_matches!(result.unwrap_err(), ServiceError::InvalidTransition(_));

            // No state change on the rejected cancel.
            let after = app
                .state
                .services
                .orders
                .get_order(placed.order.id, &caller)
                .await
                .expect("order");
            assert_eq!(after.order.order_status, status);
        }
    }
}

#[tokio::test]
async fn cancel_requires_owner_or_admin() {
    let app = TestApp::new().await;
    let owner_id = UserId::new();
    let product = app.seed_product("Fan", dec!(75), 10).await;

    app.state
        .services
        .cart
        .add_item(owner_id, product.id, 1)
        .await
        .expect("add");
    let placed = app
        .state
        .services
        .checkout
        .place_order(owner_id, place_input(PaymentMethod::Razorpay))
        .await
        .expect("place order");

    assert_matches!(
        app.state
            .services
            .orders
            .cancel_order(placed.order.id, &shopper(UserId::new()))
            .await
            .unwrap_err(),
        ServiceError::Forbidden
    );

    let cancelled = app
        .state
        .services
        .orders
        .cancel_order(placed.order.id, &admin())
        .await
        .expect("admin cancel");
    assert_eq!(cancelled.order.order_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn admin_update_writes_only_allow_listed_fields() {
    let app = TestApp::new().await;
    let user_id = UserId::new();
    let product = app.seed_product("Heater", dec!(220), 10).await;

    app.state
        .services
        .cart
        .add_item(user_id, product.id, 1)
        .await
        .expect("add");
    let placed = app
        .state
        .services
        .checkout
        .place_order(user_id, place_input(PaymentMethod::CashOnDelivery))
        .await
        .expect("place order");

    let updated = app
        .state
        .services
        .orders
        .update_order(
            placed.order.id,
            AdminOrderUpdate {
                order_status: Some(OrderStatus::Shipped),
                payment_status: Some(PaymentStatus::Completed),
                tracking_number: Some("TRACK-1234".into()),
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.order.order_status, OrderStatus::Shipped);
    assert_eq!(updated.order.payment_status, PaymentStatus::Completed);
    assert_eq!(updated.order.tracking_number.as_deref(), Some("TRACK-1234"));
    // The frozen snapshot is untouched.
    assert_eq!(updated.order.total_price, dec!(220));
}

#[tokio::test]
async fn admin_listing_filters_and_paginates() {
    let app = TestApp::new().await;
    let product = app.seed_product("Bulb", dec!(20), 1000).await;

    for _ in 0..3 {
        let user_id = UserId::new();
        app.state
            .services
            .cart
            .add_item(user_id, product.id, 1)
            .await
            .expect("add");
        app.state
            .services
            .checkout
            .place_order(user_id, place_input(PaymentMethod::Razorpay))
            .await
            .expect("place order");
    }

    // Confirm one of them.
    let (all, total) = app
        .state
        .services
        .orders
        .list_orders(OrderFilter::default(), 1, 10)
        .await
        .expect("list");
    assert_eq!(total, 3);
    app.state
        .services
        .orders
        .update_order(
            all[0].order.id,
            AdminOrderUpdate {
                order_status: Some(OrderStatus::Confirmed),
                ..Default::default()
            },
        )
        .await
        .expect("confirm");

    let (confirmed, confirmed_total) = app
        .state
        .services
        .orders
        .list_orders(
            OrderFilter {
                order_status: Some(OrderStatus::Confirmed),
                payment_status: None,
            },
            1,
            10,
        )
        .await
        .expect("list confirmed");
    assert_eq!(confirmed_total, 1);
    assert_eq!(confirmed.len(), 1);

    let (page, paged_total) = app
        .state
        .services
        .orders
        .list_orders(OrderFilter::default(), 2, 2)
        .await
        .expect("page 2");
    assert_eq!(paged_total, 3);
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn user_listing_returns_only_own_orders() {
    let app = TestApp::new().await;
    let alice = UserId::new();
    let bob = UserId::new();
    let product = app.seed_product("Cable", dec!(15), 100).await;

    for user in [alice, bob] {
        app.state
            .services
            .cart
            .add_item(user, product.id, 1)
            .await
            .expect("add");
        app.state
            .services
            .checkout
            .place_order(user, place_input(PaymentMethod::Stripe))
            .await
            .expect("place order");
    }

    let mine = app
        .state
        .services
        .orders
        .list_user_orders(alice)
        .await
        .expect("list");

    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].order.user_id, alice.as_uuid());
}
