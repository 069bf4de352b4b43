//! Checkout: pricing a cart, opening a gateway payment and turning a
//! confirmed payment into an order.
//!
//! Orders only exist once money has arrived. `finalize` is keyed on the
//! gateway's payment reference, so a webhook and the client callback (or a
//! retried webhook) for the same payment produce a single order.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::carts;
use crate::db::inventory::{self, InventoryWriteError, Movement};
use crate::db::orders::{self, NewOrder, NewOrderItem};
use crate::db::{AddressRepository, OrderRepository, RepositoryError, SettingsRepository, ShippingRepository, UserRepository};
use crate::domain::aggregates::order::order_total;
use crate::domain::aggregates::shipping::{matching_rates, select_rate, shipping_charge};
use crate::domain::aggregates::{
    Address, Cart, CartLine, CartView, InventoryTransactionKind, Order, OrderStatus, Parcel, PaymentStatus, ProductVariant,
    ShippingAddress, ShippingRate, ShippingZone, StoreSettings, User,
};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;
use crate::error::{AppError, Result};
use crate::payments::{ConfirmedPayment, PaymentGateway, PaymentMetadata, PaymentRequest, PaymentSession};
use crate::services::events::EventPublisher;
use crate::services::notifications::Mailer;

/// A shipping option offered for the destination.
#[derive(Debug, Clone, Serialize)]
pub struct RateOption {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub estimated_days: Option<String>,
}

impl From<&ShippingRate> for RateOption {
    fn from(rate: &ShippingRate) -> Self {
        Self { id: rate.id, name: rate.name.clone(), price: rate.price, estimated_days: rate.estimated_days.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub cart: CartView,
    pub address_id: Uuid,
    pub shipping_address: ShippingAddress,
    pub rates: Vec<RateOption>,
    pub selected_rate: RateOption,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub currency: String,
}

/// Everything besides the cart that pricing depends on.
#[derive(Debug, Clone)]
struct PricingContext {
    address: Address,
    zones: Vec<ShippingZone>,
    rates: Vec<ShippingRate>,
    settings: StoreSettings,
}

/// Prices a cart for delivery to `ctx.address`.
fn price(cart: Cart, ctx: &PricingContext, requested_rate: Option<Uuid>) -> Result<Quote> {
    cart.ensure_purchasable()?;
    let subtotal = cart.subtotal();
    let parcel = Parcel {
        country: ctx.address.country.clone(),
        state: ctx.address.state.clone(),
        subtotal: subtotal.amount(),
        weight_grams: cart.total_weight_grams(),
    };

    let candidates = matching_rates(&ctx.zones, &ctx.rates, &parcel);
    let selected = select_rate(&candidates, requested_rate)?;
    let shipping = shipping_charge(selected, subtotal.amount(), ctx.settings.free_shipping_threshold);

    Ok(Quote {
        address_id: ctx.address.id,
        shipping_address: ShippingAddress::from(&ctx.address),
        rates: candidates.iter().map(|r| RateOption::from(*r)).collect(),
        selected_rate: RateOption::from(selected),
        subtotal: subtotal.amount(),
        shipping,
        total: order_total(subtotal.amount(), shipping),
        currency: subtotal.currency().to_string(),
        cart: CartView::from(cart),
    })
}

/// Why a paid order needs a human to look at it, if anything.
fn review_note(quote_total: Decimal, quote_currency: &str, paid: &ConfirmedPayment) -> Option<String> {
    if !paid.currency.eq_ignore_ascii_case(quote_currency) {
        return Some(format!("Paid in {} but order is priced in {quote_currency}", paid.currency));
    }
    if paid.amount != quote_total {
        return Some(format!("Paid {} {} but order total is {quote_total}; check before fulfilling", paid.currency, paid.amount));
    }
    None
}

/// What a confirmed payment turns into, before stock is taken.
#[derive(Debug, Clone)]
struct OrderPlan {
    lines: Vec<CartLine>,
    shipping_address: ShippingAddress,
    rate: Option<RateOption>,
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    currency: String,
    notes: Vec<String>,
}

impl OrderPlan {
    fn needs_review(&self) -> bool { !self.notes.is_empty() }

    /// Order lines, with `stocked[i]` units of line `i` taken from stock.
    fn items(&self, stocked: &[i32]) -> Vec<NewOrderItem> {
        self.lines
            .iter()
            .zip(stocked.iter().copied().chain(std::iter::repeat(0)))
            .map(|(l, stocked)| NewOrderItem {
                product_id: l.product_id,
                variant_id: l.variant_id,
                name: l.product_name.clone(),
                sku: l.sku.clone(),
                size: l.size.clone(),
                color: l.color.clone(),
                quantity: l.quantity,
                stocked_quantity: stocked.clamp(0, l.quantity),
                unit_price: l.unit_price,
            })
            .collect()
    }

    fn new_order(&self, order_number: String, user: &User, paid: &ConfirmedPayment) -> NewOrder {
        NewOrder {
            order_number,
            user_id: user.id,
            email: user.email.clone(),
            status: if self.needs_review() { OrderStatus::Pending } else { OrderStatus::Processing },
            payment_status: PaymentStatus::Paid,
            payment_gateway: paid.gateway,
            payment_reference: paid.reference.clone(),
            subtotal: self.subtotal,
            shipping_total: self.shipping,
            total: self.total,
            amount_paid: paid.amount,
            currency: self.currency.clone(),
            shipping_address: self.shipping_address.clone(),
            shipping_rate_id: self.rate.as_ref().map(|r| r.id),
            shipping_method: self.rate.as_ref().map(|r| r.name.clone()),
            notes: self.needs_review().then(|| self.notes.join("\n")),
        }
    }
}

/// Prices the cart behind a confirmed payment. Nothing here rejects the
/// payment: stock, product or rate drift since checkout started, an
/// emptied cart and an address no rate covers all become review notes.
fn plan_order(cart: Cart, ctx: &PricingContext, paid: &ConfirmedPayment) -> OrderPlan {
    let requested = paid.metadata.shipping_rate_id;
    let shipping_address = ShippingAddress::from(&ctx.address);

    if cart.is_empty() {
        return OrderPlan {
            lines: Vec::new(),
            shipping_address,
            rate: None,
            subtotal: Decimal::ZERO,
            shipping: Decimal::ZERO,
            total: Decimal::ZERO,
            currency: paid.currency.to_uppercase(),
            notes: vec![format!(
                "Payment of {} {} arrived for an empty cart; refund or contact the customer",
                paid.currency, paid.amount
            )],
        };
    }

    let mut notes = Vec::new();
    if let Err(e) = cart.ensure_purchasable() {
        notes.push(format!("Cart changed after payment: {e}"));
    }

    let subtotal = cart.subtotal();
    let parcel = Parcel {
        country: ctx.address.country.clone(),
        state: ctx.address.state.clone(),
        subtotal: subtotal.amount(),
        weight_grams: cart.total_weight_grams(),
    };
    let candidates = matching_rates(&ctx.zones, &ctx.rates, &parcel);
    let rate = match select_rate(&candidates, Some(requested)) {
        Ok(rate) => Some(rate),
        Err(_) => {
            let fallback = select_rate(&candidates, None).ok();
            notes.push(match fallback {
                Some(rate) => format!("Requested shipping rate {requested} no longer applies; used {}", rate.name),
                None => "No shipping rate covers this address; arrange delivery manually".to_string(),
            });
            fallback
        }
    };

    let shipping = rate.map_or(Decimal::ZERO, |r| shipping_charge(r, subtotal.amount(), ctx.settings.free_shipping_threshold));
    let total = order_total(subtotal.amount(), shipping);
    let currency = subtotal.currency().to_string();
    notes.extend(review_note(total, &currency, paid));

    OrderPlan {
        lines: cart.lines,
        shipping_address,
        rate: rate.map(RateOption::from),
        subtotal: subtotal.amount(),
        shipping,
        total,
        currency,
        notes,
    }
}

/// Result of [`CheckoutService::finalize`].
#[derive(Debug, Clone)]
pub struct Finalized {
    pub order: Order,
    /// False when the payment had already been turned into an order.
    pub created: bool,
}

pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    events: &'a EventPublisher,
    mailer: &'a Mailer,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, events: &'a EventPublisher, mailer: &'a Mailer) -> Self {
        Self { pool, events, mailer }
    }

    async fn context(&self, address: Address) -> Result<PricingContext> {
        let shipping = ShippingRepository::new(self.pool);
        Ok(PricingContext {
            address,
            zones: shipping.zones(true).await?,
            rates: shipping.rates(None, true).await?,
            settings: SettingsRepository::new(self.pool).load().await?,
        })
    }

    pub async fn quote(&self, user_id: Uuid, address_id: Uuid, rate_id: Option<Uuid>) -> Result<Quote> {
        let address = AddressRepository::new(self.pool).get(user_id, address_id).await?;
        let ctx = self.context(address).await?;
        let cart = carts::CartRepository::new(self.pool).get(user_id).await?;
        price(cart, &ctx, rate_id)
    }

    /// Prices the cart and opens a payment for the total with the gateway.
    pub async fn start(
        &self,
        gateway: &dyn PaymentGateway,
        user: &User,
        address_id: Uuid,
        rate_id: Option<Uuid>,
    ) -> Result<(Quote, PaymentSession)> {
        let quote = self.quote(user.id, address_id, rate_id).await?;
        let request = PaymentRequest {
            amount: Money::new(quote.total, &quote.currency),
            receipt: format!("c_{}", quote.cart.cart.id.simple()),
            customer_email: user.email.clone(),
            metadata: PaymentMetadata { user_id: user.id, address_id, shipping_rate_id: quote.selected_rate.id },
        };
        let session = gateway.create_payment(&request).await?;
        tracing::info!(
            user_id = %user.id,
            gateway = %gateway.kind(),
            reference = %session.reference,
            total = %quote.total,
            "Checkout started"
        );
        Ok((quote, session))
    }

    /// Creates the order for a confirmed payment, once.
    ///
    /// Captured money always yields an order. When the cart or rates moved
    /// since checkout started, the order is held as `pending` with notes.
    pub async fn finalize(&self, paid: &ConfirmedPayment) -> Result<Finalized> {
        let orders_repo = OrderRepository::new(self.pool);
        if let Some(order) = orders_repo.find_by_reference(&paid.reference).await? {
            tracing::debug!(reference = %paid.reference, order_number = %order.order_number, "Payment already finalized");
            return Ok(Finalized { order, created: false });
        }

        let meta = paid.metadata;
        let user = UserRepository::new(self.pool)
            .get_by_id(meta.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("customer"))?;
        let address = self.resolve_address(meta.user_id, meta.address_id).await?;
        let ctx = self.context(address).await?;

        let mut tx = self.pool.begin().await?;

        // Serialises concurrent finalizers for the same customer.
        sqlx::query("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE").bind(user.id).execute(&mut *tx).await?;
        if let Some(order) = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE payment_reference = $1")
            .bind(&paid.reference)
            .fetch_optional(&mut *tx)
            .await?
        {
            return Ok(Finalized { order, created: false });
        }

        let cart = carts::load(&mut tx, user.id).await?;
        let mut plan = plan_order(cart, &ctx, paid);
        let order_number = orders::next_order_number(&mut tx, Utc::now()).await?;

        let mut touched: Vec<ProductVariant> = Vec::with_capacity(plan.lines.len());
        let mut stocked: Vec<i32> = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let movement = Movement {
                variant_id: line.variant_id,
                kind: InventoryTransactionKind::Sale,
                quantity: line.quantity,
                reference: Some(&order_number),
                note: Some("checkout"),
                actor: Some(user.id),
            };
            match inventory::apply(&mut tx, &movement).await {
                Ok((_, variant)) => {
                    touched.push(variant);
                    stocked.push(line.quantity);
                }
                Err(InventoryWriteError::Inventory(e)) => {
                    plan.notes.push(format!("{}: {e}", line.sku));
                    stocked.push(0);
                }
                Err(InventoryWriteError::Repository(e)) => return Err(e.into()),
            }
        }

        let items = plan.items(&stocked);
        let new_order = plan.new_order(order_number, &user, paid);
        let order = orders::insert(&mut tx, &new_order, &items).await?;
        carts::clear_in(&mut tx, user.id).await?;
        tx.commit().await?;

        if plan.needs_review() {
            tracing::warn!(order_number = %order.order_number, reference = %paid.reference, notes = ?plan.notes, "Order created for manual review");
        } else {
            tracing::info!(order_number = %order.order_number, total = %order.total, gateway = %paid.gateway, "Order created");
        }

        self.after_create(&order, &touched, ctx.settings.low_stock_threshold).await?;
        Ok(Finalized { order, created: true })
    }

    /// The address chosen at checkout, or the customer's default if it was deleted since.
    async fn resolve_address(&self, user_id: Uuid, address_id: Uuid) -> Result<Address> {
        let repo = AddressRepository::new(self.pool);
        match repo.get(user_id, address_id).await {
            Ok(address) => Ok(address),
            Err(RepositoryError::NotFound(_)) => repo
                .list(user_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::not_found("shipping address")),
            Err(e) => Err(e.into()),
        }
    }

    async fn after_create(&self, order: &Order, touched: &[ProductVariant], low_stock_threshold: i32) -> Result<()> {
        self.events
            .publish(DomainEvent::Order(OrderEvent::Created {
                order_id: order.id,
                order_number: order.order_number.clone(),
                user_id: order.user_id,
                total: order.total,
            }))
            .await;
        for variant in touched {
            self.events.low_stock_check(variant, low_stock_threshold).await;
        }

        let detail = OrderRepository::new(self.pool).detail(order.clone()).await?;
        self.mailer.send_later(self.mailer.order_confirmation(&detail));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{GatewayKind, ProductStatus, RateKind, UserRole};

    fn line(price: i64, qty: i32, available: i32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(), variant_id: Uuid::new_v4(), product_id: Uuid::new_v4(),
            product_name: "Baju Melayu Cekak Musang".into(), product_slug: "baju-melayu-cekak-musang".into(),
            product_status: ProductStatus::Active, sku: "BMC-L-MRN".into(), size: Some("L".into()),
            color: Some("Maroon".into()), image: None, unit_price: Decimal::from(price), quantity: qty, available,
            weight_grams: 400,
        }
    }

    fn context(free_threshold: Option<i64>) -> PricingContext {
        let now = Utc::now();
        let zone = ShippingZone {
            id: Uuid::new_v4(), name: "Peninsular".into(), countries: vec!["MY".into()], states: vec![],
            is_active: true, created_at: now, updated_at: now,
        };
        let rate = |name: &str, price: i64| ShippingRate {
            id: Uuid::new_v4(), zone_id: zone.id, name: name.into(), kind: RateKind::Flat, min_value: None,
            max_value: None, price: Decimal::from(price), estimated_days: Some("2-4".into()), is_active: true,
            created_at: now, updated_at: now,
        };
        let rates = vec![rate("Express", 15), rate("Standard", 8)];
        PricingContext {
            address: Address {
                id: Uuid::new_v4(), user_id: Uuid::nil(), full_name: "Nur Aisyah".into(), phone: "+60123456789".into(),
                line1: "12 Jalan Ampang".into(), line2: None, city: "Kuala Lumpur".into(), state: "WP Kuala Lumpur".into(),
                postcode: "50450".into(), country: "MY".into(), is_default: true, created_at: now, updated_at: now,
            },
            zones: vec![zone],
            rates,
            settings: StoreSettings { free_shipping_threshold: free_threshold.map(Decimal::from), ..StoreSettings::default() },
        }
    }

    fn cart(lines: Vec<CartLine>) -> Cart { Cart { id: Uuid::new_v4(), user_id: Uuid::nil(), lines } }

    #[test]
    fn test_quote_picks_cheapest_rate() {
        let quote = price(cart(vec![line(100, 2, 5)]), &context(None), None).unwrap();
        assert_eq!(quote.subtotal, Decimal::from(200));
        assert_eq!(quote.selected_rate.name, "Standard");
        assert_eq!(quote.shipping, Decimal::from(8));
        assert_eq!(quote.total, Decimal::from(208));
        assert_eq!(quote.rates.len(), 2);
    }

    #[test]
    fn test_quote_honours_requested_rate_and_free_shipping() {
        let ctx = context(Some(150));
        let express = ctx.rates[0].id;
        let quote = price(cart(vec![line(100, 2, 5)]), &ctx, Some(express)).unwrap();
        assert_eq!(quote.selected_rate.name, "Express");
        assert_eq!(quote.shipping, Decimal::ZERO);
        assert_eq!(quote.total, Decimal::from(200));
    }

    #[test]
    fn test_quote_errors() {
        assert!(matches!(price(cart(vec![]), &context(None), None), Err(AppError::BadRequest(_))));
        assert!(matches!(price(cart(vec![line(100, 3, 2)]), &context(None), None), Err(AppError::BadRequest(_))));

        let mut abroad = context(None);
        abroad.address.country = "SG".into();
        assert!(matches!(price(cart(vec![line(100, 1, 2)]), &abroad, None), Err(AppError::BadRequest(_))));
        assert!(matches!(price(cart(vec![line(100, 1, 2)]), &context(None), Some(Uuid::new_v4())), Err(AppError::BadRequest(_))));
    }

    fn payment(amount: i64, currency: &str, rate: Uuid) -> ConfirmedPayment {
        ConfirmedPayment {
            gateway: GatewayKind::Stripe,
            reference: "pi_1".into(),
            amount: Decimal::from(amount),
            currency: currency.into(),
            metadata: PaymentMetadata { user_id: Uuid::nil(), address_id: Uuid::nil(), shipping_rate_id: rate },
        }
    }

    fn customer() -> User {
        User {
            id: Uuid::nil(), email: "aisyah@example.com".into(), name: "Nur Aisyah".into(), role: UserRole::Customer,
            created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_review_note_on_mismatch() {
        let paid = |amount: i64, currency: &str| payment(amount, currency, Uuid::nil());
        assert_eq!(review_note(Decimal::from(208), "MYR", &paid(208, "MYR")), None);
        assert!(review_note(Decimal::from(208), "MYR", &paid(200, "MYR")).is_some());
        assert!(review_note(Decimal::from(208), "MYR", &paid(208, "USD")).is_some());
    }

    #[test]
    fn test_plan_for_matching_payment() {
        let ctx = context(None);
        let standard = ctx.rates[1].id;
        let plan = plan_order(cart(vec![line(100, 2, 5)]), &ctx, &payment(208, "MYR", standard));
        assert!(plan.notes.is_empty());
        assert_eq!(plan.rate.as_ref().map(|r| r.id), Some(standard));
        assert_eq!(plan.total, Decimal::from(208));

        let order = plan.new_order("BW240615-000001".into(), &customer(), &payment(208, "MYR", standard));
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.notes, None);
    }

    #[test]
    fn test_plan_keeps_paid_rate_when_stock_drifted() {
        let ctx = context(None);
        let express = ctx.rates[0].id;
        let paid = payment(215, "MYR", express);
        let plan = plan_order(cart(vec![line(100, 2, 1)]), &ctx, &paid);

        assert_eq!(plan.rate.as_ref().map(|r| r.name.as_str()), Some("Express"));
        assert_eq!(plan.shipping, Decimal::from(15));
        assert_eq!(plan.total, Decimal::from(215));
        assert_eq!(plan.notes.len(), 1);
        assert!(plan.notes[0].contains("BMC-L-MRN"));
        assert!(!plan.notes.iter().any(|n| n.contains("no longer applies")));
        assert_eq!(plan.new_order("BW240615-000002".into(), &customer(), &paid).status, OrderStatus::Pending);
    }

    #[test]
    fn test_plan_falls_back_when_paid_rate_gone() {
        let ctx = context(None);
        let plan = plan_order(cart(vec![line(100, 2, 5)]), &ctx, &payment(215, "MYR", Uuid::new_v4()));
        assert_eq!(plan.rate.as_ref().map(|r| r.name.as_str()), Some("Standard"));
        assert_eq!(plan.total, Decimal::from(208));
        assert!(plan.notes.iter().any(|n| n.contains("no longer applies")));
        assert!(plan.notes.iter().any(|n| n.contains("Paid MYR 215")));
    }

    #[test]
    fn test_plan_records_payment_without_cart_or_rate() {
        let ctx = context(None);
        let paid = payment(208, "myr", ctx.rates[1].id);
        let empty = plan_order(cart(vec![]), &ctx, &paid);
        assert!(empty.lines.is_empty());
        assert_eq!(empty.total, Decimal::ZERO);
        assert_eq!(empty.currency, "MYR");
        let order = empty.new_order("BW240615-000003".into(), &customer(), &paid);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.amount_paid, Decimal::from(208));
        assert!(order.notes.unwrap_or_default().contains("empty cart"));

        let mut abroad = context(None);
        abroad.address.country = "SG".into();
        let plan = plan_order(cart(vec![line(100, 2, 5)]), &abroad, &payment(208, "MYR", Uuid::new_v4()));
        assert!(plan.rate.is_none());
        assert_eq!(plan.shipping, Decimal::ZERO);
        assert_eq!(plan.lines.len(), 1);
        assert!(plan.notes.iter().any(|n| n.contains("No shipping rate")));
    }

    #[test]
    fn test_items_record_units_taken_from_stock() {
        let ctx = context(None);
        let plan = plan_order(cart(vec![line(100, 2, 5), line(80, 3, 0)]), &ctx, &payment(448, "MYR", ctx.rates[1].id));
        let items = plan.items(&[2, 0]);
        assert_eq!(items.iter().map(|i| (i.quantity, i.stocked_quantity)).collect::<Vec<_>>(), vec![(2, 2), (3, 0)]);
        assert_eq!(plan.items(&[]).iter().map(|i| i.stocked_quantity).sum::<i32>(), 0);
    }
}
