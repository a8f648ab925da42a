use regex::Regex;

use crate::models::{Delivery, Item, Order, Payment};

// ============================================================================
// Order Validation
// ============================================================================
//
// Structural checks on a decoded order. Every rule is evaluated; the error
// carries the complete list of failing field paths (`delivery.email`,
// `items[1].price`, ...) so the dead-letter reason names all of them.
//
// Rules:
// - required strings must be non-empty
// - required numbers must be non-zero
// - money and quantity fields must be >= 0
// - `delivery.email` must be a syntactically valid address
// - an order carries at least one item
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", failing_fields.join(", "))]
pub struct ValidationError {
    pub failing_fields: Vec<String>,
}

impl ValidationError {
    pub fn contains(&self, field: &str) -> bool {
        self.failing_fields.iter().any(|f| f == field)
    }
}

// HTML living standard's "valid e-mail address" grammar.
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

/// Stateless order validator. Built once and handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct OrderValidator {
    email: Regex,
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderValidator {
    pub fn new() -> Self {
        Self {
            email: Regex::new(EMAIL_PATTERN).expect("email pattern is a valid regex"),
        }
    }

    pub fn validate(&self, order: &Order) -> Result<(), ValidationError> {
        let mut report = Report::default();

        report.required_str("order_uid", &order.order_uid);
        report.required_str("track_number", &order.track_number);
        report.required_str("entry", &order.entry);
        self.check_delivery(&mut report, &order.delivery);
        check_payment(&mut report, &order.payment);

        // An empty items array is rejected, not accepted as `[]`.
        if order.items.is_empty() {
            report.fail("items");
        }
        for (index, item) in order.items.iter().enumerate() {
            check_item(&mut report, index, item);
        }

        report.required_str("locale", &order.locale);
        report.required_str("customer_id", &order.customer_id);
        report.required_str("delivery_service", &order.delivery_service);
        report.required_str("shardkey", &order.shardkey);
        report.required_num("sm_id", order.sm_id);
        if order.date_created == chrono::DateTime::<chrono::Utc>::default() {
            report.fail("date_created");
        }
        report.required_str("oof_shard", &order.oof_shard);

        report.finish()
    }

    fn check_delivery(&self, report: &mut Report, delivery: &Delivery) {
        report.required_str("delivery.name", &delivery.name);
        report.required_str("delivery.phone", &delivery.phone);
        report.required_str("delivery.zip", &delivery.zip);
        report.required_str("delivery.city", &delivery.city);
        report.required_str("delivery.address", &delivery.address);
        report.required_str("delivery.region", &delivery.region);
        if !self.is_valid_email(&delivery.email) {
            report.fail("delivery.email");
        }
    }

    pub fn is_valid_email(&self, email: &str) -> bool {
        !email.is_empty() && self.email.is_match(email)
    }
}

fn check_payment(report: &mut Report, payment: &Payment) {
    report.required_str("payment.transaction", &payment.transaction);
    report.required_str("payment.currency", &payment.currency);
    report.required_str("payment.provider", &payment.provider);
    report.required_amount("payment.amount", payment.amount);
    report.required_num("payment.payment_dt", payment.payment_dt);
    report.required_str("payment.bank", &payment.bank);
    report.required_amount("payment.delivery_cost", payment.delivery_cost);
    report.required_amount("payment.goods_total", payment.goods_total);
    report.non_negative("payment.custom_fee", payment.custom_fee);
}

fn check_item(report: &mut Report, index: usize, item: &Item) {
    let field = |name: &str| format!("items[{index}].{name}");

    report.required_num(&field("chrt_id"), item.chrt_id);
    report.required_str(&field("track_number"), &item.track_number);
    report.required_amount(&field("price"), item.price);
    report.required_str(&field("rid"), &item.rid);
    report.required_str(&field("name"), &item.name);
    report.non_negative(&field("sale"), item.sale);
    report.required_str(&field("size"), &item.size);
    report.required_amount(&field("total_price"), item.total_price);
    report.required_num(&field("nm_id"), item.nm_id);
    report.required_str(&field("brand"), &item.brand);
    report.required_num(&field("status"), item.status);
}

#[derive(Default)]
struct Report {
    failing: Vec<String>,
}

impl Report {
    fn fail(&mut self, field: &str) {
        self.failing.push(field.to_string());
    }

    fn required_str(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.fail(field);
        }
    }

    fn required_num(&mut self, field: &str, value: i64) {
        if value == 0 {
            self.fail(field);
        }
    }

    fn non_negative(&mut self, field: &str, value: i64) {
        if value < 0 {
            self.fail(field);
        }
    }

    /// Required and non-negative; a field failing both is reported once.
    fn required_amount(&mut self, field: &str, value: i64) {
        if value <= 0 {
            self.fail(field);
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.failing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                failing_fields: self.failing,
            })
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
