use tracing::{Span, field};
use uuid::Uuid;

/// Records the deal being operated on. Returns false when the current span
/// is disabled or does not declare `deal_id`.
pub fn record_deal(deal_id: &Uuid) -> bool {
    record_id("deal_id", deal_id)
}

/// Records the acting user. Returns false when the current span is disabled
/// or does not declare `actor_id`.
pub fn record_actor(actor_id: &Uuid) -> bool {
    record_id("actor_id", actor_id)
}

fn record_id(name: &'static str, id: &Uuid) -> bool {
    let span = Span::current();
    if !span.has_field(name) {
        return false;
    }
    span.record(name, field::display(id));
    true
}
