use crate::model::DealStatus;

/// Statuses reachable from `from` in a single step. Terminal statuses
/// return an empty slice.
pub fn allowed_targets(from: DealStatus) -> &'static [DealStatus] {
    use DealStatus::*;

    match from {
        PendingPayment => &[PendingReview, HoldFailed, Cancelled],
        PendingReview => &[Approved, Rejected, ChangesRequested, Cancelled],
        ChangesRequested => &[PendingReview, Cancelled],
        Approved => &[Posted],
        Posted => &[Completed, Dispute],
        HoldFailed | Rejected | Cancelled | Completed | Dispute => &[],
    }
}

/// Pure transition check. Callers must pass the currently stored status,
/// never one derived from an earlier hypothetical step.
pub fn can_transition(from: DealStatus, to: DealStatus) -> bool {
    allowed_targets(from).contains(&to)
}

pub fn is_terminal(status: DealStatus) -> bool {
    allowed_targets(status).is_empty()
}
