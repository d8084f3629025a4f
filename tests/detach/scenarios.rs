//! BDD scenarios for volume detachment.

use rstest_bdd_macros::scenario;

use super::test_helpers::{DetachContext, detach_context};

#[scenario(
    path = "tests/features/detach.feature",
    name = "Detach converges without forcing"
)]
fn scenario_detach_converges(detach_context: DetachContext) {
    drop(detach_context);
}

#[scenario(
    path = "tests/features/detach.feature",
    name = "Stalled detach without force needs manual intervention"
)]
fn scenario_stalled_without_force(detach_context: DetachContext) {
    drop(detach_context);
}

#[scenario(
    path = "tests/features/detach.feature",
    name = "Stalled detach falls back to a forced detach"
)]
fn scenario_forced_fallback(detach_context: DetachContext) {
    drop(detach_context);
}

#[scenario(
    path = "tests/features/detach.feature",
    name = "Forced fallback is unavailable on the v1 API"
)]
fn scenario_v1_never_forces(detach_context: DetachContext) {
    drop(detach_context);
}

#[scenario(
    path = "tests/features/detach.feature",
    name = "Forced detach that also stalls"
)]
fn scenario_forced_detach_stalls(detach_context: DetachContext) {
    drop(detach_context);
}

#[scenario(
    path = "tests/features/detach.feature",
    name = "Rejected detach call is reported without polling"
)]
fn scenario_detach_call_rejected(detach_context: DetachContext) {
    drop(detach_context);
}
