//! BDD step definitions for volume detachment.

use stackvol::test_support::{
    ApiCall, FakeOperation, native_volume_v1, native_volume_v2,
};
use stackvol::openstack::NativeVolume;
use stackvol::{ApiGeneration, DetachOptions, DriverBuilder, StorageDriver};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Builder;

use super::test_helpers::DetachContext;
use crate::test_constants::{INSTANCE_ID, VOLUME_ID};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn observation(generation: ApiGeneration, status: &str, attached: bool) -> NativeVolume {
    let attachments: &[(&str, &str)] = if attached {
        &[(INSTANCE_ID, "/dev/vdb")]
    } else {
        &[]
    };
    match generation {
        ApiGeneration::V1 => native_volume_v1(VOLUME_ID, status, attachments),
        ApiGeneration::V2 => native_volume_v2(VOLUME_ID, status, attachments),
    }
}

fn force_calls(detach_context: &DetachContext) -> usize {
    detach_context
        .provider
        .count_calls(|call| matches!(call, ApiCall::ForceDetach(_)))
}

#[given("the block storage API generation is \"{generation}\"")]
fn api_generation(
    mut detach_context: DetachContext,
    generation: String,
) -> Result<DetachContext, StepError> {
    detach_context.generation = match generation.as_str() {
        "v1" => ApiGeneration::V1,
        "v2" => ApiGeneration::V2,
        other => {
            return Err(StepError::Assertion(format!(
                "unknown API generation {other}"
            )));
        }
    };
    Ok(detach_context)
}

#[given("a volume attached to the instance")]
fn volume_attached(detach_context: DetachContext) -> DetachContext {
    detach_context.provider.script_volumes([observation(
        detach_context.generation,
        "in-use",
        true,
    )]);
    detach_context
}

#[given("the provider reports the volume detached on the next check")]
fn detached_on_next_check(detach_context: DetachContext) -> DetachContext {
    detach_context.provider.script_volumes([
        observation(detach_context.generation, "detaching", true),
        observation(detach_context.generation, "available", false),
    ]);
    detach_context
}

#[given("the provider never reports the volume detached")]
fn never_detached(detach_context: DetachContext) -> DetachContext {
    detach_context.provider.script_volumes([observation(
        detach_context.generation,
        "detaching",
        true,
    )]);
    detach_context
}

#[given("a forced detach frees the volume")]
fn forced_detach_frees(detach_context: DetachContext) -> DetachContext {
    detach_context
        .provider
        .after_force_detach(observation(detach_context.generation, "available", false));
    detach_context
}

#[given("the provider rejects the detach call")]
fn detach_call_rejected(detach_context: DetachContext) -> DetachContext {
    detach_context.provider.fail(FakeOperation::Detach);
    detach_context
}

#[given("force is requested")]
fn force_requested(mut detach_context: DetachContext) -> DetachContext {
    detach_context.force = true;
    detach_context
}

#[when("I detach the volume")]
fn detach_volume(detach_context: DetachContext) -> Result<DetachContext, StepError> {
    let runtime = Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    let driver = DriverBuilder::new(detach_context.provider.clone(), detach_context.generation)
        .availability_zone("nova")
        .build();
    let options = DetachOptions {
        force: detach_context.force,
    };
    let instance = detach_context.instance.clone();

    let result = runtime.block_on(async move {
        driver
            .volume_detach(VOLUME_ID, &instance, &options)
            .await
    });

    Ok(DetachContext {
        outcome: Some(result),
        ..detach_context
    })
}

#[then("the detach succeeds")]
fn detach_succeeds(detach_context: &DetachContext) -> Result<(), StepError> {
    match detach_context.outcome {
        Some(Ok(ref volume)) if volume.attachments.is_empty() => Ok(()),
        Some(Ok(ref volume)) => Err(StepError::Assertion(format!(
            "volume still reports attachments: {:?}",
            volume.attachments
        ))),
        Some(Err(ref err)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the detach error mentions \"{text}\"")]
fn detach_error_mentions(detach_context: &DetachContext, text: String) -> Result<(), StepError> {
    let Some(Err(err)) = &detach_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    let message = err.to_string();
    if message.contains(&text) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected error mentioning {text:?}, got: {message}"
        )))
    }
}

#[then("no forced detach is issued")]
fn no_forced_detach(detach_context: &DetachContext) -> Result<(), StepError> {
    match force_calls(detach_context) {
        0 => Ok(()),
        count => Err(StepError::Assertion(format!(
            "expected no forced detach, saw {count}"
        ))),
    }
}

#[then("\"{count}\" forced detach is issued")]
fn forced_detach_count(detach_context: &DetachContext, count: usize) -> Result<(), StepError> {
    let seen = force_calls(detach_context);
    if seen == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} forced detach calls, saw {seen}"
        )))
    }
}

#[then("the volume is never polled")]
fn never_polled(detach_context: &DetachContext) -> Result<(), StepError> {
    let polls = detach_context
        .provider
        .count_calls(|call| matches!(call, ApiCall::GetVolume(..)));
    if polls == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no status checks, saw {polls}"
        )))
    }
}
