// Prediction flows built on the model client.
// Every flow goes through llm_client, never the backend directly.
//
// Flow lifecycle: Idle → Building → Invoking → Parsing → {Success | Fallback}.
// Failures never propagate out of a flow; each flow names its fallback.

pub mod constituency;
pub mod election;
pub mod handlers;
pub mod news_impact;
pub mod parser;
pub mod prompts;
pub mod request;
pub mod summarize;
pub mod volatility;

use std::fmt::Display;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::schema::StructuredOutput;
use crate::llm_client::{invoke_text, parse_structured, structured_request, ModelInvoker};
use crate::prediction::prompts::render;
use crate::prediction::request::PredictionRequest;

/// Message shown to callers when a structured flow could not produce a result.
pub const GENERIC_FAILURE_MESSAGE: &str = "Could not generate a result. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    Idle,
    Building,
    Invoking,
    Parsing,
    Success,
    Fallback,
}

impl FlowStage {
    #[cfg(test)]
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStage::Success | FlowStage::Fallback)
    }

    fn can_advance_to(self, next: FlowStage) -> bool {
        use FlowStage::*;
        matches!(
            (self, next),
            (Idle, Building)
                | (Building, Invoking)
                | (Building, Fallback)
                | (Invoking, Parsing)
                | (Invoking, Fallback)
                | (Parsing, Success)
                | (Parsing, Fallback)
        )
    }
}

/// Tracks and logs one flow's progress through its stages.
#[derive(Debug)]
pub struct FlowTrace {
    flow: &'static str,
    stage: FlowStage,
    started: Instant,
}

impl FlowTrace {
    pub fn start(flow: &'static str) -> Self {
        Self {
            flow,
            stage: FlowStage::Idle,
            started: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn advance(&mut self, next: FlowStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "invalid flow transition {:?} -> {:?}",
            self.stage,
            next
        );
        debug!(flow = self.flow, from = ?self.stage, to = ?next, "flow stage");
        self.stage = next;
    }

    pub fn succeed(&mut self) {
        self.advance(FlowStage::Success);
        info!(
            flow = self.flow,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "flow succeeded"
        );
    }

    pub fn fall_back(&mut self, reason: &dyn Display) {
        self.advance(FlowStage::Fallback);
        warn!(
            flow = self.flow,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            error = %reason,
            "flow fell back"
        );
    }
}

/// Outcome of a structured flow: the validated object, or an error message.
///
/// Serializes untagged, so callers see either the object itself or
/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowResult<T> {
    Ok(T),
    Error { error: String },
}

impl<T> FlowResult<T> {
    pub fn failed() -> Self {
        FlowResult::Error {
            error: GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn is_ok(&self) -> bool {
        matches!(self, FlowResult::Ok(_))
    }

    #[cfg(test)]
    pub fn ok(self) -> Option<T> {
        match self {
            FlowResult::Ok(value) => Some(value),
            FlowResult::Error { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FlowResult<U> {
        match self {
            FlowResult::Ok(value) => FlowResult::Ok(f(value)),
            FlowResult::Error { error } => FlowResult::Error { error },
        }
    }
}

/// Static description of one flow: its prompts and the fields it cannot run without.
#[derive(Debug, Clone, Copy)]
pub struct FlowSpec {
    pub name: &'static str,
    pub system: &'static str,
    pub template: &'static str,
    pub required_fields: &'static [&'static str],
}

impl FlowSpec {
    fn build(&self, trace: &mut FlowTrace, request: &PredictionRequest) -> Result<String, String> {
        trace.advance(FlowStage::Building);
        if let Some(missing) = self
            .required_fields
            .iter()
            .find(|field| request.is_blank(field))
        {
            return Err(format!("required field '{missing}' is empty"));
        }
        Ok(render(self.template, request))
    }
}

/// Runs a free-text flow. `finish` turns the raw text into the flow's value;
/// any failure before that yields `fallback`.
pub async fn run_text_flow<T>(
    invoker: &dyn ModelInvoker,
    spec: &FlowSpec,
    request: &PredictionRequest,
    fallback: T,
    finish: impl FnOnce(&str) -> T,
) -> T {
    let mut trace = FlowTrace::start(spec.name);

    let prompt = match spec.build(&mut trace, request) {
        Ok(prompt) => prompt,
        Err(reason) => {
            trace.fall_back(&reason);
            return fallback;
        }
    };

    trace.advance(FlowStage::Invoking);
    let text = match invoke_text(invoker, &prompt, spec.system).await {
        Ok(text) => text,
        Err(e) => {
            trace.fall_back(&e);
            return fallback;
        }
    };

    trace.advance(FlowStage::Parsing);
    let value = finish(&text);
    trace.succeed();
    value
}

/// Runs a schema-constrained flow. Any failure yields `FlowResult::Error`.
pub async fn run_structured_flow<T: StructuredOutput>(
    invoker: &dyn ModelInvoker,
    spec: &FlowSpec,
    request: &PredictionRequest,
) -> FlowResult<T> {
    let mut trace = FlowTrace::start(spec.name);

    let prompt = match spec.build(&mut trace, request) {
        Ok(prompt) => prompt,
        Err(reason) => {
            trace.fall_back(&reason);
            return FlowResult::failed();
        }
    };

    trace.advance(FlowStage::Invoking);
    let system = format!("{} {}", spec.system, JSON_ONLY_SYSTEM);
    let text = match invoker
        .generate(&structured_request::<T>(&prompt, &system))
        .await
    {
        Ok(text) => text,
        Err(e) => {
            trace.fall_back(&e);
            return FlowResult::failed();
        }
    };

    trace.advance(FlowStage::Parsing);
    match parse_structured::<T>(&text) {
        Ok(value) => {
            trace.succeed();
            FlowResult::Ok(value)
        }
        Err(e) => {
            trace.fall_back(&e);
            FlowResult::failed()
        }
    }
}
