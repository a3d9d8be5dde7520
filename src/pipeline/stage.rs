//! Stage abstraction for statically composed pipelines
//!
//! Each stage declares the entity type it consumes and the one it produces.
//! [`Stage::then`] only accepts a next stage whose `Input` is this stage's
//! `Output`, so a mis-ordered pipeline fails to compile instead of failing
//! per invocation.

use crate::error::Result;
use tracing::trace;

/// One transform step. Stages hold only immutable parameters.
pub trait Stage: Send + Sync {
    type Input;
    type Output;

    /// Short name for logging
    fn name(&self) -> &'static str;

    /// Consume the input and produce the output
    fn apply(&self, input: Self::Input) -> Result<Self::Output>;

    /// Append the names of this stage (and any stages it wraps) to `names`
    fn describe(&self, names: &mut Vec<&'static str>) {
        names.push(self.name());
    }

    /// Run `next` on this stage's output
    fn then<S>(self, next: S) -> Then<Self, S>
    where
        Self: Sized,
        S: Stage<Input = Self::Output>,
    {
        Then {
            first: self,
            second: next,
        }
    }
}

/// Two stages run back to back
#[derive(Debug, Clone)]
pub struct Then<A, B> {
    first: A,
    second: B,
}

impl<A, B> Stage for Then<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn name(&self) -> &'static str {
        "chain"
    }

    fn apply(&self, input: Self::Input) -> Result<Self::Output> {
        let intermediate = self.first.apply(input)?;
        trace!("{} -> {}", self.first.name(), self.second.name());
        self.second.apply(intermediate)
    }

    fn describe(&self, names: &mut Vec<&'static str>) {
        self.first.describe(names);
        self.second.describe(names);
    }
}

/// Names of every leaf stage, in execution order
pub fn stage_names<S: Stage>(stage: &S) -> Vec<&'static str> {
    let mut names = Vec::new();
    stage.describe(&mut names);
    names
}
