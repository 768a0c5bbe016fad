// src/pipeline.rs
use async_trait::async_trait;
use tracing::debug;

use crate::context::OperationContext;
use crate::error::{AccountError, StepError};
use crate::types::UserOperation;

/// One transformation applied to an operation under construction.
#[async_trait]
pub trait UserOperationMiddleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &mut OperationContext) -> Result<(), StepError>;
}

/// How gas limits are obtained. Exactly one of the two runs in a pipeline.
pub enum GasLimitStage {
    /// A paymaster negotiates sponsorship and supplies the limits.
    Sponsored(Box<dyn UserOperationMiddleware>),
    /// The bundler estimates the limits.
    Estimated(Box<dyn UserOperationMiddleware>),
}

impl GasLimitStage {
    fn into_step(self) -> Box<dyn UserOperationMiddleware> {
        match self {
            GasLimitStage::Sponsored(step) | GasLimitStage::Estimated(step) => step,
        }
    }
}

/// The five slots of a build, in the only order they can run.
pub struct PipelineStages {
    pub defaults: Box<dyn UserOperationMiddleware>,
    pub resolve_account: Box<dyn UserOperationMiddleware>,
    pub gas_price: Box<dyn UserOperationMiddleware>,
    pub gas_limits: GasLimitStage,
    pub sign: Box<dyn UserOperationMiddleware>,
}

/// Fixed, ordered list of middleware. Holds no per-build state.
pub struct MiddlewarePipeline {
    steps: Vec<Box<dyn UserOperationMiddleware>>,
}

impl MiddlewarePipeline {
    pub fn new(stages: PipelineStages) -> Self {
        let PipelineStages {
            defaults,
            resolve_account,
            gas_price,
            gas_limits,
            sign,
        } = stages;

        Self {
            steps: vec![
                defaults,
                resolve_account,
                gas_price,
                gas_limits.into_step(),
                sign,
            ],
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Runs every step against `ctx`. The first failing step aborts the run and its error is
    /// returned as is, tagged with the step name.
    pub async fn run(&self, mut ctx: OperationContext) -> Result<OperationContext, AccountError> {
        for step in &self.steps {
            debug!("Running middleware {}", step.name());
            step.handle(&mut ctx)
                .await
                .map_err(|source| AccountError::Step {
                    step: step.name(),
                    source,
                })?;
        }
        Ok(ctx)
    }

    /// Runs the pipeline and returns the finished operation.
    pub async fn build(&self, ctx: OperationContext) -> Result<UserOperation, AccountError> {
        let ctx = self.run(ctx).await?;
        ctx.op.finish().map_err(AccountError::Incomplete)
    }
}
