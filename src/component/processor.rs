//! Instance processors.
//!
//! Pre-processors run on a freshly constructed instance before its `Init`
//! hook, post-processors after it. A processor may return a replacement
//! instance of the same concrete type; returning `None` aborts creation.

use crate::component::error::BoxError;
use crate::component::types::Instance;
use crate::context::Context;

pub trait InstanceProcessor: Send + Sync {
    fn process(
        &self,
        ctx: &Context,
        name: &str,
        instance: Instance,
    ) -> Result<Option<Instance>, BoxError>;
}

impl<F> InstanceProcessor for F
where
    F: Fn(&Context, &str, Instance) -> Result<Option<Instance>, BoxError> + Send + Sync,
{
    fn process(
        &self,
        ctx: &Context,
        name: &str,
        instance: Instance,
    ) -> Result<Option<Instance>, BoxError> {
        self(ctx, name, instance)
    }
}
