//! Closure-backed capability.
//!
//! Lets callers register plain functions as skills without writing a
//! struct per capability.

use anyhow::Result;
use async_trait::async_trait;

use super::{Capability, CapabilityInfo, CapabilityOutput, Invocation};

type Handler = dyn Fn(&Invocation) -> Result<CapabilityOutput> + Send + Sync;

/// Capability wrapping a synchronous closure
pub struct FnCapability {
    info: CapabilityInfo,
    handler: Box<Handler>,
}

impl FnCapability {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation) -> Result<CapabilityOutput> + Send + Sync + 'static,
    {
        Self {
            info: CapabilityInfo::new(name, description),
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl Capability for FnCapability {
    fn describe(&self) -> CapabilityInfo {
        self.info.clone()
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<CapabilityOutput> {
        (self.handler)(invocation)
    }
}
