//! Pass framework shared by the utility visitors and the lowering stage.

use modcc_ast::Module;

use crate::Result;

/// A compiler pass over a [`Module`], run for effect (mutating the module
/// or the diagnostics it carries).
pub trait Pass {
    /// Human-readable pass name, used in tracing spans.
    fn name(&self) -> &'static str;
    /// Execute the pass, mutating the module in place.
    fn run(&self, module: &mut Module) -> Result<()>;
}

/// Runs a fixed sequence of passes over one module, in order.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Append a pass to the pipeline.
    pub fn add(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Run every pass over `module`, in the order they were added.
    pub fn run(&mut self, module: &mut Module) -> Result<()> {
        for pass in &self.passes {
            let _span = tracing::debug_span!("pass", name = pass.name()).entered();
            tracing::debug!("running pass");
            pass.run(module)?;
        }
        Ok(())
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}
