/// GlQueryPool - timestamp queries on GL query objects
///
/// One query object per slot, written with `glQueryCounter`. GL timestamps
/// are nanoseconds, so no clock calibration is needed.

use flint_rhi::flint::render::{NativeQueryPool, QueryType};
use flint_rhi::flint::{Error, Result};
use flint_rhi::rhi_err;
use glow::HasContext;
use std::sync::Arc;

use crate::gl_context::GlContext;

pub struct GlQueryPool {
    ctx: Arc<GlContext>,
    queries: Vec<glow::Query>,
    written: Vec<bool>,
}

impl NativeQueryPool for GlQueryPool {
    fn on_allocate(&mut self, index: u32) {
        if let Some(written) = self.written.get_mut(index as usize) {
            *written = false;
        }
    }
}

impl GlQueryPool {
    pub(crate) fn create(ctx: &Arc<GlContext>, query_type: QueryType, capacity: u32) -> Result<Self> {
        if query_type != QueryType::Timestamp {
            return Err(Error::InvalidResource(format!("Unsupported query type {:?}", query_type)));
        }
        let gl = ctx.gl()?;

        let mut queries = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            match unsafe { gl.create_query() } {
                Ok(query) => queries.push(query),
                Err(e) => {
                    for query in queries {
                        unsafe { gl.delete_query(query) };
                    }
                    return Err(rhi_err!("flint::gl", "Failed to create query object: {}", e));
                }
            }
        }

        Ok(Self { ctx: ctx.clone(), written: vec![false; queries.len()], queries })
    }

    /// Record a timestamp into slot `index`
    pub(crate) fn write(&mut self, gl: &glow::Context, index: u32) -> Result<()> {
        let query = *self
            .queries
            .get(index as usize)
            .ok_or_else(|| Error::InvalidResource(format!("Query index {} out of range", index)))?;
        unsafe { gl.query_counter(query, glow::TIMESTAMP) };
        self.written[index as usize] = true;
        Ok(())
    }

    /// Timestamp of `index`, `None` until it was written and is available
    pub(crate) fn poll(&self, index: u32) -> Option<u64> {
        let query = *self.queries.get(index as usize)?;
        if !self.written[index as usize] {
            return None;
        }
        let gl = self.ctx.gl().ok()?;
        unsafe {
            if gl.get_query_parameter_u32(query, glow::QUERY_RESULT_AVAILABLE) == 0 {
                return None;
            }
            // No QUERY_BUFFER is bound, so the offset is a client pointer
            let mut value: u64 = 0;
            gl.get_query_parameter_u64_with_offset(query, glow::QUERY_RESULT, &mut value as *mut u64 as usize);
            Some(value)
        }
    }
}

impl Drop for GlQueryPool {
    fn drop(&mut self) {
        if let Some(gl) = self.ctx.gl_for_drop("Query pool") {
            for &query in &self.queries {
                unsafe { gl.delete_query(query) };
            }
        }
    }
}

pub(crate) fn nanoseconds_to_milliseconds(ticks: u64) -> f64 {
    ticks as f64 / 1_000_000.0
}

#[cfg(test)]
#[path = "gl_query_pool_tests.rs"]
mod tests;
