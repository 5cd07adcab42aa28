/// D3D11QueryPool - timestamp queries with clock-disjoint tracking
///
/// D3D11 timestamps are raw ticks of a clock whose frequency is only known
/// through a `TIMESTAMP_DISJOINT` query bracketing them. Each slot owns one
/// timestamp and one disjoint query; `TimestampDisjointRing` decides which
/// disjoint query covers which timestamp.

use d3d12::ComPtr;
use flint_rhi::flint::render::{DisjointAction, NativeQueryPool, QueryType, TimestampDisjointRing};
use flint_rhi::flint::{Error, Result};
use std::mem;
use winapi::shared::minwindef::FALSE;
use winapi::shared::winerror::S_OK;
use winapi::um::d3d11;

use crate::d3d11_context::{check, D3D11Context};

/// Clock frequency of a disjoint result, `None` when the clock was unreliable
pub(crate) fn disjoint_frequency(data: &d3d11::D3D11_QUERY_DATA_TIMESTAMP_DISJOINT) -> Option<u64> {
    if data.Disjoint != FALSE || data.Frequency == 0 {
        return None;
    }
    Some(data.Frequency)
}

pub struct D3D11QueryPool {
    timestamps: Vec<ComPtr<d3d11::ID3D11Query>>,
    disjoints: Vec<ComPtr<d3d11::ID3D11Query>>,
    written: Vec<bool>,
    pub(crate) ring: TimestampDisjointRing,
}

unsafe impl Send for D3D11QueryPool {}
unsafe impl Sync for D3D11QueryPool {}

impl NativeQueryPool for D3D11QueryPool {
    fn on_allocate(&mut self, index: u32) {
        if let Some(written) = self.written.get_mut(index as usize) {
            *written = false;
        }
    }
}

fn create_query(ctx: &D3D11Context, kind: d3d11::D3D11_QUERY) -> Result<ComPtr<d3d11::ID3D11Query>> {
    let desc = d3d11::D3D11_QUERY_DESC { Query: kind, MiscFlags: 0 };
    let mut query = ComPtr::<d3d11::ID3D11Query>::null();
    check(unsafe { ctx.device.CreateQuery(&desc, query.mut_self()) }, "CreateQuery")?;
    Ok(query)
}

impl D3D11QueryPool {
    pub(crate) fn create(ctx: &D3D11Context, query_type: QueryType, capacity: u32) -> Result<Self> {
        if query_type != QueryType::Timestamp {
            return Err(Error::InvalidResource(format!("Unsupported query type {:?}", query_type)));
        }

        let mut timestamps = Vec::with_capacity(capacity as usize);
        let mut disjoints = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            timestamps.push(create_query(ctx, d3d11::D3D11_QUERY_TIMESTAMP)?);
            disjoints.push(create_query(ctx, d3d11::D3D11_QUERY_TIMESTAMP_DISJOINT)?);
        }

        Ok(Self {
            timestamps,
            disjoints,
            written: vec![false; capacity as usize],
            ring: TimestampDisjointRing::new(capacity),
        })
    }

    /// Record a timestamp into slot `index` on `context` (immediate or deferred)
    pub(crate) fn write(&mut self, context: &d3d11::ID3D11DeviceContext, index: u32) -> Result<()> {
        let timestamp = self
            .timestamps
            .get(index as usize)
            .ok_or_else(|| Error::InvalidResource(format!("Query index {} out of range", index)))?
            .as_mut_ptr() as *mut d3d11::ID3D11Asynchronous;

        unsafe {
            match self.ring.on_timestamp(index) {
                DisjointAction::Begin(disjoint) => {
                    context.Begin(self.disjoints[disjoint as usize].as_mut_ptr() as *mut _);
                    context.End(timestamp);
                }
                DisjointAction::End(disjoint) => {
                    context.End(timestamp);
                    context.End(self.disjoints[disjoint as usize].as_mut_ptr() as *mut _);
                }
            }
        }
        self.written[index as usize] = true;
        Ok(())
    }

    /// Timestamp of `index`, `None` until it and its disjoint query are available
    pub(crate) fn poll(&mut self, context: &d3d11::ID3D11DeviceContext, index: u32) -> Option<u64> {
        if !*self.written.get(index as usize)? {
            return None;
        }

        if self.ring.resolved_frequency(index).is_none() {
            let disjoint = self.ring.disjoint_for(index);
            let query = self.disjoints.get(disjoint as usize)?;
            let mut data: d3d11::D3D11_QUERY_DATA_TIMESTAMP_DISJOINT = unsafe { mem::zeroed() };
            let hr = unsafe {
                context.GetData(
                    query.as_mut_ptr() as *mut _,
                    &mut data as *mut _ as *mut _,
                    mem::size_of_val(&data) as u32,
                    0,
                )
            };
            if hr != S_OK {
                return None;
            }
            self.ring.resolve(disjoint, disjoint_frequency(&data)?);
        }

        let mut ticks: u64 = 0;
        let hr = unsafe {
            context.GetData(
                self.timestamps[index as usize].as_mut_ptr() as *mut _,
                &mut ticks as *mut u64 as *mut _,
                mem::size_of::<u64>() as u32,
                0,
            )
        };
        if hr == S_OK { Some(ticks) } else { None }
    }
}

#[cfg(test)]
#[path = "d3d11_query_pool_tests.rs"]
mod tests;
