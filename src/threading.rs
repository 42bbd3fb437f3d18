//! Worker pool shared by the ingest, resampling and export passes.
//!
//! One pool is built per resize call and threaded through every pass. Work
//! items are whole destination rows, so every row has exactly one writer and
//! the shared inputs (weight lists, source image, lookup tables) are only
//! ever read. A single-worker configuration runs inline without a pool.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub(crate) struct Workers {
    pool: Option<ThreadPool>,
    count: usize,
}

impl Workers {
    /// Caps the configured worker count (0 means "no explicit cap") at the
    /// machine parallelism, with a floor of one.
    pub fn new(configured_cap: usize) -> Workers {
        let mut count = num_cpus::get().max(1);
        if configured_cap > 0 && configured_cap < count {
            count = configured_cap;
        }
        let pool = if count > 1 {
            ThreadPoolBuilder::new().num_threads(count).build().ok()
        } else {
            None
        };
        Workers { pool, count }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Runs `body` once per `stride`-sized row of `pix`, in parallel when a
    /// pool is available.
    pub fn for_each_row<F>(&self, pix: &mut [f32], stride: usize, body: F)
    where
        F: Fn(usize, &mut [f32]) + Send + Sync,
    {
        if stride == 0 || pix.is_empty() {
            return;
        }
        match &self.pool {
            Some(pool) => pool.install(|| {
                pix.par_chunks_mut(stride)
                    .enumerate()
                    .for_each(|(j, row)| body(j, row));
            }),
            None => {
                for (j, row) in pix.chunks_mut(stride).enumerate() {
                    body(j, row);
                }
            }
        }
    }

    /// Walks a float row and the byte row it packs into together, used by
    /// the exporter. The float row is mutable because post-processing and
    /// colour conversion happen in place on an image about to be dropped.
    pub fn for_each_row_pair<F>(
        &self,
        src: &mut [f32],
        src_stride: usize,
        dst: &mut [u8],
        dst_stride: usize,
        body: F,
    ) where
        F: Fn(usize, &mut [f32], &mut [u8]) + Send + Sync,
    {
        if src_stride == 0 || dst_stride == 0 || src.is_empty() {
            return;
        }
        match &self.pool {
            Some(pool) => pool.install(|| {
                src.par_chunks_mut(src_stride)
                    .zip(dst.par_chunks_mut(dst_stride))
                    .enumerate()
                    .for_each(|(j, (s, d))| body(j, s, d));
            }),
            None => {
                for (j, (s, d)) in src
                    .chunks_mut(src_stride)
                    .zip(dst.chunks_mut(dst_stride))
                    .enumerate()
                {
                    body(j, s, d);
                }
            }
        }
    }
}
