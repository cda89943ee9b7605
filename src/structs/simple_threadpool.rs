/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::sync::Mutex;

use crate::decode_error::{DecodeError, Result};
use crate::helpers::catch_unwind_result;

/// Runs a closure over disjoint bands of a buffer on a bounded number of threads.
///
/// The buffer is split into bands of `band_len` bytes (the last one may be shorter) and
/// consecutive bands are grouped so that at most `max_threads` workers are started. All
/// workers are joined before returning, so the closure can borrow from the caller.
///
/// A panic in a worker is returned as an AssertionFailure, and if several workers fail
/// the error of the first band is returned.
pub fn for_each_band<F>(data: &mut [u8], band_len: usize, max_threads: usize, f: F) -> Result<()>
where
    F: Fn(usize, &mut [u8]) -> Result<()> + Sync,
{
    if data.is_empty() || band_len == 0 {
        return Ok(());
    }

    let bands = (data.len() + band_len - 1) / band_len;
    let threads = max_threads.clamp(1, bands);

    if threads == 1 {
        return catch_unwind_result(|| run_group(&f, 0, data, band_len));
    }

    let bands_per_thread = (bands + threads - 1) / threads;
    let first_error: Mutex<Option<(usize, DecodeError)>> = Mutex::new(None);

    spawn_groups(data, band_len * bands_per_thread, |group, chunk| {
        let first_band = group * bands_per_thread;
        if let Err(e) = catch_unwind_result(|| run_group(&f, first_band, chunk, band_len)) {
            if let Ok(mut slot) = first_error.lock() {
                let earlier = matches!(&*slot, Some((band, _)) if *band < first_band);
                if !earlier {
                    *slot = Some((first_band, e));
                }
            }
        }
    });

    match first_error.into_inner() {
        Ok(Some((_, e))) => Err(e),
        Ok(None) => Ok(()),
        Err(poisoned) => match poisoned.into_inner() {
            Some((_, e)) => Err(e),
            None => Ok(()),
        },
    }
}

fn run_group<F>(f: &F, first_band: usize, chunk: &mut [u8], band_len: usize) -> Result<()>
where
    F: Fn(usize, &mut [u8]) -> Result<()>,
{
    for (i, band) in chunk.chunks_mut(band_len).enumerate() {
        f(first_band + i, band)?;
    }
    Ok(())
}

// if we are using Rayon, the groups run on the global rayon pool
#[cfg(feature = "use_rayon")]
fn spawn_groups<W>(data: &mut [u8], group_len: usize, worker: W)
where
    W: Fn(usize, &mut [u8]) + Sync,
{
    let worker = &worker;
    rayon_core::scope(|s| {
        for (group, chunk) in data.chunks_mut(group_len).enumerate() {
            s.spawn(move |_| worker(group, chunk));
        }
    });
}

#[cfg(not(feature = "use_rayon"))]
fn spawn_groups<W>(data: &mut [u8], group_len: usize, worker: W)
where
    W: Fn(usize, &mut [u8]) + Sync,
{
    let worker = &worker;
    std::thread::scope(|s| {
        for (group, chunk) in data.chunks_mut(group_len).enumerate() {
            s.spawn(move || worker(group, chunk));
        }
    });
}
