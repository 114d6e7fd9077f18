//! 程序运行函数.

use crate::result::{SurveyResult, WarmStats};
use crate::Cli;
use luna_berry::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use utils::loader;

/// 实际运行.
pub fn run(cli: &Cli) -> LunaResult<SurveyResult> {
    let ctx = match &cli.data_dir {
        Some(d) => LunaContext::new(LunaPaths::new(d)),
        None => loader::context_from_env_or_home().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "cannot determine the data directory")
        })?,
    };
    let policy = if cli.nearest {
        MatchPolicy::Nearest
    } else {
        MatchPolicy::FirstInTableOrder
    };
    let ctx = ctx.with_match_policy(policy);
    let data_dir = ctx.paths().data_dir().to_owned();

    let candidates = ctx.candidates(!cli.all)?;
    let summary = CandidateSummary::of(&candidates);

    if let Some(out) = &cli.export {
        write_candidates(&candidates, BufWriter::new(File::create(out)?))?;
        log::info!("candidate table written to `{}`", out.display());
    }

    let config = CacheConfig {
        volume_capacity: utils::cpus(),
        disk_dir: cli.disk_cache.clone(),
        policy: if cli.shift {
            BoundaryPolicy::ShiftInside
        } else {
            BoundaryPolicy::PadMin
        },
        ..CacheConfig::default()
    };
    let store = Arc::new(ctx.volume_store(&config)?);
    let split = |split| DatasetOptions {
        split: Some(split),
        ..DatasetOptions::default()
    };
    let val = LunaDataset::new(&candidates, Arc::clone(&store), &split(ValSplit::validation(cli.val_stride)))?;
    let train = LunaDataset::new(&candidates, store, &split(ValSplit::training(cli.val_stride)))?;

    let warm = (cli.warm > 0).then(|| warm_up(&train, cli.warm));

    Ok(SurveyResult {
        data_dir,
        summary,
        val_len: val.len(),
        train_len: train.len(),
        warm,
        exported: cli.export.clone(),
    })
}

/// 多线程获取训练集前 `n` 个样本. 单个样本失败只计数, 不中断.
fn warm_up<S: VolumeSource>(train: &LunaDataset<S>, n: usize) -> WarmStats {
    let n = n.min(train.len());
    let threads = utils::cpus().min(n).max(1);
    let chunk = n.div_ceil(threads);
    let window = utils::lung_window();

    println!("Warming up {n} samples on {threads} threads...");
    let start = Instant::now();
    let parts = thread::scope(|s| {
        let handles: Vec<_> = (0..n)
            .step_by(chunk)
            .map(|lo| {
                s.spawn(move || {
                    let mut part = WarmStats::default();
                    for i in lo..(lo + chunk).min(n) {
                        match train.get(i) {
                            Ok(sample) => {
                                let (sum, cnt) = sample
                                    .tensor
                                    .iter()
                                    .filter_map(|v| window.normalize(*v))
                                    .fold((0.0f64, 0usize), |(acc, c), v| (acc + v as f64, c + 1));
                                part.fetched += 1;
                                part.intensity_sum += sum / cnt.max(1) as f64;
                            }
                            Err(e) => {
                                log::warn!("sample {i} failed: {e}");
                                part.failed += 1;
                            }
                        }
                    }
                    part
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|th| th.join().expect("Thread joining error"))
            .collect::<Vec<_>>()
    });

    let mut ans = parts.into_iter().fold(WarmStats::default(), WarmStats::merge);
    ans.elapsed = start.elapsed();
    ans.cached_crops = train.store().cached_crops();
    ans
}
