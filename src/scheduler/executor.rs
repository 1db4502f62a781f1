//! Schedule execution on a worker pool.

use crate::scheduler::{Pipeline, Schedule};
use crate::system::SystemCell;
use crate::tracer::Tracer;
use crate::world::Registry;

pub(crate) struct Executor {
    thread_pool: Option<rayon::ThreadPool>,
}

impl Executor {
    /// Builds an executor with `concurrency` worker threads. A concurrency
    /// of 0 runs everything inline on the calling thread, which is valid
    /// in environments where threading is unsupported.
    pub(crate) fn new(concurrency: usize) -> Self {
        Self {
            thread_pool: (concurrency > 0).then(|| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(concurrency)
                    .thread_name(|index| format!("rangec worker #{index}"))
                    .build()
                    .expect("failed to create the worker pool")
            }),
        }
    }

    /// Worker count matching the host, leaving the calling thread free.
    pub(crate) fn host_concurrency() -> usize {
        std::thread::available_parallelism().map_or(0, |n| n.get().saturating_sub(1))
    }

    /// Runs one full cycle: groups sequentially, pipelines of a group
    /// concurrently, systems of a pipeline serially. Returns only after
    /// every system completed. A panicking system aborts the run once its
    /// sibling tasks have finished.
    pub(crate) fn run(
        &self,
        schedule: &Schedule,
        systems: &[SystemCell],
        registry: &Registry,
        tracer: &dyn Tracer,
    ) {
        for group in &schedule.groups {
            tracer.group_start(group.group, group.pipelines.len());
            match &self.thread_pool {
                Some(pool) => pool.in_place_scope(|scope| {
                    for pipeline in &group.pipelines {
                        scope.spawn(move |_| run_pipeline(pipeline, systems, registry, true, tracer));
                    }
                }),
                None => {
                    for pipeline in &group.pipelines {
                        run_pipeline(pipeline, systems, registry, false, tracer);
                    }
                }
            }
        }
    }
}

fn run_pipeline(
    pipeline: &Pipeline,
    systems: &[SystemCell],
    registry: &Registry,
    parallel: bool,
    tracer: &dyn Tracer,
) {
    for &index in &pipeline.order {
        let cell = &systems[index];
        if !cell.enabled {
            continue;
        }
        let started = std::time::Instant::now();
        tracer.system_start(index);
        cell.run_locked(registry, parallel);
        tracer.system_end(index, started.elapsed());
    }
}
