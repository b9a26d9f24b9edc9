//! VM-level schedulers dividing VM capacity among resident cloudlets and tracking their progress.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::cloudlet::{Cloudlet, CloudletStatus};
use crate::core::vm_scheduler::fair_shares;

/// Remaining length (MI) below which a cloudlet is considered complete.
pub const LENGTH_TOLERANCE: f64 = 1e-6;

/// Kind of cloudlet scheduler used by a virtual machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudletSchedulerKind {
    #[default]
    TimeShared,
    SpaceShared,
}

impl CloudletSchedulerKind {
    pub fn build(&self) -> Box<dyn CloudletScheduler> {
        match self {
            CloudletSchedulerKind::TimeShared => Box::new(CloudletSchedulerTimeShared::new()),
            CloudletSchedulerKind::SpaceShared => Box::new(CloudletSchedulerSpaceShared::new()),
        }
    }
}

/// Trait for policies sharing the capacity of a virtual machine among its cloudlets.
///
/// The scheduler is driven by [`update_processing`](CloudletScheduler::update_processing) calls, each of them
/// advances the progress of running cloudlets with the shares computed at the previous call and then recomputes the
/// shares for the given VM capacity.
pub trait CloudletScheduler {
    /// Accepts the cloudlet, which stays queued until the next update.
    fn submit(&mut self, cloudlet: Cloudlet, time: f64);

    /// Advances the progress up to `time` and recomputes the shares using the MIPS of each VM core.
    ///
    /// Returns the estimated delay until the next cloudlet completes, or `None` if nothing is running.
    fn update_processing(&mut self, time: f64, mips: &[f64]) -> Option<f64>;

    /// Returns the cloudlets which reached a terminal status since the previous call.
    fn take_finished(&mut self) -> Vec<Cloudlet>;

    /// Fails all queued and running cloudlets and returns them.
    fn fail_all(&mut self, time: f64) -> Vec<Cloudlet>;

    /// Cancels the queued or running cloudlet.
    fn cancel(&mut self, cloudlet_id: u32, time: f64) -> Option<Cloudlet>;

    fn cloudlet_status(&self, cloudlet_id: u32) -> Option<CloudletStatus>;

    /// Returns the MIPS currently allocated to the cloudlet.
    fn current_mips_share(&self, cloudlet_id: u32) -> f64;

    /// Returns the number of queued and running cloudlets.
    fn cloudlet_count(&self) -> usize;

    /// Returns the summary RAM utilization of running cloudlets.
    fn ram_utilization(&self, time: f64) -> f64;

    /// Returns the summary bandwidth utilization of running cloudlets.
    fn bw_utilization(&self, time: f64) -> f64;
}

struct CloudletExecution {
    cloudlet: Cloudlet,
    share: f64,
    cores: u32,
}

impl CloudletExecution {
    fn new(cloudlet: Cloudlet, cores: u32) -> Self {
        Self {
            cloudlet,
            share: 0.,
            cores,
        }
    }

    fn is_complete(&self) -> bool {
        self.cloudlet.remaining_length() <= LENGTH_TOLERANCE
    }
}

/// State shared by both scheduler kinds.
#[derive(Default)]
struct ExecutionState {
    queued: VecDeque<Cloudlet>,
    running: BTreeMap<u32, CloudletExecution>,
    finished: Vec<Cloudlet>,
    last_update: f64,
}

impl ExecutionState {
    fn advance(&mut self, time: f64) {
        let elapsed = time - self.last_update;
        if elapsed > 0. {
            for exec in self.running.values_mut() {
                exec.cloudlet.add_progress(exec.share * elapsed);
            }
        }
        self.last_update = self.last_update.max(time);
    }

    fn collect_completed(&mut self, time: f64) -> bool {
        let completed: Vec<u32> = self
            .running
            .iter()
            .filter(|(_, exec)| exec.is_complete())
            .map(|(&id, _)| id)
            .collect();
        for id in completed.iter() {
            if let Some(mut exec) = self.running.remove(id) {
                exec.cloudlet.finish(CloudletStatus::Success, time);
                self.finished.push(exec.cloudlet);
            }
        }
        !completed.is_empty()
    }

    fn next_completion_delay(&self) -> Option<f64> {
        self.running
            .values()
            .filter(|exec| exec.share > 0.)
            .map(|exec| exec.cloudlet.remaining_length() / exec.share)
            .min_by(|a, b| a.total_cmp(b))
    }

    fn submit(&mut self, mut cloudlet: Cloudlet) {
        cloudlet.set_queued();
        self.queued.push_back(cloudlet);
    }

    fn fail_all(&mut self, time: f64) -> Vec<Cloudlet> {
        let mut failed: Vec<Cloudlet> = self.queued.drain(..).collect();
        failed.extend(std::mem::take(&mut self.running).into_values().map(|exec| exec.cloudlet));
        for cloudlet in failed.iter_mut() {
            cloudlet.finish(CloudletStatus::Failed, time);
        }
        failed
    }

    fn cancel(&mut self, cloudlet_id: u32, time: f64) -> Option<Cloudlet> {
        let mut cloudlet = if let Some(pos) = self.queued.iter().position(|c| c.id == cloudlet_id) {
            self.queued.remove(pos)?
        } else {
            self.running.remove(&cloudlet_id)?.cloudlet
        };
        cloudlet.finish(CloudletStatus::Canceled, time);
        Some(cloudlet)
    }

    fn cloudlet_status(&self, cloudlet_id: u32) -> Option<CloudletStatus> {
        if let Some(exec) = self.running.get(&cloudlet_id) {
            return Some(exec.cloudlet.status());
        }
        self.queued
            .iter()
            .chain(self.finished.iter())
            .find(|c| c.id == cloudlet_id)
            .map(|c| c.status())
    }

    fn utilization<F: Fn(&Cloudlet) -> f64>(&self, f: F) -> f64 {
        self.running.values().map(|exec| f(&exec.cloudlet)).sum()
    }
}

fn mean_core_mips(mips: &[f64]) -> f64 {
    if mips.is_empty() {
        0.
    } else {
        mips.iter().sum::<f64>() / mips.len() as f64
    }
}

/// Time-shared cloudlet scheduler.
///
/// All cloudlets run simultaneously. Each cloudlet requests the capacity of `min(pes, cores)` VM cores scaled by its
/// CPU utilization, and the VM capacity is divided among the requests with [`fair_shares`].
#[derive(Default)]
pub struct CloudletSchedulerTimeShared {
    state: ExecutionState,
}

impl CloudletSchedulerTimeShared {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CloudletScheduler for CloudletSchedulerTimeShared {
    fn submit(&mut self, cloudlet: Cloudlet, _time: f64) {
        self.state.submit(cloudlet);
    }

    fn update_processing(&mut self, time: f64, mips: &[f64]) -> Option<f64> {
        self.state.advance(time);
        self.state.collect_completed(time);

        let capacity: f64 = mips.iter().sum();
        if capacity > 0. {
            let cores = mips.len() as u32;
            while let Some(mut cloudlet) = self.state.queued.pop_front() {
                cloudlet.start(time);
                let used_cores = cloudlet.pes().min(cores);
                self.state
                    .running
                    .insert(cloudlet.id, CloudletExecution::new(cloudlet, used_cores));
            }
            self.state.collect_completed(time);
        }

        let per_core = mean_core_mips(mips);
        let shares = fair_shares(
            capacity,
            self.state.running.iter().map(|(&id, exec)| {
                let demand = per_core * exec.cores as f64 * exec.cloudlet.utilization_of_cpu(time);
                (id, demand)
            }),
        );
        for (id, exec) in self.state.running.iter_mut() {
            exec.share = shares.get(id).copied().unwrap_or(0.);
        }
        self.state.next_completion_delay()
    }

    fn take_finished(&mut self) -> Vec<Cloudlet> {
        std::mem::take(&mut self.state.finished)
    }

    fn fail_all(&mut self, time: f64) -> Vec<Cloudlet> {
        self.state.fail_all(time)
    }

    fn cancel(&mut self, cloudlet_id: u32, time: f64) -> Option<Cloudlet> {
        self.state.cancel(cloudlet_id, time)
    }

    fn cloudlet_status(&self, cloudlet_id: u32) -> Option<CloudletStatus> {
        self.state.cloudlet_status(cloudlet_id)
    }

    fn current_mips_share(&self, cloudlet_id: u32) -> f64 {
        self.state.running.get(&cloudlet_id).map_or(0., |exec| exec.share)
    }

    fn cloudlet_count(&self) -> usize {
        self.state.queued.len() + self.state.running.len()
    }

    fn ram_utilization(&self, time: f64) -> f64 {
        self.state.utilization(|c| c.utilization_of_ram(time))
    }

    fn bw_utilization(&self, time: f64) -> f64 {
        self.state.utilization(|c| c.utilization_of_bw(time))
    }
}

/// Space-shared cloudlet scheduler.
///
/// Cloudlets occupy VM cores exclusively and are started in submission order while enough cores are free.
#[derive(Default)]
pub struct CloudletSchedulerSpaceShared {
    state: ExecutionState,
}

impl CloudletSchedulerSpaceShared {
    pub fn new() -> Self {
        Self::default()
    }

    fn used_cores(&self) -> u32 {
        self.state.running.values().map(|exec| exec.cores).sum()
    }

    fn start_queued(&mut self, time: f64, cores: u32) -> bool {
        let mut started = false;
        while let Some(cloudlet) = self.state.queued.front() {
            let required = cloudlet.pes().min(cores);
            if self.used_cores() + required > cores {
                break;
            }
            if let Some(mut cloudlet) = self.state.queued.pop_front() {
                cloudlet.start(time);
                self.state
                    .running
                    .insert(cloudlet.id, CloudletExecution::new(cloudlet, required));
                started = true;
            }
        }
        started
    }
}

impl CloudletScheduler for CloudletSchedulerSpaceShared {
    fn submit(&mut self, cloudlet: Cloudlet, _time: f64) {
        self.state.submit(cloudlet);
    }

    fn update_processing(&mut self, time: f64, mips: &[f64]) -> Option<f64> {
        self.state.advance(time);
        self.state.collect_completed(time);

        let cores = mips.len() as u32;
        let per_core = mean_core_mips(mips);
        if per_core > 0. {
            // zero-length cloudlets release their cores immediately
            while self.start_queued(time, cores) && self.state.collect_completed(time) {}
        }

        for exec in self.state.running.values_mut() {
            exec.share = per_core * exec.cores as f64 * exec.cloudlet.utilization_of_cpu(time);
        }
        self.state.next_completion_delay()
    }

    fn take_finished(&mut self) -> Vec<Cloudlet> {
        std::mem::take(&mut self.state.finished)
    }

    fn fail_all(&mut self, time: f64) -> Vec<Cloudlet> {
        self.state.fail_all(time)
    }

    fn cancel(&mut self, cloudlet_id: u32, time: f64) -> Option<Cloudlet> {
        self.state.cancel(cloudlet_id, time)
    }

    fn cloudlet_status(&self, cloudlet_id: u32) -> Option<CloudletStatus> {
        self.state.cloudlet_status(cloudlet_id)
    }

    fn current_mips_share(&self, cloudlet_id: u32) -> f64 {
        self.state.running.get(&cloudlet_id).map_or(0., |exec| exec.share)
    }

    fn cloudlet_count(&self) -> usize {
        self.state.queued.len() + self.state.running.len()
    }

    fn ram_utilization(&self, time: f64) -> f64 {
        self.state.utilization(|c| c.utilization_of_ram(time))
    }

    fn bw_utilization(&self, time: f64) -> f64 {
        self.state.utilization(|c| c.utilization_of_bw(time))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::core::utilization_model::{UtilizationModelConstant, UtilizationModelFull};

    fn run_to_completion(scheduler: &mut dyn CloudletScheduler, mips: &[f64]) -> Vec<Cloudlet> {
        let mut time = 0.;
        let mut finished = Vec::new();
        while let Some(delay) = scheduler.update_processing(time, mips) {
            finished.extend(scheduler.take_finished());
            time += delay;
        }
        finished.extend(scheduler.take_finished());
        finished
    }

    #[test]
    fn test_single_cloudlet_time_shared() {
        let mut scheduler = CloudletSchedulerTimeShared::new();
        scheduler.submit(Cloudlet::new(0, 400000., 1, 300, 300), 0.);
        assert_eq!(scheduler.cloudlet_status(0), Some(CloudletStatus::Queued));

        let delay = scheduler.update_processing(0., &[1000.]);
        assert_eq!(delay, Some(400.));
        assert_eq!(scheduler.cloudlet_status(0), Some(CloudletStatus::InExec));
        assert_eq!(scheduler.current_mips_share(0), 1000.);

        assert_eq!(scheduler.update_processing(400., &[1000.]), None);
        let finished = scheduler.take_finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].status(), CloudletStatus::Success);
        assert_eq!(finished[0].finish_time(), Some(400.));
        assert_eq!(finished[0].actual_cpu_time(), 400.);
        assert_eq!(scheduler.cloudlet_count(), 0);
    }

    #[test]
    fn test_time_shared_cloudlets_share_capacity() {
        let mut scheduler = CloudletSchedulerTimeShared::new();
        scheduler.submit(Cloudlet::new(0, 1000., 1, 0, 0), 0.);
        scheduler.submit(Cloudlet::new(1, 2000., 1, 0, 0), 0.);
        scheduler.update_processing(0., &[1000.]);
        assert_eq!(scheduler.current_mips_share(0), 500.);
        assert_eq!(scheduler.current_mips_share(1), 500.);

        let finished = run_to_completion(&mut scheduler, &[1000.]);
        assert_eq!(finished.len(), 2);
        assert_abs_diff_eq!(finished[0].finish_time().unwrap(), 2., epsilon = 1e-9);
        assert_abs_diff_eq!(finished[1].finish_time().unwrap(), 3., epsilon = 1e-9);
    }

    #[test]
    fn test_cpu_utilization_limits_share() {
        let mut scheduler = CloudletSchedulerTimeShared::new();
        let cloudlet = Cloudlet::new(0, 1000., 1, 0, 0).with_utilization_models(
            Box::new(UtilizationModelConstant::new(0.5)),
            Box::new(UtilizationModelFull),
            Box::new(UtilizationModelFull),
        );
        scheduler.submit(cloudlet, 0.);
        assert_eq!(scheduler.update_processing(0., &[1000.]), Some(2.));
        assert_eq!(scheduler.current_mips_share(0), 500.);
        assert_eq!(scheduler.ram_utilization(0.), 1.);
    }

    #[test]
    fn test_space_shared_runs_in_order() {
        let mut scheduler = CloudletSchedulerSpaceShared::new();
        scheduler.submit(Cloudlet::new(0, 1000., 1, 0, 0), 0.);
        scheduler.submit(Cloudlet::new(1, 1000., 1, 0, 0), 0.);
        scheduler.update_processing(0., &[1000.]);
        assert_eq!(scheduler.cloudlet_status(0), Some(CloudletStatus::InExec));
        assert_eq!(scheduler.cloudlet_status(1), Some(CloudletStatus::Queued));
        assert_eq!(scheduler.current_mips_share(0), 1000.);

        let finished = run_to_completion(&mut scheduler, &[1000.]);
        assert_eq!(finished[0].finish_time(), Some(1.));
        assert_eq!(finished[1].exec_start_time(), Some(1.));
        assert_eq!(finished[1].finish_time(), Some(2.));
    }

    #[test]
    fn test_space_shared_uses_all_cores() {
        let mut scheduler = CloudletSchedulerSpaceShared::new();
        scheduler.submit(Cloudlet::new(0, 1000., 1, 0, 0), 0.);
        scheduler.submit(Cloudlet::new(1, 1000., 1, 0, 0), 0.);
        scheduler.update_processing(0., &[1000., 1000.]);
        assert_eq!(scheduler.cloudlet_status(1), Some(CloudletStatus::InExec));
    }

    #[test]
    fn test_fail_all_and_cancel() {
        let mut scheduler = CloudletSchedulerTimeShared::new();
        scheduler.submit(Cloudlet::new(0, 1000., 1, 0, 0), 0.);
        scheduler.submit(Cloudlet::new(1, 1000., 1, 0, 0), 0.);
        scheduler.update_processing(0., &[1000.]);
        scheduler.update_processing(1., &[1000.]);

        let canceled = scheduler.cancel(1, 1.).unwrap();
        assert_eq!(canceled.status(), CloudletStatus::Canceled);
        assert_eq!(canceled.executed_length(), 500.);
        assert!(scheduler.cancel(1, 1.).is_none());

        let failed = scheduler.fail_all(1.5);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status(), CloudletStatus::Failed);
        assert_eq!(failed[0].finish_time(), Some(1.5));
        assert_eq!(scheduler.cloudlet_count(), 0);
    }

    #[test]
    fn test_no_progress_without_capacity() {
        let mut scheduler = CloudletSchedulerTimeShared::new();
        scheduler.submit(Cloudlet::new(0, 1000., 1, 0, 0), 0.);
        assert_eq!(scheduler.update_processing(0., &[]), None);
        assert_eq!(scheduler.cloudlet_status(0), Some(CloudletStatus::Queued));
    }
}
