// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Fixed-rate driver for the layout algorithms.
//!
//! Everything here is single-threaded. The host calls
//! [`Scheduler::advance`] from its frame loop with the wall time elapsed
//! since the previous call; each registered task runs as many whole ticks
//! as have come due, up to a catch-up cap. A tick always runs to completion
//! and cancellation is only observed between ticks.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::common::Result;
use crate::config::AutoLayoutConfig;
use crate::diagram::Diagram;
use crate::layout_err;
use crate::optimizer::LinkOptimizer;
use crate::scatter::Scatterer;

pub const DEFAULT_MAX_CATCH_UP_TICKS: u32 = 8;

/// Work driven by the scheduler.
pub trait Tick {
    /// Run one complete pass against the diagram.
    fn tick(&mut self, diagram: &mut Diagram);

    /// Release cached state. No further ticks follow.
    fn dispose(&mut self);
}

impl<T: Tick> Tick for Rc<RefCell<T>> {
    fn tick(&mut self, diagram: &mut Diagram) {
        self.borrow_mut().tick(diagram);
    }

    fn dispose(&mut self) {
        self.borrow_mut().dispose();
    }
}

/// Shared flag that stops a registered task. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

pub struct PeriodicTask {
    period: Duration,
    accumulated: Duration,
    token: CancellationToken,
    task: Box<dyn Tick>,
}

impl PeriodicTask {
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fold `elapsed` into the accumulator and return how many whole
    /// periods are now due. The remainder carries over.
    fn due(&mut self, elapsed: Duration) -> u128 {
        let period = self.period.as_nanos();
        let total = self.accumulated.as_nanos() + elapsed.as_nanos();
        let remainder = u64::try_from(total % period).unwrap_or(u64::MAX);
        self.accumulated = Duration::from_nanos(remainder);
        total / period
    }
}

pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
    max_catch_up_ticks: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_max_catch_up_ticks(DEFAULT_MAX_CATCH_UP_TICKS)
    }

    pub fn with_max_catch_up_ticks(max_catch_up_ticks: u32) -> Self {
        Self {
            tasks: Vec::new(),
            max_catch_up_ticks,
        }
    }

    pub fn max_catch_up_ticks(&self) -> u32 {
        self.max_catch_up_ticks
    }

    /// Register `task` to tick once every `period`. Tasks run in the order
    /// they were registered.
    pub fn register(
        &mut self,
        period: Duration,
        task: impl Tick + 'static,
    ) -> Result<CancellationToken> {
        if period.is_zero() {
            return layout_err!(Config, InvalidConfig, "task period must be positive".to_owned());
        }

        let token = CancellationToken::new();
        self.tasks.push(PeriodicTask {
            period,
            accumulated: Duration::ZERO,
            token: token.clone(),
            task: Box::new(task),
        });
        Ok(token)
    }

    /// Register a task by rate rather than period.
    pub fn register_at_rate(
        &mut self,
        rate_hz: f64,
        task: impl Tick + 'static,
    ) -> Result<CancellationToken> {
        let period = Duration::try_from_secs_f64(1.0 / rate_hz).ok();
        match period {
            Some(period) if rate_hz.is_finite() && rate_hz > 0.0 => self.register(period, task),
            _ => layout_err!(Config, InvalidConfig, format!("bad tick rate {rate_hz}")),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Let `elapsed` pass, running every tick that comes due.
    pub fn advance(&mut self, diagram: &mut Diagram, elapsed: Duration) {
        self.remove_cancelled();

        for task in self.tasks.iter_mut() {
            let due = task.due(elapsed);
            let cap = u128::from(self.max_catch_up_ticks);
            if due > cap {
                debug!(
                    due = due as u64,
                    ran = self.max_catch_up_ticks,
                    period_us = task.period.as_micros() as u64,
                    "dropping scheduler backlog"
                );
            }

            for _ in 0..due.min(cap) {
                if task.token.is_cancelled() {
                    break;
                }
                task.task.tick(diagram);
            }
        }

        self.remove_cancelled();
    }

    fn remove_cancelled(&mut self) {
        self.tasks.retain_mut(|task| {
            if !task.token.is_cancelled() {
                return true;
            }
            debug!(period_us = task.period.as_micros() as u64, "task cancelled");
            task.task.dispose();
            false
        });
    }

    /// Dispose and drop every task.
    pub fn dispose_all(&mut self) {
        for mut task in self.tasks.drain(..) {
            task.token.cancel();
            task.task.dispose();
        }
    }
}

/// Scatterer and link optimizer registered on one scheduler at their
/// configured rates.
pub struct AutoLayout {
    scheduler: Scheduler,
    scatterer: Rc<RefCell<Scatterer>>,
    optimizer: Rc<RefCell<LinkOptimizer>>,
    scatter_token: CancellationToken,
    optimizer_token: CancellationToken,
}

impl AutoLayout {
    pub fn new(config: AutoLayoutConfig) -> Result<Self> {
        let AutoLayoutConfig { scatter, optimizer } = config;
        let scatter_rate = scatter.rate_hz;
        let optimizer_rate = optimizer.rate_hz;

        let scatterer = Rc::new(RefCell::new(Scatterer::new(scatter)));
        let optimizer = Rc::new(RefCell::new(LinkOptimizer::new(optimizer)));

        let mut scheduler = Scheduler::new();
        let scatter_token = scheduler.register_at_rate(scatter_rate, scatterer.clone())?;
        let optimizer_token = scheduler.register_at_rate(optimizer_rate, optimizer.clone())?;

        Ok(Self {
            scheduler,
            scatterer,
            optimizer,
            scatter_token,
            optimizer_token,
        })
    }

    pub fn advance(&mut self, diagram: &mut Diagram, elapsed: Duration) {
        self.scheduler.advance(diagram, elapsed);
    }

    pub fn scatterer(&self) -> Ref<'_, Scatterer> {
        self.scatterer.borrow()
    }

    pub fn optimizer(&self) -> Ref<'_, LinkOptimizer> {
        self.optimizer.borrow()
    }

    pub fn scatter_token(&self) -> &CancellationToken {
        &self.scatter_token
    }

    pub fn optimizer_token(&self) -> &CancellationToken {
        &self.optimizer_token
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Stop both algorithms.
    pub fn dispose(&mut self) {
        self.scheduler.dispose_all();
    }
}
